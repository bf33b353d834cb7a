//! Analog sample acquisition
//!
//! One burst of three conversions (phase current, bus voltage, throttle) is
//! started at every carrier mid-point and consumed once it completes.

/// Conversions per burst, in channel order current → voltage → throttle
pub const BURST_LEN: u8 = 3;

/// What the ADC reported when the burst-complete interrupt fired.
///
/// `depth` is the number of results the hardware says it captured; the
/// sample slots beyond `depth` hold whatever was left in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawBurst {
    pub depth: u8,
    pub samples: [u16; 3],
}

/// Coherent per-period analog readings (12-bit raw counts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogSnapshot {
    pub isense_raw: u16,
    pub vsense_raw: u16,
    pub throttle_raw: u16,
}

/// Rejected burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurstError {
    /// The hardware captured a different number of results than requested
    WrongDepth(u8),
}

impl TryFrom<RawBurst> for AnalogSnapshot {
    type Error = BurstError;

    /// Accept a burst only when exactly [`BURST_LEN`] results are present.
    /// A short or over-full burst is discarded as a whole.
    fn try_from(raw: RawBurst) -> Result<Self, Self::Error> {
        if raw.depth != BURST_LEN {
            return Err(BurstError::WrongDepth(raw.depth));
        }
        let [isense_raw, vsense_raw, throttle_raw] = raw.samples;
        Ok(Self {
            isense_raw,
            vsense_raw,
            throttle_raw,
        })
    }
}

/// ADC + carrier-timer seam used by the two control interrupts.
///
/// The first three methods run from the carrier interrupt in the order
/// listed; [`take_burst`](Self::take_burst) runs from the burst-complete
/// interrupt inside a critical section.
pub trait SampleAcquisition {
    /// Point the sequencer at the current channel and start a burst of
    /// [`BURST_LEN`] back-to-back conversions.
    fn start_burst(&mut self);

    /// Clear the carrier timer event that triggered the interrupt.
    fn acknowledge_carrier(&mut self);

    /// Throw away results left over from a burst nobody consumed.
    fn drain_stale(&mut self);

    /// Read the reported depth and the three result slots.
    fn take_burst(&mut self) -> RawBurst;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_burst_is_accepted_in_order() {
        let snapshot = AnalogSnapshot::try_from(RawBurst {
            depth: 3,
            samples: [2048, 1500, 900],
        })
        .unwrap();
        assert_eq!(snapshot.isense_raw, 2048);
        assert_eq!(snapshot.vsense_raw, 1500);
        assert_eq!(snapshot.throttle_raw, 900);
    }

    #[test]
    fn test_wrong_depth_is_rejected() {
        for depth in [0u8, 1, 2, 4, 8] {
            let result = AnalogSnapshot::try_from(RawBurst {
                depth,
                samples: [1, 2, 3],
            });
            assert_eq!(result, Err(BurstError::WrongDepth(depth)));
        }
    }
}
