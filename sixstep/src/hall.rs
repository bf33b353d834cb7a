// Hall sensor digitizer for six-step commutation
// Majority vote over a burst of raw GPIO reads rejects switching noise
// coupled into the sensor lines around PWM edges.

use crate::config::HALL_OVERSAMPLE;

/// Raw 3-bit hall code (bit 0 = sensor 1, bit 1 = sensor 2, bit 2 = sensor 3)
///
/// 0b000 and 0b111 cannot occur with a healthy 120° sensor layout and are
/// treated as invalid everywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HallCode(u8);

impl HallCode {
    /// Build a code from its low three bits.
    #[inline(always)]
    pub const fn new(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Build a code from the three sensor levels.
    #[inline(always)]
    pub const fn from_lines(lines: [bool; 3]) -> Self {
        Self((lines[0] as u8) | ((lines[1] as u8) << 1) | ((lines[2] as u8) << 2))
    }

    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if the code can map to a rotor sector
    ///
    /// # Returns
    /// `true` for 1-6, `false` for 0 and 7
    #[inline(always)]
    pub const fn is_valid(self) -> bool {
        self.0 != 0 && self.0 != 7
    }

    /// Table index for this code (always < 8)
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Access to the three hall sensor inputs.
///
/// Implementations perform one direct GPIO read per call; they must not
/// block, debounce or cache.
pub trait HallLines {
    /// Current logic level of sensors 1, 2 and 3
    fn levels(&mut self) -> [bool; 3];
}

/// Oversampling hall reader
pub struct HallReader<H> {
    lines: H,
}

impl<H: HallLines> HallReader<H> {
    pub fn new(lines: H) -> Self {
        Self { lines }
    }

    /// Digitize the hall lines
    ///
    /// Samples all three lines [`HALL_OVERSAMPLE`] times back to back. A bit
    /// is set only when its line read high in strictly more than half of the
    /// samples, so a 4/4 tie reads low.
    pub fn read(&mut self) -> HallCode {
        let mut counts = [0u8; 3];
        for _ in 0..HALL_OVERSAMPLE {
            let levels = self.lines.levels();
            for (count, high) in counts.iter_mut().zip(levels) {
                *count += high as u8;
            }
        }

        let threshold = HALL_OVERSAMPLE / 2;
        HallCode::from_lines([
            counts[0] > threshold,
            counts[1] > threshold,
            counts[2] > threshold,
        ])
    }

    /// Give back the underlying lines
    #[cfg(test)]
    pub fn release(self) -> H {
        self.lines
    }
}
