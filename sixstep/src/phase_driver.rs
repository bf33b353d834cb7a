//! Six-step half-bridge output stage
//!
//! Turns (electrical state, 8-bit duty, synchronous flag) into the six
//! half-bridge levels and hands them to the PWM hardware.

use crate::commutation::ElectricalState;
use crate::config::output::{DEADTIME_CONST, SATURATION_THRESHOLD};

/// Phase index into [`PhaseOutputs`]
pub const PHASE_A: usize = 0;
pub const PHASE_B: usize = 1;
pub const PHASE_C: usize = 2;

/// Per-sector phase roles: (phase chopped on its high side, phase held on
/// its low side). The remaining phase floats.
const SIX_STEP_PAIRS: [(usize, usize); 6] = [
    (PHASE_B, PHASE_A), // 0: LOW A, HIGH B
    (PHASE_C, PHASE_A), // 1: LOW A, HIGH C
    (PHASE_C, PHASE_B), // 2: LOW B, HIGH C
    (PHASE_A, PHASE_B), // 3: LOW B, HIGH A
    (PHASE_A, PHASE_C), // 4: LOW C, HIGH A
    (PHASE_B, PHASE_C), // 5: LOW C, HIGH B
];

/// High- and low-side levels for all three phases (0-255 each)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseOutputs {
    pub high: [u8; 3],
    pub low: [u8; 3],
}

impl PhaseOutputs {
    /// Every transistor off
    pub const OFF: Self = Self {
        high: [0; 3],
        low: [0; 3],
    };

    /// Compute the six-step pattern
    ///
    /// # Arguments
    /// * `state` - commanded electrical state
    /// * `duty` - high-side duty (0-255); 0 or anything above 255 forces Off
    /// * `synchronous` - drive the chopped phase's low side in the gaps
    pub fn six_step(state: ElectricalState, duty: u16, synchronous: bool) -> Self {
        let sector = match state {
            ElectricalState::Sector(s) if duty != 0 && duty <= 255 => s,
            _ => return Self::OFF,
        };

        let duty = if duty > SATURATION_THRESHOLD { 255 } else { duty };
        let complement = if synchronous {
            (DEADTIME_CONST - duty as i16).max(0) as u8
        } else {
            0
        };

        let (pwm_phase, sink_phase) = SIX_STEP_PAIRS[sector.index() as usize];
        let mut out = Self::OFF;
        out.high[pwm_phase] = duty as u8;
        out.low[pwm_phase] = complement;
        out.low[sink_phase] = 255;
        out
    }

    /// `true` if any output of `phase` is non-zero
    pub fn is_phase_active(&self, phase: usize) -> bool {
        self.high[phase] != 0 || self.low[phase] != 0
    }

    /// Number of phases with any output on
    pub fn active_phases(&self) -> usize {
        (0..3).filter(|&p| self.is_phase_active(p)).count()
    }
}

/// PWM hardware for three half-bridges
///
/// `write` is called from the control interrupt; it must only store
/// compare values and output enables, never block. Each call carries all
/// six levels of one period and the implementation must commit them
/// together, so new output enables never run against old levels.
pub trait HalfBridges {
    fn write(&mut self, outputs: &PhaseOutputs);
}

/// Output stage owning the half-bridge hardware
pub struct PhaseDriver<B> {
    bridges: B,
    last: PhaseOutputs,
}

impl<B: HalfBridges> PhaseDriver<B> {
    /// Create the driver and force all outputs off.
    pub fn new(mut bridges: B) -> Self {
        bridges.write(&PhaseOutputs::OFF);
        Self {
            bridges,
            last: PhaseOutputs::OFF,
        }
    }

    /// Emit the six-step pattern for `state`
    #[inline]
    pub fn drive(&mut self, state: ElectricalState, duty: u16, synchronous: bool) {
        let outputs = PhaseOutputs::six_step(state, duty, synchronous);
        self.bridges.write(&outputs);
        self.last = outputs;
    }

    /// Switch every transistor off
    pub fn off(&mut self) {
        self.drive(ElectricalState::Off, 0, false);
    }

    /// Levels written by the most recent call
    pub fn last_outputs(&self) -> PhaseOutputs {
        self.last
    }

    #[cfg(test)]
    pub fn bridges(&self) -> &B {
        &self.bridges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commutation::Sector;

    #[derive(Default)]
    struct Recorder {
        writes: usize,
        last: PhaseOutputs,
    }

    impl HalfBridges for Recorder {
        fn write(&mut self, outputs: &PhaseOutputs) {
            self.writes += 1;
            self.last = *outputs;
        }
    }

    fn sector(i: u8) -> ElectricalState {
        ElectricalState::Sector(Sector::new(i).unwrap())
    }

    #[test]
    fn test_two_phases_energized_third_floats() {
        for s in 0..6u8 {
            let (pwm_phase, sink_phase) = SIX_STEP_PAIRS[s as usize];
            let floating = 3 - pwm_phase - sink_phase;
            for duty in 1..=255u16 {
                let out = PhaseOutputs::six_step(sector(s), duty, false);
                assert_eq!(out.active_phases(), 2, "sector {} duty {}", s, duty);
                assert!(!out.is_phase_active(floating));
                assert_eq!(out.low[sink_phase], 255);
                assert_eq!(out.high[sink_phase], 0);
                assert_eq!(out.low[pwm_phase], 0);
                assert!(out.high[pwm_phase] as u16 >= duty);
            }
        }
    }

    #[test]
    fn test_sector_pairs_are_distinct() {
        for (i, a) in SIX_STEP_PAIRS.iter().enumerate() {
            assert_ne!(a.0, a.1);
            for b in SIX_STEP_PAIRS.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_invalid_duty_is_off() {
        for s in 0..6u8 {
            for sync in [false, true] {
                assert_eq!(PhaseOutputs::six_step(sector(s), 0, sync), PhaseOutputs::OFF);
                assert_eq!(PhaseOutputs::six_step(sector(s), 256, sync), PhaseOutputs::OFF);
                assert_eq!(
                    PhaseOutputs::six_step(sector(s), u16::MAX, sync),
                    PhaseOutputs::OFF
                );
            }
        }
    }

    #[test]
    fn test_off_state_is_off() {
        assert_eq!(
            PhaseOutputs::six_step(ElectricalState::Off, 128, true),
            PhaseOutputs::OFF
        );
    }

    #[test]
    fn test_saturation_clamp() {
        let out = PhaseOutputs::six_step(sector(3), 245, false);
        assert_eq!(out.high[PHASE_A], 245);
        let out = PhaseOutputs::six_step(sector(3), 246, false);
        assert_eq!(out.high[PHASE_A], 255);
    }

    #[test]
    fn test_synchronous_complement() {
        // sector 0: B chops, A sinks
        let out = PhaseOutputs::six_step(sector(0), 100, true);
        assert_eq!(out.high[PHASE_B], 100);
        assert_eq!(out.low[PHASE_B], 148);
        assert_eq!(out.low[PHASE_A], 255);
        // high + low never overlap
        assert!(out.high[PHASE_B] as u16 + out.low[PHASE_B] as u16 <= 248);

        // near full duty the complement vanishes
        let out = PhaseOutputs::six_step(sector(0), 250, true);
        assert_eq!(out.high[PHASE_B], 255);
        assert_eq!(out.low[PHASE_B], 0);
    }

    #[test]
    fn test_drive_is_idempotent() {
        let mut driver = PhaseDriver::new(Recorder::default());
        driver.drive(sector(4), 77, true);
        let first = driver.last_outputs();
        driver.drive(sector(4), 77, true);
        assert_eq!(driver.last_outputs(), first);
        assert_eq!(driver.bridges().last, first);
        // construction + two drives
        assert_eq!(driver.bridges().writes, 3);
    }

    #[test]
    fn test_sector_change_is_a_single_write() {
        let mut driver = PhaseDriver::new(Recorder::default());
        driver.drive(sector(0), 200, true);
        let writes_before = driver.bridges().writes;

        // phase B goes from PWM in sector 0 to sink in sector 2
        driver.drive(sector(2), 100, true);
        assert_eq!(driver.bridges().writes, writes_before + 1);
        let written = driver.bridges().last;
        assert_eq!(written, PhaseOutputs::six_step(sector(2), 100, true));
        assert_eq!((written.high[PHASE_B], written.low[PHASE_B]), (0, 255));
        assert_eq!(written.high[PHASE_C], 100);
        assert_eq!((written.high[PHASE_A], written.low[PHASE_A]), (0, 0));
    }

    #[test]
    fn test_new_driver_starts_off() {
        let driver = PhaseDriver::new(Recorder::default());
        assert_eq!(driver.bridges().writes, 1);
        assert_eq!(driver.bridges().last, PhaseOutputs::OFF);
    }
}
