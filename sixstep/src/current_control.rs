//! Throttle scaling and the integral current control law
//!
//! All arithmetic is integer; divisions truncate toward zero.

use crate::config::{ControlMode, ControllerConfig, DUTY_MAX};

/// Map a raw throttle reading onto 0-255.
///
/// Linear over `[low, high]`; readings outside the window saturate. An
/// empty window reads as zero throttle.
#[inline]
pub fn scale_throttle(raw: u16, low: i32, high: i32) -> u8 {
    let span = high as i64 - low as i64;
    if span <= 0 {
        return 0;
    }
    let scaled = ((raw as i64 - low as i64) * 256) / span;
    scaled.clamp(0, 255) as u8
}

/// Result of one control update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlOutput {
    /// Duty accumulator after the update (0..=DUTY_MAX)
    pub duty_cycle: i32,
    /// Current target used for this update [mA] (0 in direct duty mode)
    pub target_ma: i32,
    /// Whether the low side may switch synchronously
    pub synchronous: bool,
}

/// Integral current controller
///
/// Holds the only cross-period memory of the control law: the duty
/// accumulator and the ticks since the last cold start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentController {
    mode: ControlMode,
    phase_max_current_ma: i32,
    battery_max_current_ma: i32,
    loop_gain: i32,
    soft_start_ticks: u32,
    duty_cycle: i32,
    ticks_since_restart: u32,
}

impl CurrentController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            mode: config.mode,
            phase_max_current_ma: config.phase_max_current_ma,
            battery_max_current_ma: config.battery_max_current_ma,
            // a zero gain would divide by zero in the hot path
            loop_gain: config.loop_gain.max(1),
            soft_start_ticks: config.soft_start_ticks,
            duty_cycle: 0,
            ticks_since_restart: 0,
        }
    }

    pub fn duty_cycle(&self) -> i32 {
        self.duty_cycle
    }

    pub fn ticks_since_restart(&self) -> u32 {
        self.ticks_since_restart
    }

    /// Phase current target for `throttle`, derated by the battery limit.
    ///
    /// The derating divides by the duty accumulator as it stands *before*
    /// this period's update, i.e. one control period late. A zero duty
    /// applies no derating.
    pub fn target_ma(&self, throttle: u8) -> i32 {
        let user_target = throttle as i32 * self.phase_max_current_ma / 256;
        if self.duty_cycle == 0 {
            return user_target;
        }
        let battery_limit =
            (self.battery_max_current_ma as i64 * DUTY_MAX as i64 / self.duty_cycle as i64) as i32;
        user_target.min(battery_limit)
    }

    /// Run one control period
    ///
    /// # Arguments
    /// * `throttle` - scaled throttle command (0-255)
    /// * `current_ma` - measured phase current
    ///
    /// A zero throttle is a cold restart: the accumulator and the tick
    /// counter are cleared so the next application soft-starts again.
    pub fn update(&mut self, throttle: u8, current_ma: i32) -> ControlOutput {
        if throttle == 0 {
            self.duty_cycle = 0;
            self.ticks_since_restart = 0;
        } else {
            self.ticks_since_restart = self.ticks_since_restart.saturating_add(1);
        }

        match self.mode {
            ControlMode::CurrentControlled => {
                let target_ma = self.target_ma(throttle);
                let step = target_ma.saturating_sub(current_ma) / self.loop_gain;
                self.duty_cycle = self.duty_cycle.saturating_add(step).clamp(0, DUTY_MAX);
                ControlOutput {
                    duty_cycle: self.duty_cycle,
                    target_ma,
                    synchronous: self.ticks_since_restart > self.soft_start_ticks,
                }
            }
            ControlMode::DirectDuty => {
                self.duty_cycle = throttle as i32 * 256;
                ControlOutput {
                    duty_cycle: self.duty_cycle,
                    target_ma: 0,
                    synchronous: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> CurrentController {
        CurrentController::new(&ControllerConfig::default())
    }

    #[test]
    fn test_throttle_window_end_points() {
        assert_eq!(scale_throttle(600, 600, 2650), 0);
        assert_eq!(scale_throttle(2650, 600, 2650), 255);
        assert_eq!(scale_throttle(0, 600, 2650), 0);
        assert_eq!(scale_throttle(599, 600, 2650), 0);
        assert_eq!(scale_throttle(4095, 600, 2650), 255);
    }

    #[test]
    fn test_throttle_midpoint() {
        // (1625 - 600) * 256 / 2050 = 128
        assert_eq!(scale_throttle(1625, 600, 2650), 128);
    }

    #[test]
    fn test_throttle_empty_window() {
        assert_eq!(scale_throttle(2000, 1000, 1000), 0);
    }

    #[test]
    fn test_throttle_wide_window_does_not_overflow() {
        assert_eq!(scale_throttle(4095, -10_000_000, 2_650), 255);
        assert_eq!(scale_throttle(0, i32::MIN, i32::MAX), 128);
        assert_eq!(scale_throttle(4095, 0, i32::MAX), 0);
    }

    #[test]
    fn test_zero_throttle_resets() {
        let mut c = controller();
        for _ in 0..100 {
            c.update(200, 0);
        }
        assert!(c.duty_cycle() > 0);
        assert_eq!(c.ticks_since_restart(), 100);

        let out = c.update(0, 0);
        assert_eq!(out.duty_cycle, 0);
        assert_eq!(c.duty_cycle(), 0);
        assert_eq!(c.ticks_since_restart(), 0);
        assert!(!out.synchronous);
    }

    #[test]
    fn test_soft_start_window() {
        let mut config = ControllerConfig::default();
        config.soft_start_ticks = 10;
        let mut c = CurrentController::new(&config);

        for tick in 1..=10 {
            let out = c.update(50, 0);
            assert!(!out.synchronous, "tick {}", tick);
        }
        assert!(c.update(50, 0).synchronous);

        // a single zero-throttle period restarts the window
        c.update(0, 0);
        for _ in 0..10 {
            assert!(!c.update(50, 0).synchronous);
        }
        assert!(c.update(50, 0).synchronous);
    }

    #[test]
    fn test_integrator_step() {
        let mut c = controller();
        // target = 128 * 15000 / 256 = 7500, error 7500 / 200 = 37
        let out = c.update(128, 0);
        assert_eq!(out.target_ma, 7500);
        assert_eq!(out.duty_cycle, 37);
    }

    #[test]
    fn test_duty_never_negative() {
        let mut c = controller();
        for _ in 0..10 {
            let out = c.update(10, 50_000);
            assert_eq!(out.duty_cycle, 0);
        }
    }

    #[test]
    fn test_duty_never_exceeds_max() {
        let mut config = ControllerConfig::default();
        config.battery_max_current_ma = 32_000;
        let mut c = CurrentController::new(&config);
        for _ in 0..100_000 {
            let out = c.update(255, -1_000_000);
            assert!(out.duty_cycle <= DUTY_MAX);
            assert!(out.duty_cycle >= 0);
        }
        assert_eq!(c.duty_cycle(), DUTY_MAX);
    }

    #[test]
    fn test_derating_uses_previous_duty() {
        let mut c = controller();
        c.duty_cycle = 32_768;
        c.ticks_since_restart = 1;
        // limit from the pre-update duty: 15000 * 65535 / 32768 = 29999
        // user target 255 * 15000 / 256 = 14941 is lower
        assert_eq!(c.target_ma(255), 14_941);

        c.duty_cycle = DUTY_MAX;
        // at full duty the battery limit (15000) is above the user target
        let out = c.update(255, 0);
        assert_eq!(out.target_ma, 14_941);

        let mut config = ControllerConfig::default();
        config.battery_max_current_ma = 5_000;
        let mut c = CurrentController::new(&config);
        c.duty_cycle = 40_000;
        c.ticks_since_restart = 1;
        // derating computed with 40000, not with the value after this update
        let out = c.update(255, 0);
        assert_eq!(out.target_ma, 5_000 * DUTY_MAX / 40_000);
        assert_eq!(out.duty_cycle, 40_000 + out.target_ma / 200);
    }

    #[test]
    fn test_zero_duty_applies_no_derating() {
        let mut config = ControllerConfig::default();
        config.battery_max_current_ma = 0;
        let c = CurrentController::new(&config);
        assert_eq!(c.target_ma(255), 14_941);
    }

    #[test]
    fn test_convergence_toward_target() {
        // plant: current proportional to duty (1 mA per 4 counts)
        let mut c = controller();
        let mut current = 0;
        let mut last_error = i32::MAX;
        let mut target = 0;
        for _ in 0..20_000 {
            let out = c.update(128, current);
            target = out.target_ma;
            let error = (target - current).abs();
            assert!(error <= last_error, "error grew from {} to {}", last_error, error);
            last_error = error;
            current = out.duty_cycle / 4;
        }
        // residual error is below one loop-gain step
        assert!((target - current).abs() < 200 + 4);
    }

    #[test]
    fn test_direct_duty_mode() {
        let mut config = ControllerConfig::default();
        config.mode = ControlMode::DirectDuty;
        let mut c = CurrentController::new(&config);

        let out = c.update(100, 99_999);
        assert_eq!(out.duty_cycle, 25_600);
        assert!(out.synchronous);

        let out = c.update(0, 0);
        assert_eq!(out.duty_cycle, 0);
        assert!(out.synchronous);
        assert_eq!(c.ticks_since_restart(), 0);
    }
}
