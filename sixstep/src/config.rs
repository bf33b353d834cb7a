//! Controller parameters
//!
//! Reference-board constants (module-level `DEFAULT_*` values) and the
//! [`ControllerConfig`] bundle handed to the engine at startup. Nothing here
//! is read from persistent storage; the firmware builds a config once and
//! moves it into the control cycle before interrupts are enabled.

/// Full scale of the duty-cycle accumulator (8 fractional bits above the
/// 8-bit output resolution).
pub const DUTY_MAX: i32 = 65_535;

/// Largest raw reading of the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4_095;

/// Reads per hall line per [`HallReader::read`](crate::hall::HallReader::read).
pub const HALL_OVERSAMPLE: u8 = 8;

/// Lower edge of the throttle ADC window (raw counts).
pub const DEFAULT_THROTTLE_LOW: i32 = 600;

/// Upper edge of the throttle ADC window (raw counts).
pub const DEFAULT_THROTTLE_HIGH: i32 = 2_650;

/// Phase current at full throttle [mA]
pub const DEFAULT_PHASE_MAX_CURRENT_MA: i32 = 15_000;

/// Average battery current limit [mA]
pub const DEFAULT_BATTERY_MAX_CURRENT_MA: i32 = 15_000;

/// Divisor applied to the current error before it is integrated into the
/// duty cycle. Larger is slower.
pub const DEFAULT_LOOP_GAIN: i32 = 200;

/// Control cycles after a cold start during which synchronous switching is
/// withheld (one second at 16 kHz).
pub const DEFAULT_SOFT_START_TICKS: u32 = 16_000;

/// mA per ADC count on the current channel.
/// 3.3 V / 0.5 mΩ shunt / 20x amplifier / 4096 counts
pub const DEFAULT_CURRENT_SCALE: i32 = 80;

/// mV per ADC count on the bus voltage channel.
/// 3.3 V / 4096 counts * (47k + 2.2k) / 2.2k divider
pub const DEFAULT_VOLTAGE_SCALE: u32 = 18;

/// Six-step output stage constants
pub mod output {
    /// Above this 8-bit duty the stage saturates to full on, so the
    /// bootstrap capacitor is never starved by a sliver of low-side time.
    pub const SATURATION_THRESHOLD: u16 = 245;

    /// The low-side complement is `DEADTIME_CONST - duty`, which leaves a
    /// gap of `255 - DEADTIME_CONST` counts around each high-side pulse.
    pub const DEADTIME_CONST: i16 = 248;
}

/// Hall identification sweep
pub mod calibration {
    /// 8-bit duty used while dragging the rotor between half-states.
    pub const DEFAULT_DUTY: u16 = 25;

    /// Dwell on each of the two neighbouring states [µs].
    pub const DEFAULT_HALF_PERIOD_US: u32 = 500;

    /// State alternations per sector (1000 × 2 × 500 µs = 1 s).
    pub const DEFAULT_ALTERNATIONS: u32 = 1_000;
}

/// Bus voltage supervision (diagnostic only)
pub mod bus_voltage {
    /// Low-pass coefficient in 1/256 units (about 0.1)
    pub const DEFAULT_FILTER_ALPHA: u32 = 26;

    /// 50 V: above a fully charged 10S pack plus regen headroom
    pub const DEFAULT_OVERVOLTAGE_MV: u32 = 50_000;

    /// 30 V: 10S pack at 3.0 V/cell
    pub const DEFAULT_UNDERVOLTAGE_MV: u32 = 30_000;
}

/// Hall code → sector table used when identification is disabled.
/// Values 0..=5 are sectors, anything else means "off".
pub const DEFAULT_STATIC_TABLE: [u8; 8] = [255, 2, 0, 1, 4, 3, 5, 255];

/// Control law selection, fixed for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// Integral current loop with phase and battery current limits.
    CurrentControlled,
    /// Throttle maps straight to duty; synchronous switching always on.
    ///
    /// Lowering the throttle in this mode brakes regeneratively and hard.
    DirectDuty,
}

/// Configuration errors reported by [`ControllerConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `throttle_high` is not above `throttle_low`
    EmptyThrottleWindow,
    /// A throttle window edge lies outside the raw ADC range
    ThrottleWindowOutOfRange,
    /// A full-scale ADC reading times the current or voltage scale overflows
    MeasurementScaleTooLarge,
    /// `loop_gain` is zero or negative
    NonPositiveLoopGain,
    /// A current limit is negative
    NegativeCurrentLimit,
    /// The current limits overflow the derating arithmetic
    CurrentLimitTooLarge,
    /// Calibration duty is zero or above the 8-bit range
    CalibrationDutyOutOfRange,
    /// A static table entry for hall code 1-6 is neither a sector nor 255
    StaticTableOutOfRange,
}

/// Startup configuration of the control engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub mode: ControlMode,
    /// Run the hall identification sweep at boot instead of using `static_table`.
    pub identify_halls: bool,
    /// Identify for reverse rotation.
    pub identify_reverse: bool,
    pub static_table: [u8; 8],
    pub throttle_low: i32,
    pub throttle_high: i32,
    pub phase_max_current_ma: i32,
    pub battery_max_current_ma: i32,
    pub loop_gain: i32,
    pub soft_start_ticks: u32,
    pub current_scale: i32,
    pub voltage_scale: u32,
    pub calibration_duty: u16,
    pub calibration_half_period_us: u32,
    pub calibration_alternations: u32,
}

impl ControllerConfig {
    pub const fn new() -> Self {
        Self {
            mode: ControlMode::CurrentControlled,
            identify_halls: true,
            identify_reverse: false,
            static_table: DEFAULT_STATIC_TABLE,
            throttle_low: DEFAULT_THROTTLE_LOW,
            throttle_high: DEFAULT_THROTTLE_HIGH,
            phase_max_current_ma: DEFAULT_PHASE_MAX_CURRENT_MA,
            battery_max_current_ma: DEFAULT_BATTERY_MAX_CURRENT_MA,
            loop_gain: DEFAULT_LOOP_GAIN,
            soft_start_ticks: DEFAULT_SOFT_START_TICKS,
            current_scale: DEFAULT_CURRENT_SCALE,
            voltage_scale: DEFAULT_VOLTAGE_SCALE,
            calibration_duty: calibration::DEFAULT_DUTY,
            calibration_half_period_us: calibration::DEFAULT_HALF_PERIOD_US,
            calibration_alternations: calibration::DEFAULT_ALTERNATIONS,
        }
    }

    /// Check the values the real-time path divides by or multiplies with.
    ///
    /// The control cycle still guards each division itself; this only
    /// rejects configurations that could never run sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttle_high <= self.throttle_low {
            return Err(ConfigError::EmptyThrottleWindow);
        }
        if self.throttle_low < 0 || self.throttle_high > ADC_FULL_SCALE as i32 {
            return Err(ConfigError::ThrottleWindowOutOfRange);
        }
        // the current reading spans -4095..=4095 counts after bias removal
        if (self.current_scale as i64).abs() * ADC_FULL_SCALE as i64 > i32::MAX as i64 {
            return Err(ConfigError::MeasurementScaleTooLarge);
        }
        if (self.voltage_scale as u64) * ADC_FULL_SCALE as u64 > u32::MAX as u64 {
            return Err(ConfigError::MeasurementScaleTooLarge);
        }
        if self.loop_gain <= 0 {
            return Err(ConfigError::NonPositiveLoopGain);
        }
        if self.phase_max_current_ma < 0 || self.battery_max_current_ma < 0 {
            return Err(ConfigError::NegativeCurrentLimit);
        }
        // throttle * phase_max must fit, as must the derating numerator
        if (self.phase_max_current_ma as i64) * 255 > i32::MAX as i64 {
            return Err(ConfigError::CurrentLimitTooLarge);
        }
        if (self.battery_max_current_ma as i64) * (DUTY_MAX as i64) > i32::MAX as i64 {
            return Err(ConfigError::CurrentLimitTooLarge);
        }
        if self.calibration_duty == 0 || self.calibration_duty > 255 {
            return Err(ConfigError::CalibrationDutyOutOfRange);
        }
        if self.static_table[1..7].iter().any(|&v| v > 5 && v != 255) {
            return Err(ConfigError::StaticTableOutOfRange);
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}
