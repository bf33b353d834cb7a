//! DC bus voltage supervision
//!
//! Low-pass filters the `voltage_mv` published by the control interrupt and
//! raises over/under-voltage flags. The flags are diagnostic only; the
//! control law never looks at them.

use crate::config::bus_voltage;

/// Bus voltage supervision parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoltageMonitorConfig {
    /// Filter coefficient in 1/256 units; larger follows the input faster
    pub filter_alpha: u32,
    /// Over-voltage threshold [mV]
    pub overvoltage_mv: u32,
    /// Under-voltage threshold [mV]
    pub undervoltage_mv: u32,
}

impl Default for VoltageMonitorConfig {
    fn default() -> Self {
        Self {
            filter_alpha: bus_voltage::DEFAULT_FILTER_ALPHA,
            overvoltage_mv: bus_voltage::DEFAULT_OVERVOLTAGE_MV,
            undervoltage_mv: bus_voltage::DEFAULT_UNDERVOLTAGE_MV,
        }
    }
}

/// Filtered voltage and fault flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VoltageMonitorState {
    /// Filtered bus voltage [mV]
    pub voltage_mv: u32,
    /// Above `overvoltage_mv`
    pub overvoltage: bool,
    /// Below `undervoltage_mv`
    pub undervoltage: bool,
}

impl VoltageMonitorState {
    pub const fn new() -> Self {
        Self {
            voltage_mv: 0,
            overvoltage: false,
            undervoltage: false,
        }
    }

    /// Neither flag is set
    pub fn is_voltage_ok(&self) -> bool {
        !self.overvoltage && !self.undervoltage
    }
}

impl Default for VoltageMonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// First-order IIR bus voltage monitor
pub struct VoltageMonitor {
    config: VoltageMonitorConfig,
    state: VoltageMonitorState,
}

impl VoltageMonitor {
    pub fn new(config: VoltageMonitorConfig) -> Self {
        Self {
            config: VoltageMonitorConfig {
                filter_alpha: config.filter_alpha.clamp(1, 256),
                ..config
            },
            state: VoltageMonitorState::new(),
        }
    }

    /// Seed the filter with a first reading so boot does not flag under-voltage
    pub fn initialize(&mut self, voltage_mv: u32) {
        self.state.voltage_mv = voltage_mv;
        self.state.overvoltage = voltage_mv > self.config.overvoltage_mv;
        self.state.undervoltage = voltage_mv < self.config.undervoltage_mv;
    }

    /// Feed one unfiltered reading [mV] and re-evaluate the flags
    pub fn update(&mut self, voltage_mv: u32) -> VoltageMonitorState {
        // filtered = (alpha * raw + (256 - alpha) * filtered_prev) / 256
        let alpha = self.config.filter_alpha as u64;
        let filtered = (alpha * voltage_mv as u64
            + (256 - alpha) * self.state.voltage_mv as u64)
            / 256;
        self.state.voltage_mv = filtered as u32;

        let overvoltage = self.state.voltage_mv > self.config.overvoltage_mv;
        let undervoltage = self.state.voltage_mv < self.config.undervoltage_mv;

        // log on the edge only
        if overvoltage && !self.state.overvoltage {
            error!(
                "OVERVOLTAGE detected! Bus voltage: {}mV (threshold: {}mV)",
                self.state.voltage_mv, self.config.overvoltage_mv
            );
        }
        if undervoltage && !self.state.undervoltage {
            error!(
                "UNDERVOLTAGE detected! Bus voltage: {}mV (threshold: {}mV)",
                self.state.voltage_mv, self.config.undervoltage_mv
            );
        }
        if !overvoltage && !undervoltage && !self.state.is_voltage_ok() {
            info!("Bus voltage back in range: {}mV", self.state.voltage_mv);
        }

        self.state.overvoltage = overvoltage;
        self.state.undervoltage = undervoltage;
        self.state
    }

    /// Current filtered state
    pub fn state(&self) -> VoltageMonitorState {
        self.state
    }
}
