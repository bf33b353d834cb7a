//! Hall-sensored six-step BLDC commutation and current control
//!
//! Hardware-independent engine: the firmware supplies the hall lines, the
//! half-bridge PWM and the ADC burst through the traits in [`hall`],
//! [`phase_driver`] and [`acquisition`], and calls into [`ControlCycle`]
//! from its two control interrupts.

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod acquisition;
pub mod calibration;
pub mod commutation;
pub mod config;
pub mod control_cycle;
pub mod current_control;
pub mod hall;
pub mod phase_driver;
pub mod telemetry;
pub mod voltage_monitor;

pub use acquisition::{AnalogSnapshot, RawBurst, SampleAcquisition, BURST_LEN};
pub use calibration::{CalibrationError, HallCalibrator};
pub use commutation::{CommutationTable, ElectricalState, Sector, TableBuilder};
pub use config::{ConfigError, ControlMode, ControllerConfig};
pub use control_cycle::{ControlCycle, ControlState, CycleOutcome};
pub use current_control::{ControlOutput, CurrentController};
pub use hall::{HallCode, HallLines, HallReader};
pub use phase_driver::{HalfBridges, PhaseDriver, PhaseOutputs};
pub use telemetry::{Telemetry, TelemetrySnapshot};
pub use voltage_monitor::{VoltageMonitor, VoltageMonitorConfig, VoltageMonitorState};
