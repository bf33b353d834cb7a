//! Lock-free control state publication
//!
//! The control interrupt stores each field into its own atomic at the end
//! of a cycle; background tasks load them whenever they like. Each field is
//! individually consistent, but a snapshot may mix values from two
//! adjacent cycles. That is fine for logging and supervision and must not
//! be used for control.

use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU8, Ordering};

use crate::commutation::ElectricalState;
use crate::control_cycle::ControlState;
use crate::hall::HallCode;

/// Shared telemetry block, normally a `static`
pub struct Telemetry {
    current_ma: AtomicI32,
    current_target_ma: AtomicI32,
    duty_cycle: AtomicI32,
    voltage_mv: AtomicU32,
    throttle: AtomicU8,
    hall: AtomicU8,
    state: AtomicU8,
    ticks_since_restart: AtomicU32,
    completed_cycles: AtomicU32,
    skipped_bursts: AtomicU32,
    isr_cycles_last: AtomicU32,
    isr_cycles_max: AtomicU32,
}

/// Point-in-time copy of [`Telemetry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub current_ma: i32,
    pub current_target_ma: i32,
    pub duty_cycle: i32,
    pub voltage_mv: u32,
    pub throttle: u8,
    pub hall: HallCode,
    pub state: ElectricalState,
    pub ticks_since_restart: u32,
    /// Control updates that ran to completion (wrapping)
    pub completed_cycles: u32,
    /// Bursts discarded for a wrong sample count (wrapping)
    pub skipped_bursts: u32,
    /// CPU cycles spent in the most recent sample-ready interrupt
    pub isr_cycles_last: u32,
    /// Worst case since boot or the last [`Telemetry::reset_isr_max`]
    pub isr_cycles_max: u32,
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            current_ma: AtomicI32::new(0),
            current_target_ma: AtomicI32::new(0),
            duty_cycle: AtomicI32::new(0),
            voltage_mv: AtomicU32::new(0),
            throttle: AtomicU8::new(0),
            hall: AtomicU8::new(0),
            state: AtomicU8::new(ElectricalState::Off.to_raw()),
            ticks_since_restart: AtomicU32::new(0),
            completed_cycles: AtomicU32::new(0),
            skipped_bursts: AtomicU32::new(0),
            isr_cycles_last: AtomicU32::new(0),
            isr_cycles_max: AtomicU32::new(0),
        }
    }

    /// Store a completed cycle's state. Interrupt context only.
    #[inline]
    pub fn publish(&self, state: &ControlState) {
        self.current_ma.store(state.current_ma, Ordering::Relaxed);
        self.current_target_ma
            .store(state.current_target_ma, Ordering::Relaxed);
        self.duty_cycle.store(state.duty_cycle, Ordering::Relaxed);
        self.voltage_mv.store(state.voltage_mv, Ordering::Relaxed);
        self.throttle.store(state.throttle, Ordering::Relaxed);
        self.hall.store(state.hall.bits(), Ordering::Relaxed);
        self.state.store(state.state.to_raw(), Ordering::Relaxed);
        self.ticks_since_restart
            .store(state.ticks_since_restart, Ordering::Relaxed);
        // single writer: load + store is enough, no RMW needed
        let n = self.completed_cycles.load(Ordering::Relaxed);
        self.completed_cycles
            .store(n.wrapping_add(1), Ordering::Relaxed);
    }

    /// Count a discarded burst. Interrupt context only.
    #[inline]
    pub fn count_skipped(&self) {
        let n = self.skipped_bursts.load(Ordering::Relaxed);
        self.skipped_bursts.store(n.wrapping_add(1), Ordering::Relaxed);
    }

    /// Record the cost of one sample-ready interrupt. Interrupt context only.
    #[inline]
    pub fn record_isr_cycles(&self, cycles: u32) {
        self.isr_cycles_last.store(cycles, Ordering::Relaxed);
        if cycles > self.isr_cycles_max.load(Ordering::Relaxed) {
            self.isr_cycles_max.store(cycles, Ordering::Relaxed);
        }
    }

    /// Forget the worst-case interrupt time
    pub fn reset_isr_max(&self) {
        self.isr_cycles_max.store(0, Ordering::Relaxed);
    }

    pub fn voltage_mv(&self) -> u32 {
        self.voltage_mv.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            current_ma: self.current_ma.load(Ordering::Relaxed),
            current_target_ma: self.current_target_ma.load(Ordering::Relaxed),
            duty_cycle: self.duty_cycle.load(Ordering::Relaxed),
            voltage_mv: self.voltage_mv.load(Ordering::Relaxed),
            throttle: self.throttle.load(Ordering::Relaxed),
            hall: HallCode::new(self.hall.load(Ordering::Relaxed)),
            state: ElectricalState::from_raw(self.state.load(Ordering::Relaxed)),
            ticks_since_restart: self.ticks_since_restart.load(Ordering::Relaxed),
            completed_cycles: self.completed_cycles.load(Ordering::Relaxed),
            skipped_bursts: self.skipped_bursts.load(Ordering::Relaxed),
            isr_cycles_last: self.isr_cycles_last.load(Ordering::Relaxed),
            isr_cycles_max: self.isr_cycles_max.load(Ordering::Relaxed),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
