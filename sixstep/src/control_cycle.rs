//! Per-period control engine
//!
//! Owns everything the two control interrupts touch. The firmware calls
//! [`ControlCycle::on_carrier_edge`] from the carrier timer interrupt and
//! [`ControlCycle::on_samples_ready`] from the burst-complete interrupt.
//! Both handlers must run at the same priority so they never preempt each
//! other; within one period the carrier edge always comes first.

use crate::acquisition::{AnalogSnapshot, SampleAcquisition};
use crate::commutation::{CommutationTable, ElectricalState};
use crate::config::ControllerConfig;
use crate::current_control::{scale_throttle, CurrentController};
use crate::hall::{HallCode, HallLines, HallReader};
use crate::phase_driver::{HalfBridges, PhaseDriver, PhaseOutputs};
use crate::telemetry::Telemetry;

/// Values computed by the most recent completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlState {
    pub current_ma: i32,
    pub current_target_ma: i32,
    pub voltage_mv: u32,
    pub throttle: u8,
    pub duty_cycle: i32,
    pub ticks_since_restart: u32,
    pub synchronous: bool,
    pub hall: HallCode,
    pub state: ElectricalState,
}

impl ControlState {
    /// Boot state: nothing measured, outputs off
    pub const fn new() -> Self {
        Self {
            current_ma: 0,
            current_target_ma: 0,
            voltage_mv: 0,
            throttle: 0,
            duty_cycle: 0,
            ticks_since_restart: 0,
            synchronous: false,
            hall: HallCode::new(0),
            state: ElectricalState::Off,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`ControlCycle::on_samples_ready`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// The burst had the wrong sample count; nothing changed
    Skipped,
    /// Zero throttle: controller reset and outputs off
    Idle,
    /// Control update ran and the output stage was driven
    Driven,
}

/// Control engine for one motor
pub struct ControlCycle<'t, S, H, B> {
    acquisition: S,
    hall: HallReader<H>,
    driver: PhaseDriver<B>,
    table: CommutationTable,
    controller: CurrentController,
    throttle_low: i32,
    throttle_high: i32,
    current_scale: i32,
    voltage_scale: u32,
    adc_bias: i32,
    state: ControlState,
    telemetry: &'t Telemetry,
}

impl<'t, S, H, B> ControlCycle<'t, S, H, B>
where
    S: SampleAcquisition,
    H: HallLines,
    B: HalfBridges,
{
    /// Assemble the engine
    ///
    /// `table` is final from here on. `adc_bias` is the current channel's
    /// zero-current reading captured with the outputs off.
    pub fn new(
        config: &ControllerConfig,
        table: CommutationTable,
        acquisition: S,
        hall: HallReader<H>,
        mut driver: PhaseDriver<B>,
        adc_bias: u16,
        telemetry: &'t Telemetry,
    ) -> Self {
        driver.off();
        let state = ControlState::new();
        telemetry.publish(&state);
        Self {
            acquisition,
            hall,
            driver,
            table,
            controller: CurrentController::new(config),
            throttle_low: config.throttle_low,
            throttle_high: config.throttle_high,
            current_scale: config.current_scale,
            voltage_scale: config.voltage_scale,
            adc_bias: adc_bias as i32,
            state,
            telemetry,
        }
    }

    /// Carrier mid-point: start the next burst and clean up the last one.
    #[inline]
    pub fn on_carrier_edge(&mut self) {
        self.acquisition.start_burst();
        self.acquisition.acknowledge_carrier();
        self.acquisition.drain_stale();
    }

    /// Burst complete: run one control period
    ///
    /// A burst with the wrong sample count is dropped without touching the
    /// controller or the outputs; the previous period's outputs stay.
    pub fn on_samples_ready(&mut self) -> CycleOutcome {
        let raw = critical_section::with(|_| self.acquisition.take_burst());
        let snapshot = match AnalogSnapshot::try_from(raw) {
            Ok(s) => s,
            Err(_) => {
                self.telemetry.count_skipped();
                return CycleOutcome::Skipped;
            }
        };

        let hall = self.hall.read();
        let state = self.table.lookup(hall);

        let throttle = scale_throttle(snapshot.throttle_raw, self.throttle_low, self.throttle_high);
        let current_ma =
            (snapshot.isense_raw as i32 - self.adc_bias).saturating_mul(self.current_scale);
        let voltage_mv = (snapshot.vsense_raw as u32).saturating_mul(self.voltage_scale);

        let out = self.controller.update(throttle, current_ma);
        self.driver
            .drive(state, (out.duty_cycle >> 8) as u16, out.synchronous);
        // publish what the stage is doing, not what the table asked for
        let driven = if self.driver.last_outputs() == PhaseOutputs::OFF {
            ElectricalState::Off
        } else {
            state
        };

        self.state = ControlState {
            current_ma,
            current_target_ma: out.target_ma,
            voltage_mv,
            throttle,
            duty_cycle: out.duty_cycle,
            ticks_since_restart: self.controller.ticks_since_restart(),
            synchronous: out.synchronous,
            hall,
            state: driven,
        };
        self.telemetry.publish(&self.state);

        if throttle == 0 {
            CycleOutcome::Idle
        } else {
            CycleOutcome::Driven
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::RawBurst;
    use crate::commutation::Sector;

    #[derive(Default)]
    struct MockAdc {
        next: RawBurst,
        calls: Vec<&'static str>,
    }

    impl SampleAcquisition for MockAdc {
        fn start_burst(&mut self) {
            self.calls.push("start");
        }
        fn acknowledge_carrier(&mut self) {
            self.calls.push("ack");
        }
        fn drain_stale(&mut self) {
            self.calls.push("drain");
        }
        fn take_burst(&mut self) -> RawBurst {
            self.calls.push("take");
            self.next
        }
    }

    struct FixedHall(u8);

    impl HallLines for FixedHall {
        fn levels(&mut self) -> [bool; 3] {
            [self.0 & 1 != 0, self.0 & 2 != 0, self.0 & 4 != 0]
        }
    }

    #[derive(Default)]
    struct Recorder {
        writes: usize,
    }

    impl HalfBridges for Recorder {
        fn write(&mut self, _outputs: &PhaseOutputs) {
            self.writes += 1;
        }
    }

    const BIAS: u16 = 2048;

    fn burst(isense: u16, vsense: u16, throttle: u16) -> RawBurst {
        RawBurst {
            depth: 3,
            samples: [isense, vsense, throttle],
        }
    }

    fn engine<'t>(
        config: &ControllerConfig,
        hall_bits: u8,
        telemetry: &'t Telemetry,
    ) -> ControlCycle<'t, MockAdc, FixedHall, Recorder> {
        let table = CommutationTable::from_static(config.static_table);
        ControlCycle::new(
            config,
            table,
            MockAdc::default(),
            HallReader::new(FixedHall(hall_bits)),
            PhaseDriver::new(Recorder::default()),
            BIAS,
            telemetry,
        )
    }

    #[test]
    fn test_carrier_edge_order() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 1, &telemetry);
        cycle.on_carrier_edge();
        assert_eq!(cycle.acquisition.calls, ["start", "ack", "drain"]);
    }

    #[test]
    fn test_measurement_scaling() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 1, &telemetry);
        cycle.acquisition.next = burst(2100, 2000, 1625);
        assert_eq!(cycle.on_samples_ready(), CycleOutcome::Driven);

        let state = cycle.state();
        assert_eq!(state.current_ma, 52 * 80);
        assert_eq!(state.voltage_mv, 36_000);
        assert_eq!(state.throttle, 128);
        assert_eq!(state.hall, HallCode::new(1));
        // the first integration step is still below one output count
        assert_eq!(state.state, ElectricalState::Off);

        let below_bias = {
            cycle.acquisition.next = burst(2000, 0, 1625);
            cycle.on_samples_ready();
            cycle.state().current_ma
        };
        assert_eq!(below_bias, -48 * 80);
    }

    #[test]
    fn test_wrong_depth_leaves_state_unchanged() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 3, &telemetry);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);
        for _ in 0..500 {
            cycle.on_samples_ready();
        }
        let state_before = *cycle.state();
        let controller_before = cycle.controller;
        let writes_before = cycle.driver.bridges().writes;
        let outputs_before = cycle.driver.last_outputs();
        assert_ne!(outputs_before, PhaseOutputs::OFF);

        for depth in [0u8, 2, 4] {
            cycle.acquisition.next = RawBurst {
                depth,
                samples: [4095, 4095, 0],
            };
            assert_eq!(cycle.on_samples_ready(), CycleOutcome::Skipped);
        }

        assert_eq!(*cycle.state(), state_before);
        assert_eq!(cycle.controller, controller_before);
        assert_eq!(cycle.driver.bridges().writes, writes_before);
        assert_eq!(cycle.driver.last_outputs(), outputs_before);
        assert_eq!(telemetry.snapshot().skipped_bursts, 3);
        assert_eq!(telemetry.snapshot().completed_cycles, 1 + 500);
    }

    #[test]
    fn test_soft_start_then_synchronous() {
        let mut config = ControllerConfig::default();
        config.soft_start_ticks = 5;
        let telemetry = Telemetry::new();
        let mut cycle = engine(&config, 2, &telemetry);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);

        for tick in 1..=5 {
            cycle.on_samples_ready();
            assert!(!cycle.state().synchronous, "tick {}", tick);
            assert_eq!(cycle.state().ticks_since_restart, tick);
        }
        cycle.on_samples_ready();
        assert!(cycle.state().synchronous);

        // zero throttle is a cold restart
        cycle.acquisition.next = burst(BIAS, 2000, 0);
        assert_eq!(cycle.on_samples_ready(), CycleOutcome::Idle);
        assert_eq!(cycle.state().ticks_since_restart, 0);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);
        cycle.on_samples_ready();
        assert!(!cycle.state().synchronous);
    }

    #[test]
    fn test_zero_throttle_turns_outputs_off() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 4, &telemetry);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);
        for _ in 0..1000 {
            cycle.on_samples_ready();
        }
        assert!(cycle.state().duty_cycle > 256);
        assert_eq!(cycle.driver.last_outputs().active_phases(), 2);

        cycle.acquisition.next = burst(BIAS, 2000, 100);
        assert_eq!(cycle.on_samples_ready(), CycleOutcome::Idle);
        assert_eq!(cycle.state().duty_cycle, 0);
        assert_eq!(cycle.driver.last_outputs(), PhaseOutputs::OFF);
    }

    #[test]
    fn test_invalid_hall_code_is_off() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 7, &telemetry);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);
        for _ in 0..1000 {
            assert_eq!(cycle.on_samples_ready(), CycleOutcome::Driven);
            assert_eq!(cycle.driver.last_outputs(), PhaseOutputs::OFF);
        }
        assert_eq!(cycle.state().state, ElectricalState::Off);
        // the controller keeps integrating; only the stage is off
        assert!(cycle.state().duty_cycle > 0);
    }

    #[test]
    fn test_closed_loop_tracks_target() {
        // plant: phase current follows duty, 1 mA per 4 duty counts,
        // read back through the 80 mA/count current channel
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 5, &telemetry);
        let mut isense = BIAS;
        for _ in 0..40_000 {
            cycle.acquisition.next = burst(isense, 2000, 1625);
            cycle.on_samples_ready();
            let duty = cycle.state().duty_cycle;
            assert!((0..=crate::config::DUTY_MAX).contains(&duty));
            isense = BIAS + (duty / 4 / 80) as u16;
        }
        let state = cycle.state();
        assert_eq!(state.current_target_ma, 7_500);
        assert!((state.current_target_ma - state.current_ma).abs() <= 80 + 200);
    }

    #[test]
    fn test_telemetry_follows_cycle() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 6, &telemetry);
        cycle.acquisition.next = burst(2148, 1000, 2650);
        cycle.on_samples_ready();
        let snap = telemetry.snapshot();
        assert_eq!(snap.current_ma, cycle.state().current_ma);
        assert_eq!(snap.voltage_mv, 18_000);
        assert_eq!(snap.throttle, 255);
        assert_eq!(snap.hall, HallCode::new(6));
        assert_eq!(snap.state, cycle.state().state);
    }

    #[test]
    fn test_published_state_follows_output_stage() {
        let telemetry = Telemetry::new();
        let mut cycle = engine(&ControllerConfig::default(), 1, &telemetry);
        cycle.acquisition.next = burst(BIAS, 2000, 2650);
        for _ in 0..1000 {
            cycle.on_samples_ready();
        }
        // static table maps code 1 to sector 2
        let sector_2 = ElectricalState::Sector(Sector::new(2).unwrap());
        assert_eq!(cycle.state().state, sector_2);
        assert_eq!(telemetry.snapshot().state, sector_2);

        // zero throttle: valid hall code, but nothing is energized
        cycle.acquisition.next = burst(BIAS, 2000, 0);
        assert_eq!(cycle.on_samples_ready(), CycleOutcome::Idle);
        assert_eq!(cycle.state().hall, HallCode::new(1));
        assert_eq!(cycle.state().state, ElectricalState::Off);
        assert_eq!(telemetry.snapshot().state, ElectricalState::Off);
        assert!(!telemetry.snapshot().state.is_energized());
    }

    #[test]
    fn test_extreme_scales_saturate_instead_of_overflowing() {
        let mut config = ControllerConfig::default();
        config.current_scale = 1_000_000;
        config.voltage_scale = u32::MAX;
        config.throttle_low = -10_000_000;
        let telemetry = Telemetry::new();
        let mut cycle = engine(&config, 2, &telemetry);

        cycle.acquisition.next = burst(4095, 2000, 2000);
        assert_eq!(cycle.on_samples_ready(), CycleOutcome::Driven);
        assert_eq!(cycle.state().current_ma, i32::MAX);
        assert_eq!(cycle.state().voltage_mv, u32::MAX);
        assert_eq!(cycle.state().throttle, 255);

        cycle.acquisition.next = burst(0, 0, 0);
        cycle.on_samples_ready();
        assert_eq!(cycle.state().current_ma, -2_048 * 1_000_000);
        assert_eq!(cycle.state().duty_cycle, crate::config::DUTY_MAX);
    }
}
