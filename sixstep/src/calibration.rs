//! Hall sensor identification sweep
//!
//! Drags the rotor through all six sectors at low duty and records which
//! hall code it settles on. Must run before the control interrupts are
//! enabled: it drives the output stage directly.

use embedded_hal_async::delay::DelayNs;

use crate::commutation::{CommutationTable, ElectricalState, Sector, TableBuilder};
use crate::config::ControllerConfig;
use crate::hall::{HallCode, HallLines, HallReader};
use crate::phase_driver::{HalfBridges, PhaseDriver};

/// Sector offset from the settled position to the sector that produces
/// torque in the forward direction.
const FORWARD_LEAD: u8 = 2;

/// Same for reverse rotation.
const REVERSE_LEAD: u8 = 5;

/// Identification did not produce a usable table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationError {
    /// Table as far as it was identified; unidentified codes are Off
    pub partial: CommutationTable,
    /// Hall code read after settling on each sector
    pub observed: [HallCode; 6],
    /// Bitmask of hall codes 1-6 that received no entry (bit n = code n)
    pub missing: u8,
}

impl CalibrationError {
    /// `true` if any sector settled on code 0 or 7
    pub fn saw_invalid_code(&self) -> bool {
        self.observed.iter().any(|c| !c.is_valid())
    }
}

/// Hall identification routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HallCalibrator {
    duty: u16,
    half_period_us: u32,
    alternations: u32,
}

impl HallCalibrator {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            duty: config.calibration_duty,
            half_period_us: config.calibration_half_period_us,
            alternations: config.calibration_alternations,
        }
    }

    /// Total time the sweep keeps the motor energized [µs]
    pub fn sweep_duration_us(&self) -> u64 {
        6 * 2 * self.alternations as u64 * self.half_period_us as u64
    }

    /// Run the sweep
    ///
    /// For each sector `i` the stage alternates between `i` and `i + 1`
    /// so the rotor settles between them, then the hall code is read once
    /// and mapped to `i + 2` (forward) or `i + 5` (reverse). The stage is
    /// always left Off, on success and on failure.
    ///
    /// # Arguments
    /// * `reverse` - identify for the reverse direction of rotation
    pub async fn calibrate<B, H, D>(
        &self,
        driver: &mut PhaseDriver<B>,
        hall: &mut HallReader<H>,
        delay: &mut D,
        reverse: bool,
    ) -> Result<CommutationTable, CalibrationError>
    where
        B: HalfBridges,
        H: HallLines,
        D: DelayNs,
    {
        let lead = if reverse { REVERSE_LEAD } else { FORWARD_LEAD };
        info!(
            "Hall identification start (reverse: {}, duty: {})",
            reverse, self.duty
        );

        let mut builder = TableBuilder::new();
        let mut observed = [HallCode::new(0); 6];

        for sector in Sector::ALL {
            let next = sector.advance(1);
            for _ in 0..self.alternations {
                driver.drive(sector.into(), self.duty, false);
                delay.delay_us(self.half_period_us).await;
                driver.drive(next.into(), self.duty, false);
                delay.delay_us(self.half_period_us).await;
            }

            let code = hall.read();
            observed[sector.index() as usize] = code;
            if code.is_valid() {
                builder.record(code, sector.advance(lead));
            } else {
                warn!("Sector {}: invalid hall code {}", sector.index(), code.bits());
            }
            debug!("Sector {} -> hall {}", sector.index(), code.bits());
        }

        driver.drive(ElectricalState::Off, 0, false);

        // Six reads can only cover all six codes if every read was valid
        // and distinct; anything else leaves a code unset.
        match builder.finish() {
            Ok(table) => {
                info!("Hall identification done: {}", table.to_raw());
                Ok(table)
            }
            Err(missing) => {
                let err = CalibrationError {
                    partial: builder.partial(),
                    observed,
                    missing,
                };
                error!(
                    "Hall identification failed: table {}, missing mask {:b}",
                    err.partial.to_raw(),
                    err.missing
                );
                Err(err)
            }
        }
    }
}
