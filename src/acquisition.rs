//! Sensor lifecycle: bring-up, calibration and the per-sample cycle.
//!
//! ```text
//! Uninitialized ──start()──▶ Calibrated ──cycle()──▶ Sampling ─┐
//!       │                                              ▲       │ cycle()
//!       └──── wrong chip / dead bus ──▶ Failed ◀── bus lost ───┘
//! ```
//!
//! `Failed` is terminal: the shared reading is cleared and stays unavailable.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

use crate::bme280::Bme280;
use crate::calibration::{self, CalibrationCoefficients, CalibrationSource};
use crate::clock::Clock;
use crate::compensation::{compensate_humidity, compensate_temperature, heat_index};
use crate::config::{INVALID_SAMPLE_RETRY, SAMPLE_INTERVAL};
use crate::error::{AcquisitionFault, SkipReason};
use crate::hal::RegisterBus;
use crate::state::{Reading, SharedState};

/// Burst-read failures in a row after which the sensor is considered gone.
pub const MAX_CONSECUTIVE_BUS_FAULTS: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    Uninitialized,
    Calibrated,
    Sampling,
    Failed(AcquisitionFault),
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    Published(Reading),
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// How long to wait before the next cycle.
    pub fn wait(&self) -> Duration {
        match self {
            CycleOutcome::Published(_) => SAMPLE_INTERVAL,
            CycleOutcome::Skipped(_) => INVALID_SAMPLE_RETRY,
        }
    }
}

pub struct Acquisition<'a, B, C> {
    sensor: Bme280<B>,
    shared: &'a SharedState,
    clock: C,
    state: AcquisitionState,
    calibration: Option<(CalibrationCoefficients, CalibrationSource)>,
    bus_faults: u32,
}

impl<'a, B: RegisterBus, C: Clock> Acquisition<'a, B, C> {
    pub fn new(sensor: Bme280<B>, shared: &'a SharedState, clock: C) -> Self {
        Self {
            sensor,
            shared,
            clock,
            state: AcquisitionState::Uninitialized,
            calibration: None,
            bus_faults: 0,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn calibration(&self) -> Option<(CalibrationCoefficients, CalibrationSource)> {
        self.calibration
    }

    /// Verifies and configures the sensor, then loads its calibration.
    ///
    /// A missing or foreign chip moves to `Failed`; unreadable calibration only
    /// degrades accuracy (see [`CalibrationSource::Nominal`]).
    pub async fn start<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationSource, AcquisitionFault> {
        match self.state {
            AcquisitionState::Uninitialized => {}
            AcquisitionState::Failed(fault) => return Err(fault),
            AcquisitionState::Calibrated | AcquisitionState::Sampling => {
                if let Some((_, source)) = self.calibration {
                    return Ok(source);
                }
            }
        }

        if let Err(fault) = self.sensor.init(delay).await {
            return Err(self.fail(fault.into()));
        }

        let address = self.sensor.address();
        let (coefficients, source) = calibration::load_or_nominal(self.sensor.bus(), address);
        if source == CalibrationSource::Nominal {
            warn!("Running on nominal calibration; readings are approximate");
        }
        self.calibration = Some((coefficients, source));
        self.state = AcquisitionState::Calibrated;
        info!("Sensor calibrated ({:?})", source);
        Ok(source)
    }

    /// Reads, validates and compensates one sample, publishing it on success.
    pub fn cycle(&mut self) -> Result<CycleOutcome, AcquisitionFault> {
        let coefficients = match (self.state, self.calibration) {
            (AcquisitionState::Failed(fault), _) => return Err(fault),
            (AcquisitionState::Calibrated | AcquisitionState::Sampling, Some((c, _))) => c,
            _ => return Err(AcquisitionFault::NotCalibrated),
        };
        self.state = AcquisitionState::Sampling;

        let raw = match self.sensor.read_raw() {
            Ok(raw) => {
                self.bus_faults = 0;
                raw
            }
            Err(fault) => {
                self.bus_faults += 1;
                warn!(
                    "Burst read failed ({:?}), {} in a row",
                    fault, self.bus_faults
                );
                if self.bus_faults >= MAX_CONSECUTIVE_BUS_FAULTS {
                    let fault = AcquisitionFault::BusLost {
                        consecutive: self.bus_faults,
                    };
                    return Err(self.fail(fault));
                }
                return Ok(CycleOutcome::Skipped(SkipReason::Bus(fault)));
            }
        };

        if !raw.temperature_valid() {
            warn!("Invalid temperature code {}", raw.temp_raw);
            return Ok(CycleOutcome::Skipped(SkipReason::InvalidTemperature(raw.temp_raw)));
        }
        if !raw.humidity_valid() {
            warn!("Invalid humidity code {}", raw.hum_raw);
            return Ok(CycleOutcome::Skipped(SkipReason::InvalidHumidity(raw.hum_raw)));
        }

        let temperature = compensate_temperature(raw.temp_raw, &coefficients.temperature);
        let humidity_pct =
            compensate_humidity(raw.hum_raw, &coefficients.humidity, temperature.t_fine);
        let heat_index_c = heat_index(temperature.celsius, humidity_pct);

        let reading = Reading {
            temperature_c: temperature.celsius,
            humidity_pct,
            heat_index_c,
            timestamp: self.clock.now(),
        };
        self.shared.publish(reading);
        info!(
            "Temp: {} C, Hum: {} %, HI: {} C",
            reading.temperature_c, reading.humidity_pct, reading.heat_index_c
        );

        Ok(CycleOutcome::Published(reading))
    }

    fn fail(&mut self, fault: AcquisitionFault) -> AcquisitionFault {
        error!("Acquisition failed: {:?}", fault);
        self.state = AcquisitionState::Failed(fault);
        self.shared.mark_unavailable();
        fault
    }
}
