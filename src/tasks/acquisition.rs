use defmt::{error, info};
use embassy_time::{Delay, Timer};
use esp_hal::i2c::master::I2c;
use esp_hal::Blocking;

use super::{notify, LedSender};
use crate::acquisition::Acquisition;
use crate::bme280::Bme280;
use crate::calibration::CalibrationSource;
use crate::clock::SystemClock;
use crate::hal::I2cBus;
use crate::led::StatusEvent;
use crate::state::SharedState;

pub type SensorBus = I2cBus<I2c<'static, Blocking>>;

/// Owns the sensor bus and is the only writer of `shared`.
#[embassy_executor::task]
pub async fn acquisition_task(
    bus: SensorBus,
    shared: &'static SharedState,
    clock: SystemClock,
    led: LedSender,
) {
    let mut acquisition = Acquisition::new(Bme280::new(bus), shared, clock);

    notify(&led, StatusEvent::Calibrating);
    match acquisition.start(&mut Delay).await {
        Ok(CalibrationSource::Device) => notify(&led, StatusEvent::Running),
        Ok(CalibrationSource::Nominal) => notify(&led, StatusEvent::Degraded),
        Err(fault) => {
            error!("BME280 bring-up failed: {:?}", fault);
            error!("Check connections: SDA=GPIO4, SCL=GPIO5, VCC=3.3V, GND=GND");
            notify(&led, StatusEvent::Failed);
            return;
        }
    }
    info!("Starting measurements");

    loop {
        match acquisition.cycle() {
            Ok(outcome) => {
                notify(&led, StatusEvent::from(&outcome));
                Timer::after(outcome.wait()).await;
            }
            Err(fault) => {
                error!("Acquisition stopped: {:?}", fault);
                notify(&led, StatusEvent::Failed);
                return;
            }
        }
    }
}
