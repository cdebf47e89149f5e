#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod bme280;
pub mod calibration;
pub mod clock;
pub mod cloud;
pub mod codec;
pub mod compensation;
pub mod config;
pub mod error;
pub mod hal;
pub mod led;
pub mod sntp;
pub mod state;
pub mod status;

#[cfg(feature = "esp32c6")]
pub mod tasks;

#[cfg(test)]
mod testing;

pub use acquisition::{Acquisition, AcquisitionState, CycleOutcome};
pub use bme280::Bme280;
pub use clock::{Clock, SystemClock, WallClock};
pub use cloud::sync::{CloudSync, SyncOutcome};
pub use config::CloudConfig;
pub use hal::{I2cBus, RegisterBus};
pub use state::{Reading, ReadingSlot, SharedState};
