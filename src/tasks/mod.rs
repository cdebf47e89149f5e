pub mod acquisition;
pub mod cloud_sync;
pub mod led;
pub mod net;
pub mod status_server;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Sender;

use crate::led::{LedCommand, StatusEvent};

pub type LedSender = Sender<'static, NoopRawMutex, LedCommand, 4>;

/// Shows `event` on the LED unless the LED task is behind.
pub(crate) fn notify(led: &LedSender, event: StatusEvent) {
    let _ = led.try_send(event.command());
}
