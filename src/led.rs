//! Status LED: what each node event looks like, and the WS2812 driver that shows it.

#[cfg(feature = "esp32c6")]
pub(crate) use esp_hal::rmt::{TxChannel, TxChannelCreator};
#[cfg(feature = "esp32c6")]
use esp_hal::gpio::OutputPin;
#[cfg(feature = "esp32c6")]
use esp_hal_smartled::{smart_led_buffer, SmartLedsAdapter};
#[cfg(feature = "esp32c6")]
use smart_leds::{SmartLedsWrite, RGB8};

use crate::acquisition::CycleOutcome;
use crate::cloud::sync::SyncOutcome;

/// How long a blink stays lit when the command does not say.
pub const DEFAULT_BLINK_MS: u16 = 120;

// Messages for the LED task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedCommand {
    /// Background colour, kept until the next `Solid`.
    Solid(u8, u8, u8),
    /// Flash once, then return to the background colour.
    Blink(u8, u8, u8, Option<u16>), // r, g, b, on-time in ms
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusEvent {
    Calibrating,
    /// Running, but on nominal calibration.
    Degraded,
    Running,
    Published,
    Skipped,
    Failed,
    PushSucceeded,
    PushDeferred,
}

impl StatusEvent {
    pub fn command(self) -> LedCommand {
        match self {
            StatusEvent::Calibrating => LedCommand::Solid(24, 12, 0),
            StatusEvent::Degraded => LedCommand::Solid(16, 0, 16),
            StatusEvent::Running => LedCommand::Solid(0, 0, 0),
            StatusEvent::Published => LedCommand::Blink(0, 32, 0, None),
            StatusEvent::Skipped => LedCommand::Blink(32, 32, 0, None),
            StatusEvent::Failed => LedCommand::Solid(48, 0, 0),
            StatusEvent::PushSucceeded => LedCommand::Blink(0, 0, 48, Some(400)),
            StatusEvent::PushDeferred => LedCommand::Blink(48, 16, 0, Some(400)),
        }
    }
}

impl From<&CycleOutcome> for StatusEvent {
    fn from(outcome: &CycleOutcome) -> Self {
        match outcome {
            CycleOutcome::Published(_) => StatusEvent::Published,
            CycleOutcome::Skipped(_) => StatusEvent::Skipped,
        }
    }
}

impl From<SyncOutcome> for StatusEvent {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Success => StatusEvent::PushSucceeded,
            SyncOutcome::Deferred => StatusEvent::PushDeferred,
        }
    }
}

#[cfg(feature = "esp32c6")]
/// Single on-board WS2812 driven over RMT.
pub struct Led<TX>
where
    TX: TxChannel,
{
    ws2812: SmartLedsAdapter<TX, 25>,
}

#[cfg(feature = "esp32c6")]
impl<TX> Led<TX>
where
    TX: TxChannel,
{
    pub fn new_ws2812<C, O>(channel: C, pin: O) -> Self
    where
        C: TxChannelCreator<'static, TX>,
        O: OutputPin + 'static,
    {
        let ws2812 = SmartLedsAdapter::new(channel, pin, smart_led_buffer!(1));
        Self { ws2812 }
    }

    pub fn set_color_rgb(&mut self, r: u8, g: u8, b: u8) {
        // a dropped frame is repainted by the next command
        let _ = self.ws2812.write([RGB8::new(r, g, b)].iter().cloned());
    }
}
