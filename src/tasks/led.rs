use defmt::debug;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Timer};
use esp_hal::rmt::Channel as RmtChannel;
use esp_hal::Blocking;

use crate::led::{Led, LedCommand, DEFAULT_BLINK_MS};

#[embassy_executor::task]
pub async fn led_task(
    led_receiver: Receiver<'static, NoopRawMutex, LedCommand, 4>,
    mut led: Led<RmtChannel<Blocking, 0>>,
) {
    let mut background = (0, 0, 0);
    led.set_color_rgb(0, 0, 0);

    loop {
        // Wait for a command from the channel
        match led_receiver.receive().await {
            LedCommand::Solid(r, g, b) => {
                debug!("LED solid: R={}, G={}, B={}", r, g, b);
                background = (r, g, b);
                led.set_color_rgb(r, g, b);
            }
            LedCommand::Blink(r, g, b, on_ms) => {
                let on_ms = on_ms.unwrap_or(DEFAULT_BLINK_MS);
                led.set_color_rgb(r, g, b);
                Timer::after(Duration::from_millis(u64::from(on_ms))).await;
                let (r, g, b) = background;
                led.set_color_rgb(r, g, b);
            }
        }
    }
}
