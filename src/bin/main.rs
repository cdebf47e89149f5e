#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, DhcpConfig, StackResources};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::rmt::Rmt;
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::timer::timg::TimerGroup;
use esp_wifi::EspWifiController;
use panic_rtt_target as _;
use static_cell::StaticCell;

use esp_bme280_tuya::hal::I2cBus;
use esp_bme280_tuya::led::{Led, LedCommand};
use esp_bme280_tuya::tasks::acquisition::acquisition_task;
use esp_bme280_tuya::tasks::cloud_sync::cloud_sync_task;
use esp_bme280_tuya::tasks::led::led_task;
use esp_bme280_tuya::tasks::net::{net_task, sntp_task, wifi_task};
use esp_bme280_tuya::tasks::status_server::{status_worker, STATUS_WORKER_COUNT};
use esp_bme280_tuya::{SharedState, SystemClock, WallClock};

extern crate alloc;

// ── shared state between the tasks ───────────────────────────────────────────
static SHARED: SharedState = SharedState::new();
static WALL_CLOCK: WallClock = WallClock::new();

static LED_CHANNEL: StaticCell<Channel<NoopRawMutex, LedCommand, 4>> = StaticCell::new();
static WIFI_CONTROLLER: StaticCell<EspWifiController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<7>> = StaticCell::new();

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    // Status LED: WS2812 on GPIO8
    let led_channel = LED_CHANNEL.init(Channel::new());
    let rmt = Rmt::new(peripherals.RMT, Rate::from_mhz(80)).expect("Failed to initialize RMT");
    let led = Led::new_ws2812(rmt.channel0, peripherals.GPIO8);
    spawner.spawn(led_task(led_channel.receiver(), led)).unwrap();

    // BME280 on GPIO4 (SDA) and GPIO5 (SCL)
    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(100));
    let i2c = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(_) => {
            error!("I2C initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };

    let clock = SystemClock::new(&WALL_CLOCK);
    spawner
        .spawn(acquisition_task(
            I2cBus::new(i2c),
            &SHARED,
            clock,
            led_channel.sender(),
        ))
        .unwrap();

    // Wi-Fi station + DHCP
    let mut rng = Rng::new(peripherals.RNG);
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let wifi_init = WIFI_CONTROLLER.init(
        esp_wifi::init(timg0.timer0, rng, peripherals.RADIO_CLK)
            .expect("Failed to initialize WIFI controller"),
    );
    let (controller, interfaces) =
        esp_wifi::wifi::new(wifi_init, peripherals.WIFI).expect("Failed to create WIFI interface");

    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(DhcpConfig::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner.spawn(wifi_task(controller)).unwrap();
    spawner.spawn(net_task(runner)).unwrap();
    spawner.spawn(sntp_task(stack, &WALL_CLOCK)).unwrap();
    spawner
        .spawn(cloud_sync_task(
            stack,
            &SHARED,
            clock,
            rng,
            led_channel.sender(),
        ))
        .unwrap();
    for worker_id in 0..STATUS_WORKER_COUNT {
        spawner.spawn(status_worker(stack, &SHARED, worker_id)).unwrap();
    }

    // Nothing else to do here; park the main task.
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
