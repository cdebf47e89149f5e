//! Sensor registers in, Tuya commands and status page out.

use std::cell::Cell;
use std::collections::VecDeque;

use embassy_futures::block_on;
use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;

use esp_bme280_tuya::bme280::{BME280_ADDR, CHIP_ID, REG_CHIP_ID, REG_DATA};
use esp_bme280_tuya::cloud::{CloudTransport, Method, Request, Response};
use esp_bme280_tuya::error::{BusFault, TransportFault};
use esp_bme280_tuya::status;
use esp_bme280_tuya::{
    Acquisition, AcquisitionState, Bme280, Clock, CloudConfig, CloudSync, CycleOutcome,
    RegisterBus, SharedState, SyncOutcome,
};

struct Registers([u8; 256]);

impl RegisterBus for Registers {
    fn read_bytes(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        if address != BME280_ADDR {
            return Err(BusFault::NoAcknowledge);
        }
        let start = usize::from(register);
        buf.copy_from_slice(&self.0[start..start + buf.len()]);
        Ok(())
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusFault> {
        if address != BME280_ADDR {
            return Err(BusFault::NoAcknowledge);
        }
        self.0[usize::from(register)] = value;
        Ok(())
    }
}

fn bme280() -> Registers {
    let mut regs = [0u8; 256];
    regs[usize::from(REG_CHIP_ID)] = CHIP_ID;
    regs[0x88..0x8E].copy_from_slice(&[0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC]);
    regs[0xA1] = 75;
    regs[0xE1..0xE8].copy_from_slice(&[0x68, 0x01, 0x00, 0x12, 0x2C, 0x03, 0x1E]);
    // raw temperature 538888, raw humidity 30000
    let data = usize::from(REG_DATA);
    regs[data..data + 8].copy_from_slice(&[0x65, 0x5A, 0xC0, 0x83, 0x90, 0x80, 0x75, 0x30]);
    Registers(regs)
}

struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

struct TestClock {
    now: Cell<Instant>,
}

impl TestClock {
    fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn unix_ms(&self) -> Option<u64> {
        Some(1_700_000_000_000 + self.now.get().as_millis())
    }
}

#[derive(Default)]
struct Cloud {
    replies: VecDeque<(u16, &'static str)>,
    sent: Vec<(Method, String, Option<String>)>,
}

impl CloudTransport for Cloud {
    async fn send(
        &mut self,
        request: &Request<'_>,
        response: &mut [u8],
    ) -> Result<Response, TransportFault> {
        self.sent.push((
            request.method,
            request.path.to_string(),
            request.body.map(|b| String::from_utf8(b.to_vec()).unwrap()),
        ));
        let (status, body) = self.replies.pop_front().ok_or(TransportFault::Connect)?;
        response[..body.len()].copy_from_slice(body.as_bytes());
        Ok(Response {
            status,
            len: body.len(),
        })
    }
}

const TOKEN: &str = r#"{"result":{"access_token":"3f4e5d","expire_time":7200,"refresh_token":"x","uid":"y"},"success":true,"t":1700000000000}"#;
const PUSHED: &str = r#"{"result":true,"success":true,"t":1700000000000}"#;

#[test]
fn reading_flows_to_cloud_and_status_page() {
    let shared = SharedState::new();
    let clock = TestClock {
        now: Cell::new(Instant::from_secs(60)),
    };
    let mut bus = bme280();
    let mut acquisition = Acquisition::new(Bme280::new(&mut bus), &shared, &clock);

    block_on(acquisition.start(&mut NoDelay)).unwrap();
    let outcome = acquisition.cycle().unwrap();
    assert!(matches!(outcome, CycleOutcome::Published(_)));
    assert_eq!(acquisition.state(), AcquisitionState::Sampling);

    let reading = shared.try_take_fresh().expect("fresh reading");
    assert!((reading.temperature_c - 31.03125).abs() < 1e-12);
    assert!((reading.humidity_pct - 59.56024430858384).abs() < 1e-9);
    assert!((reading.heat_index_c - 26.467554700882484).abs() < 1e-9);

    // nothing pushed yet
    let page = status::render(&shared.snapshot(), "bf-device");
    assert_eq!(page.status, 200);
    assert!(page.body.contains(r#""temperature":"31.03 °C""#));
    assert!(page.body.ends_with(r#""last_update":null}"#));

    let mut cloud_api = Cloud::default();
    cloud_api.replies.extend([(200, TOKEN), (200, PUSHED)]);
    let mut cloud = CloudSync::new(CloudConfig::from_env(), &shared);

    let synced = block_on(cloud.maybe_sync(&mut cloud_api, &clock, &reading));
    assert_eq!(synced, Some(SyncOutcome::Success));
    assert_eq!(cloud_api.sent[0].0, Method::Get);
    assert_eq!(cloud_api.sent[1].0, Method::Post);
    assert_eq!(
        cloud_api.sent[1].2.as_deref(),
        Some(r#"{"commands":[{"code":"101","value":310},{"code":"102","value":596},{"code":"103","value":265}]}"#)
    );

    let page = status::render(&shared.snapshot(), "bf-device");
    assert!(page.body.ends_with(r#""last_update":"2023-11-14 22:14:20"}"#));

    // the next sample is within the interval: no traffic
    clock.advance(Duration::from_secs(2));
    acquisition.cycle().unwrap();
    let reading = shared.try_take_fresh().expect("fresh reading");
    assert_eq!(block_on(cloud.maybe_sync(&mut cloud_api, &clock, &reading)), None);
    assert_eq!(cloud_api.sent.len(), 2);
}

#[test]
fn cloud_outage_never_touches_readings() {
    let shared = SharedState::new();
    let clock = TestClock {
        now: Cell::new(Instant::from_secs(60)),
    };
    let mut bus = bme280();
    let mut acquisition = Acquisition::new(Bme280::new(&mut bus), &shared, &clock);
    block_on(acquisition.start(&mut NoDelay)).unwrap();

    let mut cloud_api = Cloud::default();
    let mut cloud = CloudSync::new(CloudConfig::from_env(), &shared);

    for _ in 0..3 {
        acquisition.cycle().unwrap();
        let reading = shared.try_take_fresh().expect("fresh reading");
        let outcome = block_on(cloud.maybe_sync(&mut cloud_api, &clock, &reading));
        assert_eq!(outcome, Some(SyncOutcome::Deferred));
        assert_eq!(shared.latest(), Some(reading));
        clock.advance(Duration::from_secs(2));
    }
    // every attempt stopped at the token request
    assert_eq!(cloud_api.sent.len(), 3);
    assert!(cloud_api.sent.iter().all(|(method, _, _)| *method == Method::Get));
    assert_eq!(cloud.last_successful_push(), None);
}

#[test]
fn wrong_chip_leaves_status_unavailable() {
    let shared = SharedState::new();
    let clock = TestClock {
        now: Cell::new(Instant::from_secs(0)),
    };
    let mut bus = bme280();
    bus.0[usize::from(REG_CHIP_ID)] = 0x58; // BMP280
    let mut acquisition = Acquisition::new(Bme280::new(&mut bus), &shared, &clock);

    assert!(block_on(acquisition.start(&mut NoDelay)).is_err());
    assert!(matches!(acquisition.state(), AcquisitionState::Failed(_)));

    let page = status::render(&shared.snapshot(), "bf-device");
    assert_eq!(page.status, 500);
    assert_eq!(
        page.body.as_str(),
        r#"{"status":"error","message":"Sensor data not available"}"#
    );
}
