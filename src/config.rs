//! Build-time configuration.
//!
//! Credentials and network settings are baked into the image from the environment at
//! compile time, e.g. `TUYA_CLIENT_ID=... WIFI_SSID=... cargo build --release`.

use embassy_time::Duration;

macro_rules! env_or {
    ($name:literal, $default:literal) => {
        match option_env!($name) {
            Some(value) => value,
            None => $default,
        }
    };
}

pub const TUYA_CLIENT_ID: &str = env_or!("TUYA_CLIENT_ID", "your_client_id");
pub const TUYA_CLIENT_SECRET: &str = env_or!("TUYA_CLIENT_SECRET", "your_client_secret");
pub const TUYA_DEVICE_ID: &str = env_or!("TUYA_DEVICE_ID", "your_device_id");
/// India region.
pub const TUYA_ENDPOINT: &str = env_or!("TUYA_ENDPOINT", "https://openapi.tuyain.com");

pub const TUYA_TEMP_DP_ID: &str = env_or!("TUYA_TEMP_DP_ID", "101");
pub const TUYA_HUMID_DP_ID: &str = env_or!("TUYA_HUMID_DP_ID", "102");
pub const TUYA_HEAT_DP_ID: &str = env_or!("TUYA_HEAT_DP_ID", "103");

pub const WIFI_SSID: &str = env_or!("WIFI_SSID", "");
pub const WIFI_PASSWORD: &str = env_or!("WIFI_PASSWORD", "");
pub const NTP_SERVER: &str = env_or!("NTP_SERVER", "pool.ntp.org");

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
pub const INVALID_SAMPLE_RETRY: Duration = Duration::from_secs(1);
pub const CLOUD_SYNC_INTERVAL: Duration = Duration::from_secs(300);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Subtracted from the lifetime the server grants a token.
pub const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);
pub const SNTP_RESYNC_INTERVAL: Duration = Duration::from_secs(3600);
pub const SNTP_RETRY_INTERVAL: Duration = Duration::from_secs(10);

pub const STATUS_PORT: u16 = 5004;

/// Identifiers of the three device properties readings are written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataPoints<'a> {
    pub temperature: &'a str,
    pub humidity: &'a str,
    pub heat_index: &'a str,
}

/// Everything needed to talk to the Tuya OpenAPI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloudConfig<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub device_id: &'a str,
    pub endpoint: &'a str,
    pub data_points: DataPoints<'a>,
}

impl CloudConfig<'static> {
    pub const fn from_env() -> Self {
        Self {
            client_id: TUYA_CLIENT_ID,
            client_secret: TUYA_CLIENT_SECRET,
            device_id: TUYA_DEVICE_ID,
            endpoint: TUYA_ENDPOINT,
            data_points: DataPoints {
                temperature: TUYA_TEMP_DP_ID,
                humidity: TUYA_HUMID_DP_ID,
                heat_index: TUYA_HEAT_DP_ID,
            },
        }
    }
}
