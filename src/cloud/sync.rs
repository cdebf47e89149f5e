//! Periodic push of the latest reading to the device's data points.
//!
//! A push is attempted when none has succeeded for [`CLOUD_SYNC_INTERVAL`]. Any
//! failure leaves the schedule untouched, so the next reading retries from scratch.

use core::fmt::Write as _;

use embassy_time::Instant;
use serde::Serialize;

use super::sign::sign;
use super::token::TokenManager;
use super::{
    check_envelope, timestamp, CloudTransport, Method, Request, CONTENT_TYPE_JSON,
    RESPONSE_BUFFER_LEN, SIGN_METHOD,
};
use crate::clock::Clock;
use crate::config::{CloudConfig, CLOUD_SYNC_INTERVAL};
use crate::error::{AuthError, SyncError, TransportFault};
use crate::state::{Reading, SharedState};

const COMMANDS_BODY_LEN: usize = 256;
type CommandsPath = heapless::String<128>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncOutcome {
    Success,
    /// Nothing changed; try again with the next reading.
    Deferred,
}

#[derive(Serialize)]
struct Command<'a> {
    code: &'a str,
    value: i32,
}

#[derive(Serialize)]
struct Commands<'a> {
    commands: [Command<'a>; 3],
}

/// Fixed point with one decimal: 24.56 becomes 246.
pub fn scaled(value: f64) -> i32 {
    libm::round(value * 10.0) as i32
}

pub fn commands_path(device_id: &str) -> Result<CommandsPath, TransportFault> {
    let mut path = CommandsPath::new();
    write!(path, "/v1.0/devices/{}/commands", device_id)
        .map_err(|_| TransportFault::RequestTooLarge)?;
    Ok(path)
}

/// Serializes the three data point commands for `reading` into `buf`.
pub fn encode_commands(
    config: &CloudConfig<'_>,
    reading: &Reading,
    buf: &mut [u8],
) -> Result<usize, TransportFault> {
    let points = &config.data_points;
    let body = Commands {
        commands: [
            Command {
                code: points.temperature,
                value: scaled(reading.temperature_c),
            },
            Command {
                code: points.humidity,
                value: scaled(reading.humidity_pct),
            },
            Command {
                code: points.heat_index,
                value: scaled(reading.heat_index_c),
            },
        ],
    };
    serde_json_core::to_slice(&body, buf).map_err(|_| TransportFault::RequestTooLarge)
}

pub struct CloudSync<'a> {
    config: CloudConfig<'a>,
    shared: &'a SharedState,
    tokens: TokenManager,
    last_successful_push: Option<Instant>,
}

impl<'a> CloudSync<'a> {
    pub fn new(config: CloudConfig<'a>, shared: &'a SharedState) -> Self {
        Self {
            config,
            shared,
            tokens: TokenManager::new(),
            last_successful_push: None,
        }
    }

    pub fn last_successful_push(&self) -> Option<Instant> {
        self.last_successful_push
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_successful_push {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= CLOUD_SYNC_INTERVAL,
        }
    }

    /// [`sync`](Self::sync) if the interval has elapsed, `None` otherwise.
    pub async fn maybe_sync<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        reading: &Reading,
    ) -> Option<SyncOutcome>
    where
        T: CloudTransport,
        C: Clock,
    {
        if !self.is_due(clock.now()) {
            return None;
        }
        Some(self.sync(transport, clock, reading).await)
    }

    /// Pushes `reading`, refreshing the access token first if needed.
    ///
    /// A success is stamped with the time the attempt started.
    pub async fn sync<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        reading: &Reading,
    ) -> SyncOutcome
    where
        T: CloudTransport,
        C: Clock,
    {
        let started = clock.now();
        let started_unix_ms = clock.unix_ms();

        let access_token = match self
            .tokens
            .ensure_valid_token(transport, clock, &self.config)
            .await
        {
            Ok(token) => token.access_token.clone(),
            Err(e) => {
                warn!("Tuya token unavailable: {:?}", e);
                return SyncOutcome::Deferred;
            }
        };

        match self.push(transport, clock, &access_token, reading).await {
            Ok(()) => {
                self.last_successful_push = Some(started);
                if let Some(unix_ms) = started_unix_ms {
                    self.shared.record_push(unix_ms);
                }
                info!(
                    "Data sent to Tuya: Temp={} C, Hum={} %, HI={} C",
                    reading.temperature_c, reading.humidity_pct, reading.heat_index_c
                );
                SyncOutcome::Success
            }
            Err(SyncError::Protocol(fault)) if fault.rejects_token() => {
                warn!("Tuya refused the access token, dropping it: {:?}", fault);
                self.tokens.invalidate();
                SyncOutcome::Deferred
            }
            Err(e) => {
                warn!("Tuya push failed, will retry: {:?}", e);
                SyncOutcome::Deferred
            }
        }
    }

    async fn push<T, C>(
        &self,
        transport: &mut T,
        clock: &C,
        access_token: &str,
        reading: &Reading,
    ) -> Result<(), SyncError>
    where
        T: CloudTransport,
        C: Clock,
    {
        let path = commands_path(self.config.device_id)?;
        let mut body = [0u8; COMMANDS_BODY_LEN];
        let body_len = encode_commands(&self.config, reading, &mut body)?;

        let unix_ms = clock.unix_ms().ok_or(AuthError::ClockUnsynced)?;
        let t = timestamp(unix_ms);
        let signature = sign(
            self.config.client_id,
            self.config.client_secret,
            Some(access_token),
            &t,
        );

        let headers = [
            ("client_id", self.config.client_id),
            ("access_token", access_token),
            ("sign_method", SIGN_METHOD),
            ("t", t.as_str()),
            ("sign", signature.as_str()),
            ("Content-Type", CONTENT_TYPE_JSON),
        ];
        let request = Request {
            method: Method::Post,
            path: &path,
            headers: &headers,
            body: Some(&body[..body_len]),
        };

        let mut buf = [0u8; RESPONSE_BUFFER_LEN];
        let response = transport.send(&request, &mut buf).await?;
        check_envelope(response.status, &buf[..response.len.min(buf.len())])?;
        Ok(())
    }
}
