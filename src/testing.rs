//! Test doubles shared by the unit tests.

use std::cell::Cell;
use std::collections::VecDeque;

use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;

use crate::clock::Clock;
use crate::cloud::{CloudTransport, Method, Request, Response};
use crate::error::{BusFault, TransportFault};
use crate::hal::RegisterBus;

/// In-memory register file of a single device.
pub struct FakeBus {
    address: u8,
    registers: [u8; 256],
    failing: Vec<u8>,
    pub writes: Vec<(u8, u8)>,
    pub reads: usize,
}

impl FakeBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            failing: Vec::new(),
            writes: Vec::new(),
            reads: 0,
        }
    }

    pub fn set(&mut self, register: u8, bytes: &[u8]) {
        let start = usize::from(register);
        self.registers[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Any transfer touching `register` NACKs from now on.
    pub fn fail_register(&mut self, register: u8) {
        self.failing.push(register);
    }

    pub fn heal(&mut self) {
        self.failing.clear();
    }

    fn touches_failing(&self, register: u8, len: usize) -> bool {
        let start = usize::from(register);
        self.failing
            .iter()
            .any(|&r| (start..start + len.max(1)).contains(&usize::from(r)))
    }
}

impl RegisterBus for FakeBus {
    fn read_bytes(&mut self, address: u8, register: u8, buf: &mut [u8]) -> Result<(), BusFault> {
        self.reads += 1;
        if address != self.address || self.touches_failing(register, buf.len()) {
            return Err(BusFault::NoAcknowledge);
        }
        let start = usize::from(register);
        buf.copy_from_slice(&self.registers[start..start + buf.len()]);
        Ok(())
    }

    fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<(), BusFault> {
        if address != self.address || self.touches_failing(register, 1) {
            return Err(BusFault::NoAcknowledge);
        }
        self.writes.push((register, value));
        self.registers[usize::from(register)] = value;
        Ok(())
    }
}

/// Delay that returns immediately and remembers how long it was asked to wait.
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Manually advanced clock.
pub struct FakeClock {
    now: Cell<Instant>,
    unix_base_ms: Cell<Option<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_secs(1_000)),
            unix_base_ms: Cell::new(Some(1_700_000_000_000)),
        }
    }

    pub fn unsynced() -> Self {
        let clock = Self::new();
        clock.unix_base_ms.set(None);
        clock
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn unix_ms(&self) -> Option<u64> {
        self.unix_base_ms
            .get()
            .map(|base| base + self.now.get().as_millis())
    }
}

/// One request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body_str(&self) -> &str {
        self.body
            .as_deref()
            .map(|body| std::str::from_utf8(body).unwrap())
            .unwrap_or_default()
    }
}

/// Replays canned responses in order and records every request. Runs dry with
/// `TransportFault::Connect`.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<(u16, Vec<u8>), TransportFault>>,
    pub requests: Vec<RecordedRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&mut self, status: u16, body: &str) -> &mut Self {
        self.replies.push_back(Ok((status, body.as_bytes().to_vec())));
        self
    }

    pub fn fail(&mut self, fault: TransportFault) -> &mut Self {
        self.replies.push_back(Err(fault));
        self
    }

    pub fn token_requests(&self) -> usize {
        self.requests.iter().filter(|r| r.method == Method::Get).count()
    }

    pub fn pushes(&self) -> usize {
        self.requests.iter().filter(|r| r.method == Method::Post).count()
    }
}

impl CloudTransport for ScriptedTransport {
    async fn send(
        &mut self,
        request: &Request<'_>,
        response: &mut [u8],
    ) -> Result<Response, TransportFault> {
        self.requests.push(RecordedRequest {
            method: request.method,
            path: request.path.to_string(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: request.body.map(<[u8]>::to_vec),
        });

        let (status, body) = self.replies.pop_front().unwrap_or(Err(TransportFault::Connect))?;
        let target = response
            .get_mut(..body.len())
            .ok_or(TransportFault::BufferTooSmall)?;
        target.copy_from_slice(&body);
        Ok(Response {
            status,
            len: body.len(),
        })
    }
}

pub fn token_body(access_token: &str, expire_time: u64) -> String {
    format!(
        r#"{{"result":{{"access_token":"{access_token}","expire_time":{expire_time},"refresh_token":"r3fr3sh","uid":"bay1700000000000abcd"}},"success":true,"t":1700000000000,"tid":"a1b2"}}"#
    )
}

/// A well-formed success that does not fit the response buffer.
pub fn oversized_body() -> String {
    let padding = "x".repeat(crate::cloud::RESPONSE_BUFFER_LEN);
    format!(r#"{{"result":"{padding}","success":true}}"#)
}

pub const PUSH_OK: &str = r#"{"result":true,"success":true,"t":1700000000000,"tid":"c3d4"}"#;
