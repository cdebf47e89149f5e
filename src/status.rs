//! The local status page: routing and rendering, independent of the socket.
//!
//! `GET /` answers with the latest reading or a 500 when none is available.

use core::fmt::Write as _;

use chrono::DateTime;
use serde::Serialize;

use crate::state::{Reading, StatusSnapshot};

pub const BODY_CAPACITY: usize = 384;
pub type Body = heapless::String<BODY_CAPACITY>;

/// Status line and headers; the body follows separately.
pub type Head = heapless::String<160>;

type Field = heapless::String<24>;
type LastUpdate = heapless::String<24>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Status,
    NotFound,
    MethodNotAllowed,
    BadRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: Body,
}

#[derive(Serialize)]
struct Metrics {
    temperature: Field,
    humidity: Field,
    heat_index: Field,
}

#[derive(Serialize)]
struct Available<'a> {
    status: &'static str,
    data: Metrics,
    tuya_device: &'a str,
    last_update: Option<LastUpdate>,
}

#[derive(Serialize)]
struct Failure<'a> {
    status: &'static str,
    message: &'a str,
}

/// Routes on the request line of `head`; headers are ignored.
pub fn route(head: &[u8]) -> Route {
    let line = head
        .split(|&b| b == b'\n')
        .next()
        .and_then(|line| core::str::from_utf8(line).ok())
        .map(str::trim_end);
    let Some(line) = line else {
        return Route::BadRequest;
    };

    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Route::BadRequest;
    };
    if !version.starts_with("HTTP/1.") || parts.next().is_some() {
        return Route::BadRequest;
    }

    let path = target.split('?').next().unwrap_or(target);
    match (method, path) {
        ("GET", "/") => Route::Status,
        (_, "/") => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

pub fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_last_update(unix_ms: u64) -> Option<LastUpdate> {
    let seconds = i64::try_from(unix_ms / 1000).ok()?;
    let utc = DateTime::from_timestamp(seconds, 0)?;
    let mut out = LastUpdate::new();
    write!(out, "{}", utc.naive_utc()).ok()?;
    Some(out)
}

fn field(value: f64, unit: &str) -> Field {
    let mut out = Field::new();
    let _ = write!(out, "{:.2} {}", value, unit);
    out
}

fn failure(status: u16, message: &str) -> Page {
    let body = serde_json_core::to_string(&Failure {
        status: "error",
        message,
    })
    .unwrap_or_default();
    Page { status, body }
}

fn available(reading: &Reading, device_id: &str, last_push_unix_ms: Option<u64>) -> Page {
    let page = Available {
        status: "success",
        data: Metrics {
            temperature: field(reading.temperature_c, "°C"),
            humidity: field(reading.humidity_pct, "%"),
            heat_index: field(reading.heat_index_c, "°C"),
        },
        tuya_device: device_id,
        last_update: last_push_unix_ms.and_then(format_last_update),
    };
    match serde_json_core::to_string(&page) {
        Ok(body) => Page { status: 200, body },
        Err(_) => failure(500, "Status page too large"),
    }
}

/// Renders the current state.
pub fn render(snapshot: &StatusSnapshot, device_id: &str) -> Page {
    match snapshot.slot.reading() {
        Some(reading) => available(&reading, device_id, snapshot.last_push_unix_ms),
        None => failure(500, "Sensor data not available"),
    }
}

pub fn respond(route: Route, snapshot: &StatusSnapshot, device_id: &str) -> Page {
    match route {
        Route::Status => render(snapshot, device_id),
        Route::NotFound => failure(404, "Not found"),
        Route::MethodNotAllowed => failure(405, "Method not allowed"),
        Route::BadRequest => failure(400, "Bad request"),
    }
}

pub fn write_head(page: &Page) -> Head {
    let mut head = Head::new();
    let _ = write!(
        head,
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\
         \r\n",
        page.status,
        reason(page.status),
        page.body.len()
    );
    head
}
