//! Tuya OpenAPI client: request signing, token lifecycle and the periodic push.
//!
//! The HTTP exchange itself sits behind [`CloudTransport`] so the protocol logic runs
//! unchanged on the device (reqwless over embassy-net) and in host tests.

pub mod sign;
pub mod sync;
pub mod token;

use core::fmt::Write as _;

use serde::Deserialize;

use crate::error::{body_excerpt, ProtocolFault, TransportFault};

pub const SIGN_METHOD: &str = "HMAC-SHA256";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Bytes reserved for one response body.
pub const RESPONSE_BUFFER_LEN: usize = 1024;

/// Decimal Unix milliseconds, as sent in the `t` header.
pub type Timestamp = heapless::String<20>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
}

/// One request against the configured endpoint. `path` includes the query string.
#[derive(Debug)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: Option<&'a [u8]>,
}

impl Request<'_> {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

/// Status line and the number of body bytes written into the caller's buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    pub status: u16,
    pub len: usize,
}

#[allow(async_fn_in_trait)]
pub trait CloudTransport {
    /// Performs one HTTP exchange, copying the response body into `response`.
    async fn send(
        &mut self,
        request: &Request<'_>,
        response: &mut [u8],
    ) -> Result<Response, TransportFault>;
}

impl<T: CloudTransport + ?Sized> CloudTransport for &mut T {
    async fn send(
        &mut self,
        request: &Request<'_>,
        response: &mut [u8],
    ) -> Result<Response, TransportFault> {
        (**self).send(request, response).await
    }
}

pub fn timestamp(unix_ms: u64) -> Timestamp {
    let mut t = Timestamp::new();
    // u64::MAX has 20 digits
    let _ = write!(t, "{}", unix_ms);
    t
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    code: Option<u32>,
}

/// Checks the status line and the `success` flag every Tuya response carries.
pub(crate) fn check_envelope(status: u16, body: &[u8]) -> Result<(), ProtocolFault> {
    if status != 200 {
        return Err(ProtocolFault::Status {
            status,
            body: body_excerpt(body),
        });
    }
    match serde_json_core::from_slice::<Envelope>(body) {
        Ok((Envelope { success: true, .. }, _)) => Ok(()),
        Ok((Envelope { success: false, code }, _)) => Err(ProtocolFault::Rejected {
            code,
            body: body_excerpt(body),
        }),
        Err(_) => Err(ProtocolFault::Malformed {
            body: body_excerpt(body),
        }),
    }
}
