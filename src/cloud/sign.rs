//! Request signatures.
//!
//! `HMAC-SHA256(secret, client_id [+ access_token] + t)`, rendered as upper-case hex.
//! Tuya rejects lower-case digests.

use core::fmt::Write as _;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 32-byte digest as 64 hex characters.
pub type Signature = heapless::String<64>;

pub fn sign(
    client_id: &str,
    client_secret: &str,
    access_token: Option<&str>,
    timestamp: &str,
) -> Signature {
    let Ok(mut mac) = HmacSha256::new_from_slice(client_secret.as_bytes()) else {
        unreachable!("HMAC takes keys of any length");
    };
    mac.update(client_id.as_bytes());
    if let Some(token) = access_token {
        mac.update(token.as_bytes());
    }
    mac.update(timestamp.as_bytes());

    let mut out = Signature::new();
    for byte in mac.finalize().into_bytes() {
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
