//! Access token lifecycle.
//!
//! Tokens come from `GET /v1.0/token?grant_type=1`, signed without a token. The expiry
//! is kept on the monotonic clock, pulled in by [`TOKEN_SAFETY_MARGIN`] so a token is
//! never used in its last minute.

use embassy_time::{Duration, Instant};
use serde::Deserialize;

use super::sign::sign;
use super::{
    check_envelope, timestamp, CloudTransport, Method, Request, RESPONSE_BUFFER_LEN, SIGN_METHOD,
};
use crate::clock::Clock;
use crate::config::{CloudConfig, TOKEN_SAFETY_MARGIN};
use crate::error::{body_excerpt, AuthError, ProtocolFault};

pub const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";

pub type AccessToken = heapless::String<128>;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuthToken {
    pub access_token: AccessToken,
    pub expires_at: Instant,
}

impl AuthToken {
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse<'a> {
    success: bool,
    #[serde(borrow)]
    result: Option<TokenResult<'a>>,
}

#[derive(Deserialize)]
struct TokenResult<'a> {
    access_token: &'a str,
    expire_time: u64,
}

/// Decodes a token response received at `now`.
pub fn parse_token_response(
    status: u16,
    body: &[u8],
    now: Instant,
) -> Result<AuthToken, ProtocolFault> {
    check_envelope(status, body)?;

    let malformed = || ProtocolFault::Malformed {
        body: body_excerpt(body),
    };
    let (response, _) =
        serde_json_core::from_slice::<TokenResponse<'_>>(body).map_err(|_| malformed())?;
    let result = match response {
        TokenResponse {
            success: true,
            result: Some(result),
        } => result,
        _ => return Err(malformed()),
    };

    let access_token = AccessToken::try_from(result.access_token).map_err(|_| malformed())?;
    if access_token.is_empty() {
        return Err(malformed());
    }

    // clamp so the tick conversion cannot overflow
    let lifetime = Duration::from_secs(result.expire_time.min(u64::from(u32::MAX)));
    let usable = lifetime
        .checked_sub(TOKEN_SAFETY_MARGIN)
        .unwrap_or(Duration::from_ticks(0));
    let expires_at = now.checked_add(usable).unwrap_or(Instant::MAX);

    Ok(AuthToken {
        access_token,
        expires_at,
    })
}

/// Holds at most one token and refreshes it on demand.
#[derive(Default)]
pub struct TokenManager {
    token: Option<AuthToken>,
}

impl TokenManager {
    pub const fn new() -> Self {
        Self { token: None }
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Returns the held token, fetching a new one first if there is none or it has
    /// expired. Failures are returned as-is; retrying is up to the caller.
    pub async fn ensure_valid_token<T, C>(
        &mut self,
        transport: &mut T,
        clock: &C,
        config: &CloudConfig<'_>,
    ) -> Result<&AuthToken, AuthError>
    where
        T: CloudTransport,
        C: Clock,
    {
        let now = clock.now();
        let token = match self.token.take() {
            Some(token) if token.is_valid_at(now) => token,
            stale => {
                if stale.is_some() {
                    debug!("Access token expired");
                }
                fetch(transport, clock, config).await?
            }
        };
        Ok(self.token.insert(token))
    }
}

async fn fetch<T: CloudTransport, C: Clock>(
    transport: &mut T,
    clock: &C,
    config: &CloudConfig<'_>,
) -> Result<AuthToken, AuthError> {
    let unix_ms = clock.unix_ms().ok_or(AuthError::ClockUnsynced)?;
    let t = timestamp(unix_ms);
    let signature = sign(config.client_id, config.client_secret, None, &t);

    let headers = [
        ("client_id", config.client_id),
        ("sign", signature.as_str()),
        ("sign_method", SIGN_METHOD),
        ("t", t.as_str()),
    ];
    let request = Request {
        method: Method::Get,
        path: TOKEN_PATH,
        headers: &headers,
        body: None,
    };

    let mut buf = [0u8; RESPONSE_BUFFER_LEN];
    let response = transport.send(&request, &mut buf).await?;
    let body = &buf[..response.len.min(buf.len())];

    let token = parse_token_response(response.status, body, clock.now())?;
    info!("Tuya token obtained");
    Ok(token)
}
