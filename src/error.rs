//! Fault taxonomy shared by the acquisition and cloud halves of the node.

/// Number of response-body bytes kept for diagnostics.
pub const BODY_EXCERPT_LEN: usize = 128;

/// Leading part of a cloud response body, kept for logging.
pub type BodyExcerpt = heapless::String<BODY_EXCERPT_LEN>;

/// Failure of a single transfer on the register bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    /// The device did not acknowledge its address or a data byte.
    NoAcknowledge,
    /// Another controller won arbitration.
    ArbitrationLoss,
    /// Misplaced START/STOP or similar bus error.
    Bus,
    /// Data was lost because the peripheral could not keep up.
    Overrun,
    /// Anything the HAL could not classify.
    Other,
}

impl From<embedded_hal::i2c::ErrorKind> for BusFault {
    fn from(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::ErrorKind;

        match kind {
            ErrorKind::NoAcknowledge(_) => BusFault::NoAcknowledge,
            ErrorKind::ArbitrationLoss => BusFault::ArbitrationLoss,
            ErrorKind::Bus => BusFault::Bus,
            ErrorKind::Overrun => BusFault::Overrun,
            _ => BusFault::Other,
        }
    }
}

/// Failure while bringing the sensor up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationFault {
    /// The identity register did not hold the expected chip id.
    ChipIdMismatch { found: u8 },
    /// A setup or calibration register could not be transferred.
    Bus(BusFault),
}

impl From<BusFault> for CalibrationFault {
    fn from(fault: BusFault) -> Self {
        CalibrationFault::Bus(fault)
    }
}

/// Why an acquisition cycle produced no reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SkipReason {
    /// The temperature channel returned one of its "no data" codes.
    InvalidTemperature(u32),
    /// The humidity channel returned one of its "no data" codes.
    InvalidHumidity(u32),
    /// The burst read failed on the bus.
    Bus(BusFault),
}

/// Faults that end acquisition for the rest of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionFault {
    /// A cycle was requested before the sensor was calibrated.
    NotCalibrated,
    /// Bring-up failed (wrong chip or dead bus).
    Calibration(CalibrationFault),
    /// Too many consecutive burst reads failed.
    BusLost { consecutive: u32 },
}

impl From<CalibrationFault> for AcquisitionFault {
    fn from(fault: CalibrationFault) -> Self {
        AcquisitionFault::Calibration(fault)
    }
}

/// A compensation formula produced a non-finite value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NonFinite;

/// Network-level failure talking to the cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportFault {
    Dns,
    Connect,
    Tls,
    Io,
    Timeout,
    /// The response did not fit the receive buffer.
    BufferTooSmall,
    /// The request could not be serialized into its buffer.
    RequestTooLarge,
}

/// The cloud answered, but not with what the protocol expects.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolFault {
    /// Non-200 HTTP status.
    Status { status: u16, body: BodyExcerpt },
    /// HTTP 200 with `success: false`, and the Tuya error `code` if one was sent.
    Rejected { code: Option<u32>, body: BodyExcerpt },
    /// HTTP 200 but the body could not be decoded.
    Malformed { body: BodyExcerpt },
}

/// Tuya error codes for an access token the server no longer accepts.
pub const TOKEN_REJECTED_CODES: [u32; 2] = [1010, 1011];

impl ProtocolFault {
    /// Whether the server refused the access token itself.
    pub fn rejects_token(&self) -> bool {
        matches!(
            self,
            ProtocolFault::Rejected { code: Some(code), .. } if TOKEN_REJECTED_CODES.contains(code)
        )
    }
}

/// Failure to obtain a usable access token.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AuthError {
    Transport(TransportFault),
    Protocol(ProtocolFault),
    /// Requests cannot be signed until wall time is known.
    ClockUnsynced,
}

impl From<TransportFault> for AuthError {
    fn from(fault: TransportFault) -> Self {
        AuthError::Transport(fault)
    }
}

impl From<ProtocolFault> for AuthError {
    fn from(fault: ProtocolFault) -> Self {
        AuthError::Protocol(fault)
    }
}

/// Why a push did not go through. Never leaves the cloud sync; it ends up in the log.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncError {
    Auth(AuthError),
    Transport(TransportFault),
    Protocol(ProtocolFault),
}

impl From<AuthError> for SyncError {
    fn from(error: AuthError) -> Self {
        SyncError::Auth(error)
    }
}

impl From<TransportFault> for SyncError {
    fn from(fault: TransportFault) -> Self {
        SyncError::Transport(fault)
    }
}

impl From<ProtocolFault> for SyncError {
    fn from(fault: ProtocolFault) -> Self {
        SyncError::Protocol(fault)
    }
}

/// Copies at most [`BODY_EXCERPT_LEN`] bytes of `body`, stopping at the last complete
/// UTF-8 character.
pub fn body_excerpt(body: &[u8]) -> BodyExcerpt {
    let head = &body[..body.len().min(BODY_EXCERPT_LEN)];
    let text = match core::str::from_utf8(head) {
        Ok(text) => text,
        // `valid_up_to` is always a char boundary
        Err(e) => core::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default(),
    };
    let mut excerpt = BodyExcerpt::new();
    let _ = excerpt.push_str(text);
    excerpt
}
