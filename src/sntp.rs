//! Minimal SNTPv4 client packet handling (RFC 4330).

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_OFFSET_S: u64 = 2_208_988_800;

/// Length of one NTP era (2^32 seconds).
const NTP_ERA_S: u64 = 1 << 32;

const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const VERSION: u8 = 4;

/// A client request: LI = 0, VN = 4, mode = client, everything else zero.
pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Extracts the server's transmit timestamp as Unix milliseconds.
///
/// Returns `None` for short packets, anything that is not a server reply, a
/// kiss-of-death (stratum 0) or an unset timestamp.
pub fn parse_response(packet: &[u8]) -> Option<u64> {
    let packet: &[u8; PACKET_LEN] = packet.get(..PACKET_LEN)?.try_into().ok()?;

    if packet[0] & 0x07 != MODE_SERVER || packet[1] == 0 {
        return None;
    }

    let seconds = u64::from(u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]));
    let fraction = u64::from(u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]));
    if seconds == 0 {
        return None;
    }

    // RFC 4330 §3: with the top bit clear the timestamp is in era 1 (from 2036-02-07)
    let seconds = if seconds & 0x8000_0000 == 0 {
        seconds + NTP_ERA_S
    } else {
        seconds
    };
    let unix_seconds = seconds.checked_sub(NTP_UNIX_OFFSET_S)?;
    Some(unix_seconds * 1000 + ((fraction * 1000) >> 32))
}
