//! Wire format for the reconnect handshake.
//!
//! A client-side proxy that lost its connection to a running game re-opens
//! a TCP socket to the orchestrator's reconnect port and sends a single
//! length-prefixed frame identifying the player and the last packet it
//! saw. This crate only knows about bytes; it has no opinion about sockets,
//! games, or timers.
//!
//! Frame layout (all integers little-endian):
//!
//! ```text
//! byte 0      magic header constant (HEADER_MAGIC)
//! byte 1      message type
//! bytes 2-3   u16 total length, including this header
//! bytes 4..   payload, depends on message type
//! ```

use serde::{Deserialize, Serialize};

/// Marks the start of every frame. Any other value in byte 0 is treated as
/// an invalid handshake and rejected without inspecting the rest of the
/// buffer.
pub const HEADER_MAGIC: u8 = 0xF7;

/// Message type for a reconnect request (Client -> Orchestrator).
pub const MSG_TYPE_RECONNECT: u8 = 0x02;

/// Message type used for a rejection whose code is "invalid" (malformed
/// handshake, unknown message type, or bad magic byte).
pub const MSG_TYPE_REJECT_INVALID: u8 = 0x10;

/// Message type used for a rejection whose code is "not found" (the
/// reconnect window elapsed before a game claimed the handoff).
pub const MSG_TYPE_REJECT_NOT_FOUND: u8 = 0x11;

/// Every frame has at least this many bytes: magic, type, u16 length.
pub const HEADER_LEN: usize = 4;

/// Total length of a reconnect frame, header included.
pub const RECONNECT_MSG_LEN: u16 = 13;

/// Total length of a rejection frame, header included. Rejections carry no
/// payload beyond the header; the rejection code is the message type.
pub const REJECT_MSG_LEN: u16 = 4;

/// The parsed payload of a reconnect handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectHandshake {
    pub player_id: u8,
    pub reconnect_key: u32,
    pub last_packet: u32,
}

/// Why a pending reconnect was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// The handshake itself was malformed: bad magic, bad length, or an
    /// unrecognized message type.
    Invalid,
    /// The handshake was well-formed but no game claimed it inside the
    /// reconnect window.
    NotFound,
}

impl RejectCode {
    fn message_type(self) -> u8 {
        match self {
            RejectCode::Invalid => MSG_TYPE_REJECT_INVALID,
            RejectCode::NotFound => MSG_TYPE_REJECT_NOT_FOUND,
        }
    }
}

/// Result of attempting to parse one frame out of a socket's receive
/// buffer. The buffer may contain more bytes than one frame needs; callers
/// are responsible for advancing past the frame's length on a complete
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Fewer than a full frame have arrived yet; keep reading.
    Incomplete,
    /// Enough bytes arrived to know the frame is malformed.
    Invalid,
    /// A complete, well-formed reconnect handshake.
    Reconnect(ReconnectHandshake),
}

/// Parses a single frame from the front of `buf`.
///
/// Mirrors the original bot's byte-at-a-time accumulation: it never
/// allocates and never consumes `buf` itself, so it is safe to call
/// repeatedly as more bytes arrive.
pub fn parse_frame(buf: &[u8]) -> ParseOutcome {
    if buf.len() < HEADER_LEN {
        return ParseOutcome::Incomplete;
    }

    if buf[0] != HEADER_MAGIC {
        return ParseOutcome::Invalid;
    }

    let length = u16::from_le_bytes([buf[2], buf[3]]);
    if length < HEADER_LEN as u16 {
        return ParseOutcome::Invalid;
    }

    if buf.len() < length as usize {
        return ParseOutcome::Incomplete;
    }

    let msg_type = buf[1];
    if msg_type == MSG_TYPE_RECONNECT && length == RECONNECT_MSG_LEN {
        let player_id = buf[4];
        let reconnect_key = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        let last_packet = u32::from_le_bytes(buf[9..13].try_into().unwrap());
        ParseOutcome::Reconnect(ReconnectHandshake {
            player_id,
            reconnect_key,
            last_packet,
        })
    } else {
        ParseOutcome::Invalid
    }
}

/// Encodes a rejection frame.
pub fn encode_reject(code: RejectCode) -> [u8; HEADER_LEN] {
    let length = REJECT_MSG_LEN.to_le_bytes();
    [HEADER_MAGIC, code.message_type(), length[0], length[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_reconnect() {
        // magic 0xF7, type reconnect=0x02, len=13, player 5, key 0xDDCCBBAA, last 0x44332211
        let bytes: [u8; 13] = [
            0xF7, 0x02, 0x0D, 0x00, 0x05, 0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44,
        ];
        match parse_frame(&bytes) {
            ParseOutcome::Reconnect(hs) => {
                assert_eq!(hs.player_id, 5);
                assert_eq!(hs.reconnect_key, 0xDDCCBBAA);
                assert_eq!(hs.last_packet, 0x44332211);
            }
            other => panic!("expected Reconnect, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes: [u8; 13] = [0x00, 0x01, 0x0D, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_frame(&bytes), ParseOutcome::Invalid);
    }

    #[test]
    fn rejects_short_length_field() {
        let bytes: [u8; 4] = [0xF7, 0x02, 0x02, 0x00];
        assert_eq!(parse_frame(&bytes), ParseOutcome::Invalid);
    }

    #[test]
    fn waits_for_more_bytes() {
        let bytes: [u8; 6] = [0xF7, 0x02, 0x0D, 0x00, 0x05, 0xAA];
        assert_eq!(parse_frame(&bytes), ParseOutcome::Incomplete);
    }

    #[test]
    fn rejects_wrong_type_for_length() {
        let bytes: [u8; 13] = [0xF7, 0x09, 0x0D, 0x00, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(parse_frame(&bytes), ParseOutcome::Invalid);
    }

    #[test]
    fn encodes_distinct_rejection_codes() {
        let invalid = encode_reject(RejectCode::Invalid);
        let not_found = encode_reject(RejectCode::NotFound);
        assert_ne!(invalid, not_found);
        assert_eq!(invalid.len(), REJECT_MSG_LEN as usize);
        assert_eq!(invalid[0], HEADER_MAGIC);
    }
}
