//! Framing constants and byte helpers for the control socket.
//!
//! A request is: 4 magic bytes (echoed back by the server), a 4-byte
//! big-endian body length, then the JSON body. The reply is a 4-byte
//! big-endian signed status, 0 for success and a negative code for failure.
//! A connection carries any number of these exchanges in sequence.

/// Handshake preamble sent by the client and echoed by the server.
pub const MAGIC: [u8; 4] = *b"IVWM";

/// Status reply for a fully applied command.
pub const STATUS_OK: i32 = 0;

/// Maximum accepted body length. Layout documents are a few KB at most;
/// anything larger is a framing error on the client side.
pub const MAX_BODY_LEN: u32 = 1024 * 1024;

pub fn encode_status(status: i32) -> [u8; 4] {
    status.to_be_bytes()
}

pub fn encode_len(len: u32) -> [u8; 4] {
    len.to_be_bytes()
}

pub fn decode_len(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_field_is_big_endian() {
        assert_eq!(encode_len(0x0102_0304), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decode_len([0x00, 0x00, 0x01, 0x00]), 256);
    }

    #[test]
    fn test_negative_status_encodes_twos_complement() {
        assert_eq!(encode_status(-1), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode_status(STATUS_OK), [0, 0, 0, 0]);
    }
}
