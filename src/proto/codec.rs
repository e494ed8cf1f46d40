//! The packet framer (§4.1): inbound Sync/Body/Checksum state machine and
//! outbound framing with acknowledgment wait.
//!
//! Grounded in the teacher crate's `GdbStub::read_packet` (checksum
//! accumulation, hex checksum parse) and, for the parts the teacher never
//! implemented (binary escape, the interrupt byte, stray-ack resync),
//! `gdb_get_char`/the packet-reading loop inside `gdb_input` in
//! `original_source/src/server/gdb_server.c`.

use crate::error::{CommError, FramingError};
use crate::proto::hex::{encode_hex, hex_digit};

/// What the framer needs from its caller: a byte source it can read one byte
/// at a time from, a place to write acknowledgment/packet bytes, and a flag
/// it can raise when it observes the out-of-band interrupt byte.
///
/// [`crate::session::Session`] implements this by drawing from its peek
/// buffer first and refilling from the underlying [`crate::comm::Comm`] on
/// exhaustion (§3: "a byte buffer and position/count pair").
pub trait ByteSource {
    /// Returns the next byte, blocking (via the underlying `Comm`'s own
    /// retry loop) until one is available or the connection is closed.
    fn read_byte(&mut self) -> Result<u8, CommError>;

    /// Writes `buf` to the stream.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), CommError>;

    /// Records that the out-of-band interrupt byte (`0x03`) was observed.
    fn set_ctrl_c_pending(&mut self);
}

/// Reads and acknowledges one inbound packet.
///
/// Returns `Ok(None)` if an interrupt byte (`0x03`) was seen during Sync —
/// spec §4.1: "A leading 0x03 ... returns an empty packet immediately (the
/// dispatcher will act on the pending interrupt)." Returns `Ok(Some(payload))`
/// for a successfully checksummed packet, with binary-escape bytes (for `X`
/// packets) already decoded.
///
/// `max_len` bounds the payload; exceeding it is the one fatal framing error
/// this function can return (`BufferTooSmall`) — everything else (checksum
/// mismatch) is handled internally by requesting retransmission.
pub fn read_packet<S: ByteSource>(src: &mut S, max_len: usize) -> Result<Option<Vec<u8>>, FramingError> {
    loop {
        // --- Sync ---
        loop {
            let b = src.read_byte()?;
            match b {
                b'$' => break,
                0x03 => {
                    src.set_ctrl_c_pending();
                    return Ok(None);
                }
                b'+' | b'-' => {
                    trace!("discarding stray ack {:?} before packet start", b as char);
                }
                other => {
                    trace!("discarding stray byte {:#04x} before packet start", other);
                }
            }
        }

        // --- Body ---
        let mut payload = Vec::new();
        let mut checksum: u8 = 0;
        let mut binary_mode = false;
        loop {
            let b = src.read_byte()?;
            if b == b'#' {
                break;
            }
            if b == 0x03 {
                src.set_ctrl_c_pending();
                continue;
            }
            if binary_mode && b == 0x7D {
                let raw = src.read_byte()?;
                checksum = checksum.wrapping_add(b).wrapping_add(raw);
                payload.push(raw ^ 0x20);
            } else {
                checksum = checksum.wrapping_add(b);
                if payload.is_empty() && b == b'X' {
                    binary_mode = true;
                }
                payload.push(b);
            }
            if payload.len() > max_len {
                return Err(FramingError::BufferTooSmall { capacity: max_len });
            }
        }

        // --- Checksum ---
        let hi = src.read_byte()?;
        let lo = src.read_byte()?;
        // Non-hex digits can't form a valid checksum at all, so they're
        // treated the same as a checksum that simply doesn't match: NACK and
        // resynchronize, rather than tearing the session down over a single
        // garbled byte on the wire.
        match (hex_digit(hi), hex_digit(lo)) {
            (Ok(h), Ok(l)) if (h << 4) | l == checksum => {
                src.write_bytes(b"+")?;
                return Ok(Some(payload));
            }
            (Ok(h), Ok(l)) => {
                warn!("checksum mismatch: received {:02x}, computed {:02x}", (h << 4) | l, checksum);
            }
            _ => {
                warn!("malformed checksum digits {:#04x}{:#04x}, treating as mismatch", hi, lo);
            }
        }
        src.write_bytes(b"-")?;
        // Fall through and resynchronize.
    }
}

/// Frames and writes `payload`, then waits for the debugger's
/// acknowledgment, retransmitting on `-` with no retry limit (§4.1).
pub fn write_packet<S: ByteSource>(src: &mut S, payload: &[u8]) -> Result<(), FramingError> {
    let checksum = payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(b'$');
    frame.extend_from_slice(payload);
    frame.push(b'#');
    frame.extend_from_slice(encode_hex(&[checksum]).as_bytes());

    loop {
        src.write_bytes(&frame)?;
        loop {
            match src.read_byte()? {
                b'+' => return Ok(()),
                b'-' => break, // retransmit the whole frame
                0x03 => {
                    src.set_ctrl_c_pending();
                    continue;
                }
                other => return Err(FramingError::unexpected(other, "'+' or '-' acknowledgment")),
            }
        }
    }
}
