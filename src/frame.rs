//! Wire frame codec.
//!
//! Every message to and from the printer uses the same envelope:
//!
//! ```text
//! offset  size  field
//! 0       1     STX = 0x02
//! 1       1     opcode high byte
//! 2       1     opcode low byte
//! 3       2     payload length, little-endian
//! 5       N     payload
//! 5+N     4     CRC-32 of payload seeded with 0x35769521, little-endian
//! 9+N     1     ETX = 0x03
//! ```
//!
//! The checksum covers the payload only. The codec keeps no state between
//! calls.

use log::debug;

use crate::error::{DecodeError, Error};

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;

/// Seed fed into the CRC-32 of every payload.
pub const CRC_SEED: u32 = 0x3576_9521;

/// Bytes added around the payload: STX, opcode, length, CRC, ETX.
pub const FRAME_OVERHEAD: usize = 10;

pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Packed raster rows, printed as received.
pub const OP_RASTER_CHUNK: u16 = 0x0001;

/// Advance the paper by a number of dots. Payload is a little-endian u16.
pub const OP_FEED_LINE: u16 = 0x1A00;

const HEADER_LEN: usize = 5;

/// CRC-32 (IEEE) of `payload`, seeded with [`CRC_SEED`].
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(CRC_SEED);
    hasher.update(payload);
    hasher.finalize()
}

/// Build one frame around `payload`.
pub fn encode(opcode: u16, payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge(payload.len()));
    }

    let mut buf: Vec<u8> = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    buf.push(STX);
    buf.extend_from_slice(&opcode.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum(payload).to_le_bytes());
    buf.push(ETX);

    Ok(buf)
}

/// Payload of a feed-line command advancing `dots` dots.
pub fn feed_payload(dots: u16) -> [u8; 2] {
    dots.to_le_bytes()
}

/// A reply read back from the printer.
///
/// The meaning of the payload is firmware specific and is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub opcode: u16,
    pub payload: Vec<u8>,
    /// Whether the trailing CRC matched the payload.
    pub checksum_ok: bool,
}

impl Response {
    /// Parse a reply frame from the front of `raw`. Bytes after ETX are
    /// ignored.
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < HEADER_LEN {
            return Err(DecodeError::Incomplete {
                needed: HEADER_LEN,
                got: raw.len(),
            });
        }
        if raw[0] != STX {
            return Err(DecodeError::MissingStx);
        }

        let opcode = u16::from_be_bytes([raw[1], raw[2]]);
        let len = u16::from_le_bytes([raw[3], raw[4]]) as usize;
        let total = len + FRAME_OVERHEAD;
        if raw.len() < total {
            return Err(DecodeError::Incomplete {
                needed: total,
                got: raw.len(),
            });
        }
        if raw[total - 1] != ETX {
            return Err(DecodeError::MissingEtx);
        }

        let payload = raw[HEADER_LEN..HEADER_LEN + len].to_vec();
        let crc_at = HEADER_LEN + len;
        let crc = u32::from_le_bytes([
            raw[crc_at],
            raw[crc_at + 1],
            raw[crc_at + 2],
            raw[crc_at + 3],
        ]);

        Ok(Response {
            opcode,
            checksum_ok: crc == checksum(&payload),
            payload,
        })
    }
}

/// Best-effort decode of an inbound buffer.
///
/// Returns `None` when the buffer is empty, carries no payload, or cannot
/// be parsed. Never fails.
pub fn decode(raw: &[u8]) -> Option<Response> {
    if raw.is_empty() {
        return None;
    }

    match Response::parse(raw) {
        Ok(response) if response.payload.is_empty() => {
            debug!("reply {:#06X} carries no payload", response.opcode);
            None
        }
        Ok(response) => {
            if !response.checksum_ok {
                debug!("reply {:#06X} checksum mismatch", response.opcode);
            }
            Some(response)
        }
        Err(err) => {
            debug!("discarding reply of {} bytes: {}", raw.len(), err);
            None
        }
    }
}
