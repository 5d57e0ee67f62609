//! Error types for thermal printer operations.
//!
//! This module defines all errors that can occur while rasterising an image,
//! building frames, and talking to the printer over USB.

use rusb;
use thiserror::Error;

/// Main error type for thermal printer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// USB communication error.
    ///
    /// Wraps underlying rusb errors raised during bulk writes or reads.
    /// Propagated unchanged; the driver never retries a transfer.
    #[error(transparent)]
    UsbError(#[from] rusb::Error),

    /// The bulk write accepted fewer bytes than the frame holds.
    #[error("Short write: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },

    #[error("Can't read device list, permission issue ?")]
    DeviceListNotReadable,

    /// No attached device matched the configured vendor/product id.
    #[error("Device not found")]
    DeviceNotFound,

    /// The device was found but its interface could not be claimed.
    #[error("Failed to claim printer interface")]
    ClaimFailed(#[source] rusb::Error),

    /// Row width must be a positive multiple of 8 dots.
    #[error("Invalid row width {0}, must be a positive multiple of 8")]
    InvalidWidth(u32),

    /// Image width does not match the printer dot width.
    ///
    /// Raised before any frame is built, so nothing reaches the printer.
    #[error("Image width {actual} does not match printer dot width {expected}")]
    DimensionMismatch { expected: u32, actual: u32 },

    /// Frame payload does not fit in the 16-bit length field.
    #[error("Payload of {0} bytes exceeds the 65535 byte frame limit")]
    PayloadTooLarge(usize),

    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    /// The job was cancelled before every frame was written.
    #[error("Print job cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` for failures reported by the transport during a write
    /// or read, as opposed to errors detected before anything was sent.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::UsbError(_) | Self::ShortWrite { .. })
    }
}

/// Reasons an inbound buffer could not be interpreted as a reply.
///
/// These never escape [`crate::decode`]; replies are informational only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Reply incomplete: needed {needed} bytes, got {got}")]
    Incomplete { needed: usize, got: usize },

    #[error("Reply does not start with STX")]
    MissingStx,

    #[error("Reply does not end with ETX")]
    MissingEtx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_class() {
        assert!(Error::UsbError(rusb::Error::Pipe).is_transport());
        assert!(Error::ShortWrite {
            written: 3,
            expected: 10
        }
        .is_transport());
        assert!(!Error::PayloadTooLarge(70_000).is_transport());
        assert!(!Error::Cancelled.is_transport());
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = Error::DimensionMismatch {
            expected: 576,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Image width 384 does not match printer dot width 576"
        );
    }
}
