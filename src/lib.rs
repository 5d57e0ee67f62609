//! USB Thermal Receipt Printer Driver
//!
//! This crate drives a monochrome 576-dot thermal receipt printer over a USB
//! bulk link. Images are reduced to 1-bit rows, packed into bands, wrapped
//! in checksummed frames and written to the printer in order.
//!
//! # Example
//!
//! ```rust,no_run
//! use thermal_usb::{Config, Printer, UsbConfig, UsbTransport};
//!
//! let transport = UsbTransport::open(UsbConfig::new()).unwrap();
//! let mut printer = Printer::new(transport, Config::new()).unwrap();
//! let image = image::open("receipt.png").unwrap().to_rgba8();
//! printer.print_image(&image).unwrap();
//! ```

mod bitmap;
mod error;
mod frame;
mod printer;
mod raster;
mod transport;

pub use crate::{
    bitmap::{BitRow, Bitmap},
    error::{DecodeError, Error},
    frame::{
        checksum, decode, encode, feed_payload, Response, CRC_SEED, ETX, FRAME_OVERHEAD,
        MAX_PAYLOAD, OP_FEED_LINE, OP_RASTER_CHUNK, STX,
    },
    printer::{CancelToken, Config, Printer, SharedPrinter},
    raster::{convert, convert_image, InkThreshold, RgbaSource},
    transport::{DeviceInfo, Transport, UsbConfig, UsbTransport},
};

/// Printer head width in dots. Every raster row carries this many dots,
/// 72 bytes once packed.
pub const DOT_WIDTH: u32 = 576;

/// Rows packed into one raster frame by default.
pub const DEFAULT_CHUNK_ROWS: usize = 16;

/// Dots of paper advanced after an image, enough to clear the cutter.
pub const DEFAULT_FEED_DOTS: u16 = 300;

/// Largest reply read back from the printer in one transfer.
pub const READ_CAPACITY: usize = 8192;
