//! 1-bit raster storage.
//!
//! A [`BitRow`] holds one line of dots packed 8 per byte, most significant
//! bit first: dot `i` lives in byte `i / 8` at bit `7 - i % 8`. A set bit is
//! an inked (black) dot. A [`Bitmap`] is a stack of rows sharing one width,
//! which can be packed into fixed-height bands for transfer.

use crate::error::Error;

fn check_width(width: u32) -> Result<(), Error> {
    if width == 0 || width % 8 != 0 {
        return Err(Error::InvalidWidth(width));
    }
    Ok(())
}

/// One horizontal line of printer dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitRow {
    width: u32,
    bits: Vec<u8>,
}

impl BitRow {
    /// Create a cleared row. `width` must be a positive multiple of 8.
    pub fn new(width: u32) -> Result<Self, Error> {
        check_width(width)?;
        Ok(Self::zeroed(width))
    }

    fn zeroed(width: u32) -> Self {
        BitRow {
            width,
            bits: vec![0x00; (width / 8) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Set or clear dot `index`, leaving every other dot untouched.
    ///
    /// # Panics
    ///
    /// Panics if `index >= width`.
    pub fn set(&mut self, index: u32, on: bool) {
        let (byte, mask) = self.position(index);
        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= width`.
    pub fn get(&self, index: u32) -> bool {
        let (byte, mask) = self.position(index);
        self.bits[byte] & mask != 0
    }

    /// Packed row bytes, `width / 8` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn is_blank(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }

    fn position(&self, index: u32) -> (usize, u8) {
        assert!(
            index < self.width,
            "dot index {} out of range for row width {}",
            index,
            self.width
        );
        ((index / 8) as usize, 1 << (7 - index % 8))
    }
}

/// Ordered rows of equal width, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    rows: Vec<BitRow>,
}

impl Bitmap {
    /// Create a bitmap pre-populated with `height` cleared rows.
    pub fn new(width: u32, height: usize) -> Result<Self, Error> {
        check_width(width)?;
        Ok(Bitmap {
            width,
            rows: (0..height).map(|_| BitRow::zeroed(width)).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of bytes in one packed row.
    pub fn row_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[BitRow] {
        &self.rows
    }

    /// Append a cleared row and hand it back for filling.
    pub fn add_row(&mut self) -> &mut BitRow {
        self.rows.push(BitRow::zeroed(self.width));
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Pad with blank rows to a multiple of `chunk_rows`, then concatenate
    /// each group of `chunk_rows` rows into one buffer.
    ///
    /// Padding stays in the bitmap; capture [`Bitmap::height`] first if the
    /// original row count matters.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_rows` is zero.
    pub fn pack(&mut self, chunk_rows: usize) -> Vec<Vec<u8>> {
        assert!(chunk_rows > 0, "chunk size must be positive");

        while self.rows.len() % chunk_rows != 0 {
            self.add_row();
        }

        let row_bytes = self.row_bytes();
        self.rows
            .chunks(chunk_rows)
            .map(|group| {
                let mut buf: Vec<u8> = Vec::with_capacity(row_bytes * chunk_rows);
                for row in group {
                    buf.extend_from_slice(row.as_bytes());
                }
                buf
            })
            .collect()
    }
}
