//! Image to bitmap conversion.
//!
//! Each pixel is reduced to an ink decision by a predicate over its RGBA
//! value. The stock predicate is [`InkThreshold`], a plain luminance cutoff
//! with an optional alpha gate; any `Fn([u8; 4]) -> bool` can replace it.

use image::{DynamicImage, RgbaImage};
use log::debug;

use crate::{bitmap::Bitmap, error::Error};

/// A decoded raster image exposing per-pixel RGBA.
pub trait RgbaSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// `[r, g, b, a]` at column `x`, row `y`.
    fn pixel(&self, x: u32, y: u32) -> [u8; 4];
}

impl RgbaSource for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

/// Luminance cutoff deciding whether a pixel is inked.
///
/// A pixel is inked when `(r + g + b) / 3 <= luminance` and, if `alpha` is
/// set, its alpha is strictly above that value. Near-transparent pixels are
/// therefore never inked in alpha-aware mode, whatever their color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkThreshold {
    pub luminance: u8,
    pub alpha: Option<u8>,
}

impl InkThreshold {
    /// Cutoff 100, pixels with alpha 100 or below stay blank.
    pub fn alpha_aware() -> Self {
        InkThreshold {
            luminance: 100,
            alpha: Some(100),
        }
    }

    /// Cutoff 128, alpha ignored.
    pub fn legacy() -> Self {
        InkThreshold {
            luminance: 128,
            alpha: None,
        }
    }

    pub fn is_inked(&self, [r, g, b, a]: [u8; 4]) -> bool {
        let luminance = (u16::from(r) + u16::from(g) + u16::from(b)) / 3;
        if luminance > u16::from(self.luminance) {
            return false;
        }
        match self.alpha {
            Some(cutoff) => a > cutoff,
            None => true,
        }
    }
}

impl Default for InkThreshold {
    fn default() -> Self {
        Self::alpha_aware()
    }
}

/// Rasterise `image` into a bitmap of `dot_width` dots per row.
///
/// Fails with [`Error::DimensionMismatch`] unless the image is exactly
/// `dot_width` pixels wide. Rows are scanned top to bottom.
pub fn convert<S, F>(image: &S, dot_width: u32, is_inked: F) -> Result<Bitmap, Error>
where
    S: RgbaSource + ?Sized,
    F: Fn([u8; 4]) -> bool,
{
    if image.width() != dot_width {
        return Err(Error::DimensionMismatch {
            expected: dot_width,
            actual: image.width(),
        });
    }

    let mut bitmap = Bitmap::new(dot_width, 0)?;
    for y in 0..image.height() {
        let row = bitmap.add_row();
        for x in 0..dot_width {
            if is_inked(image.pixel(x, y)) {
                row.set(x, true);
            }
        }
    }
    debug!(
        "converted {}x{} image into {} rows",
        image.width(),
        image.height(),
        bitmap.height()
    );

    Ok(bitmap)
}

/// Convert any decoded image with the given threshold.
pub fn convert_image(
    image: &DynamicImage,
    dot_width: u32,
    threshold: InkThreshold,
) -> Result<Bitmap, Error> {
    let rgba = image.to_rgba8();
    convert(&rgba, dot_width, |px| threshold.is_inked(px))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn filled(width: u32, height: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(px))
    }

    #[test]
    fn white_is_blank() {
        let image = filled(576, 4, [255, 255, 255, 255]);
        for threshold in [InkThreshold::alpha_aware(), InkThreshold::legacy()].iter() {
            let bitmap = convert(&image, 576, |px| threshold.is_inked(px)).unwrap();
            assert_eq!(bitmap.height(), 4);
            assert!(bitmap.rows().iter().all(|row| row.is_blank()));
        }
    }

    #[test]
    fn black_is_inked() {
        let image = filled(576, 3, [0, 0, 0, 255]);
        let threshold = InkThreshold::default();
        let bitmap = convert(&image, 576, |px| threshold.is_inked(px)).unwrap();
        for row in bitmap.rows() {
            assert!(row.as_bytes().iter().all(|b| *b == 0xFF));
        }
    }

    #[test]
    fn transparent_is_never_inked() {
        let image = filled(576, 2, [0, 0, 0, 0]);
        let threshold = InkThreshold::alpha_aware();
        let bitmap = convert(&image, 576, |px| threshold.is_inked(px)).unwrap();
        assert!(bitmap.rows().iter().all(|row| row.is_blank()));

        let edge = filled(576, 1, [0, 0, 0, 100]);
        let bitmap = convert(&edge, 576, |px| threshold.is_inked(px)).unwrap();
        assert!(bitmap.rows()[0].is_blank());
    }

    #[test]
    fn legacy_ignores_alpha() {
        let image = filled(8, 1, [10, 10, 10, 0]);
        let threshold = InkThreshold::legacy();
        let bitmap = convert(&image, 8, |px| threshold.is_inked(px)).unwrap();
        assert_eq!(bitmap.rows()[0].as_bytes(), &[0xFF]);
    }

    #[test]
    fn luminance_cutoff_is_inclusive() {
        let t = InkThreshold::alpha_aware();
        assert!(t.is_inked([100, 100, 100, 255]));
        // (101 + 101 + 100) / 3 truncates to 100
        assert!(t.is_inked([101, 101, 100, 255]));
        assert!(!t.is_inked([101, 101, 101, 255]));

        let legacy = InkThreshold::legacy();
        assert!(legacy.is_inked([128, 128, 128, 255]));
        assert!(!legacy.is_inked([129, 129, 129, 255]));
    }

    #[test]
    fn pixel_lands_on_matching_dot() {
        let mut image = filled(16, 2, [255, 255, 255, 255]);
        image.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        image.put_pixel(9, 1, Rgba([0, 0, 0, 255]));
        let t = InkThreshold::default();
        let bitmap = convert(&image, 16, |px| t.is_inked(px)).unwrap();
        assert_eq!(bitmap.rows()[0].as_bytes(), &[0x80, 0x00]);
        assert_eq!(bitmap.rows()[1].as_bytes(), &[0x00, 0x40]);
    }

    #[test]
    fn custom_predicate() {
        let image = filled(8, 1, [200, 0, 0, 255]);
        let bitmap = convert(&image, 8, |[r, _, _, _]| r > 150).unwrap();
        assert_eq!(bitmap.rows()[0].as_bytes(), &[0xFF]);
    }

    #[test]
    fn width_mismatch() {
        let image = filled(384, 1, [0, 0, 0, 255]);
        match convert(&image, 576, |_| true) {
            Err(Error::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 576);
                assert_eq!(actual, 384);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dynamic_image() {
        let image = DynamicImage::ImageRgba8(filled(576, 16, [0, 0, 0, 255]));
        let bitmap = convert_image(&image, 576, InkThreshold::default()).unwrap();
        assert_eq!(bitmap.height(), 16);
        assert!(bitmap.rows()[15].get(575));
    }
}
