//! Image preprocessing for inference.
//!
//! Decodes image bytes (PNG/JPEG/BMP/GIF), resizes them to the model's input
//! dimensions, and normalizes pixel values to the [0, 1] range.

use image::imageops::FilterType;

use crate::data::dataset::{Image, ImageShape};
use crate::error::{Error, Result};

/// Decodes `bytes` into an `Image` of `shape`.
///
/// One channel gives grayscale; three give R, G, B planes one after another
/// (channel-major, matching the dataset layout).
pub fn decode_image(bytes: &[u8], shape: ImageShape) -> Result<Image> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| Error::InvalidInput(format!("cannot decode image: {e}")))?;
    let resized = img.resize_exact(shape.width as u32, shape.height as u32, FilterType::Lanczos3);

    let pixels = match shape.channels {
        1 => resized.to_luma8().pixels().map(|p| p.0[0] as f64 / 255.0).collect(),
        3 => {
            let rgb = resized.to_rgb8();
            (0..3)
                .flat_map(|c| rgb.pixels().map(move |p| p.0[c] as f64 / 255.0))
                .collect()
        }
        n => return Err(Error::InvalidInput(format!("unsupported channel count {n}"))),
    };
    Image::new(shape, pixels)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    use super::*;

    /// PNG bytes of a `size × size` grayscale image filled with `value`.
    pub(crate) fn gray_png(size: u32, value: u8) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(size, size, Luma([value])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn grayscale_is_resized_and_normalized() {
        let image = decode_image(&gray_png(56, 255), ImageShape::MNIST).unwrap();
        assert_eq!(image.pixels.len(), 28 * 28);
        assert!(image.pixels.iter().all(|&p| (p - 1.0).abs() < 0.01));
    }

    #[test]
    fn rgb_is_laid_out_channel_major() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 51])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();

        let image = decode_image(&out.into_inner(), ImageShape::new(2, 2, 3)).unwrap();
        let close = |range: std::ops::Range<usize>, want: f64| {
            image.pixels[range].iter().all(|&p| (p - want).abs() < 0.01)
        };
        assert!(close(0..4, 1.0));
        assert!(close(4..8, 0.0));
        assert!(close(8..12, 0.2));
    }

    #[test]
    fn garbage_bytes_are_invalid_input() {
        let err = decode_image(b"definitely not a png", ImageShape::MNIST).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
