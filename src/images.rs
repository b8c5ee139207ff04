use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;

pub const COVER_WIDTH: u32 = 400;
pub const COVER_HEIGHT: u32 = 540;
pub const COVER_CONTENT_TYPE: &str = "image/webp";

/// Normalizes an uploaded image to the fixed cover format: center-cropped
/// to 400x540 and re-encoded as WebP.
pub fn normalize_cover(data: &[u8]) -> Result<Bytes, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let resized = img.resize_to_fill(COVER_WIDTH, COVER_HEIGHT, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, image::ImageFormat::WebP)?;
    Ok(Bytes::from(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbaImage::new(width, height);
        for px in img.pixels_mut() {
            *px = Rgba([120, 40, 200, 255]);
        }
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn normalizes_to_fixed_dimensions() {
        let data = sample_png(800, 600);
        let out = normalize_cover(&data).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), COVER_WIDTH);
        assert_eq!(decoded.height(), COVER_HEIGHT);
    }

    #[test]
    fn output_is_webp() {
        let data = sample_png(100, 100);
        let out = normalize_cover(&data).unwrap();
        assert_eq!(
            image::guess_format(&out).unwrap(),
            image::ImageFormat::WebP
        );
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(normalize_cover(b"definitely not an image").is_err());
    }
}
