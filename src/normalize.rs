use crate::{EnrichError, Result};
use image::imageops::FilterType;
use std::io::Cursor;

/// Side length of the normalized square output.
pub const OUTPUT_SIDE: u32 = 800;
/// Lossy WebP quality for the normalized output.
const WEBP_QUALITY: f32 = 82.0;
/// Extension of every persisted image file.
pub const OUTPUT_EXTENSION: &str = "webp";

/// Downloads whose decoded area falls below this are treated as tracking
/// pixels or thumbnails rather than product photos.
const MIN_PIXEL_AREA: u64 = 10_000;

/// Decoded width/height of a downloaded buffer; `None` when the bytes are
/// not decodable as a known raster format (not an error by itself).
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Degeneracy heuristic for a downloaded image: unknown dimensions, or a
/// known area below the minimum-pixel threshold.
pub fn is_degenerate(dimensions: Option<(u32, u32)>) -> bool {
    match dimensions {
        Some((width, height)) => (width as u64) * (height as u64) < MIN_PIXEL_AREA,
        None => true,
    }
}

/// Cover-crops the input to a centered square and encodes lossy WebP.
/// Accepts any raster format the decoder knows (JPEG, PNG, WebP, GIF, ...);
/// corrupt or unsupported input fails the record.
pub fn normalize_to_square(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| EnrichError::Transform(err.to_string()))?;
    let square = decoded.resize_to_fill(OUTPUT_SIDE, OUTPUT_SIDE, FilterType::Lanczos3);
    let rgba = square.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), OUTPUT_SIDE, OUTPUT_SIDE);
    Ok(encoder.encode(WEBP_QUALITY).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([180, 40, 40]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode fixture png");
        buf
    }

    #[test]
    fn probe_dimensions_reads_png_headers() {
        assert_eq!(probe_dimensions(&png_bytes(640, 400)), Some((640, 400)));
    }

    #[test]
    fn probe_dimensions_returns_none_for_garbage() {
        assert_eq!(probe_dimensions(b"not an image at all"), None);
    }

    #[test]
    fn degeneracy_threshold_is_strictly_below_minimum_area() {
        assert!(is_degenerate(None));
        assert!(is_degenerate(Some((50, 50))));
        assert!(is_degenerate(Some((99, 100))));
        assert!(!is_degenerate(Some((100, 100))));
        assert!(!is_degenerate(Some((200, 200))));
    }

    #[test]
    fn normalize_produces_square_webp() {
        let out = normalize_to_square(&png_bytes(640, 400)).expect("normalize");
        assert_eq!(image::guess_format(&out).expect("format"), ImageFormat::WebP);
        let decoded = image::load_from_memory(&out).expect("decode output");
        assert_eq!(decoded.width(), OUTPUT_SIDE);
        assert_eq!(decoded.height(), OUTPUT_SIDE);
    }

    #[test]
    fn normalize_rejects_corrupt_input() {
        let err = normalize_to_square(b"garbage bytes").expect_err("should fail");
        assert!(matches!(err, EnrichError::Transform(_)));
    }
}
