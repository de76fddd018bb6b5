//! Conversion between data-URI payloads and [`Frame`]s.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ExtendedColorType, ImageEncoder};

use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Decodes a `data:<mime>;base64,<payload>` string into an RGB frame.
///
/// Only the part after the first comma is interpreted; the header is not
/// validated beyond its presence.
pub fn decode_data_uri(uri: &str) -> Result<Frame, VisionError> {
    let (_, payload) = uri
        .split_once(',')
        .ok_or_else(|| VisionError::Decode("expected a data URI with a base64 payload".into()))?;
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| VisionError::Decode(format!("invalid base64: {e}")))?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<Frame, VisionError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| VisionError::Decode(e.to_string()))?
        .to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(VisionError::Decode("image has zero dimensions".into()));
    }
    Ok(Frame::from_rgb_image(image, 0))
}

/// Resizes to `target_width`, keeping aspect ratio (height rounded down).
pub fn resize_to_width(frame: &Frame, target_width: u32) -> Frame {
    let scale = target_width as f64 / frame.width() as f64;
    let target_height = ((frame.height() as f64 * scale) as u32).max(1);
    if target_width == frame.width() && target_height == frame.height() {
        return frame.clone();
    }
    let resized = image::imageops::resize(
        &frame.to_rgb_image(),
        target_width,
        target_height,
        FilterType::Lanczos3,
    );
    Frame::from_rgb_image(resized, frame.index())
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, VisionError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(buffer)
}

pub fn encode_jpeg_data_uri(frame: &Frame, quality: u8) -> Result<String, VisionError> {
    let jpeg = encode_jpeg(frame, quality)?;
    Ok(format!("{JPEG_DATA_URI_PREFIX}{}", BASE64.encode(jpeg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn png_data_uri(w: u32, h: u32) -> String {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([10, 200, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(bytes))
    }

    #[test]
    fn test_decode_png_data_uri() {
        let frame = decode_data_uri(&png_data_uri(8, 5)).unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 5));
        assert_eq!(&frame.data()[..3], &[10, 200, 30]);
    }

    #[rstest]
    #[case::no_comma("aGVsbG8=")]
    #[case::bad_base64("data:image/png;base64,@@@not-base64@@@")]
    #[case::not_an_image("data:image/png;base64,aGVsbG8gd29ybGQ=")]
    #[case::empty("")]
    fn test_malformed_input_is_decode_error(#[case] input: &str) {
        let err = decode_data_uri(input).unwrap_err();
        assert!(matches!(err, VisionError::Decode(_)));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_resize_to_width_keeps_aspect() {
        let frame = Frame::new(vec![0; 1280 * 720 * 3], 1280, 720, 0);
        let resized = resize_to_width(&frame, 640);
        assert_eq!((resized.width(), resized.height()), (640, 360));
    }

    #[test]
    fn test_resize_rounds_height_down() {
        let frame = Frame::new(vec![0; 300 * 199 * 3], 300, 199, 0);
        let resized = resize_to_width(&frame, 640);
        // 199 * 640 / 300 = 424.53
        assert_eq!(resized.height(), 424);
    }

    #[test]
    fn test_resize_same_width_is_identity() {
        let frame = Frame::new(vec![7; 640 * 10 * 3], 640, 10, 0);
        assert_eq!(resize_to_width(&frame, 640), frame);
    }

    #[test]
    fn test_jpeg_data_uri_decodes_back() {
        let frame = Frame::new(vec![128; 16 * 16 * 3], 16, 16, 0);
        let uri = encode_jpeg_data_uri(&frame, 95).unwrap();
        assert!(uri.starts_with(JPEG_DATA_URI_PREFIX));
        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }
}
