use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

/// Sampled frames are rasterized to this fixed size before encoding.
pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;
pub const FRAME_JPEG_QUALITY: u8 = 70;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame buffer of {len} bytes does not match {width}x{height} rgba dimensions")]
    BadDimensions { width: u32, height: u32, len: usize },
    #[error("failed to encode frame: {0}")]
    Encoding(#[from] image::ImageError),
}

/// Rasterizes a raw RGBA frame to the fixed output size and returns it as a
/// base64-encoded JPEG suitable for the `frame` field of an outgoing query.
pub fn encode_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<String, FrameError> {
    let len = rgba.len();
    let image = RgbaImage::from_raw(width, height, rgba).ok_or(FrameError::BadDimensions {
        width,
        height,
        len,
    })?;
    let scaled = DynamicImage::ImageRgba8(image)
        .resize_exact(FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle)
        .to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, FRAME_JPEG_QUALITY).encode_image(&scaled)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_to_base64_jpeg() {
        let rgba = vec![0x80u8; 8 * 8 * 4];
        let encoded = encode_rgba(8, 8, rgba).unwrap();
        let jpeg = base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .unwrap();
        // JPEG start-of-image marker
        assert_eq!(jpeg[..2], [0xFF, 0xD8]);
    }

    #[test]
    fn mismatched_dimensions_rejected() {
        let err = encode_rgba(16, 16, vec![0u8; 10]).unwrap_err();
        assert!(matches!(err, FrameError::BadDimensions { .. }));
    }
}
