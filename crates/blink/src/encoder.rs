//! Frame-to-JPEG encoding for the polling API

use camera_capture::VideoFrame;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::BlinkError;

const JPEG_QUALITY: u8 = 80;

/// Encode an RGB frame as JPEG bytes
pub fn encode_jpeg(frame: &VideoFrame) -> Result<Vec<u8>, BlinkError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| BlinkError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Encode the black placeholder shown before the first frame arrives
pub fn encode_placeholder(width: u32, height: u32) -> Result<Vec<u8>, BlinkError> {
    encode_jpeg(&VideoFrame::blank(width, height))
}
