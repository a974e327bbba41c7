//! Video frame type and pixel operations

use image::{ImageBuffer, Rgb, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create an all-black frame of the given dimensions
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; (width * height * 3) as usize],
            width,
            height,
            timestamp_ns: 0,
            sequence: 0,
        }
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Mirror the frame around its vertical axis, in place.
    ///
    /// The blink session mirrors every frame so on-screen motion matches
    /// what a self-viewing user expects.
    pub fn flip_horizontal(&mut self) {
        let row_bytes = (self.width * 3) as usize;
        for row in self.data.chunks_mut(row_bytes) {
            let pixels = self.width as usize;
            for x in 0..pixels / 2 {
                let a = x * 3;
                let b = (pixels - 1 - x) * 3;
                for c in 0..3 {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// View the frame as an `image` RGB buffer (copies the pixel data)
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.data.clone())
    }

    /// Replace the pixel data from an `image` RGB buffer of the same size
    pub fn overwrite_from(&mut self, img: RgbImage) {
        debug_assert_eq!(img.width(), self.width);
        debug_assert_eq!(img.height(), self.height);
        self.data = img.into_raw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient_frame(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x % 256) as u8);
                data.push((y % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_pixel_indexing() {
        let frame = gradient_frame(8, 4);
        assert_eq!(frame.get_pixel(3, 2), Some([3, 2, 5]));
        assert_eq!(frame.get_pixel(8, 0), None);
        assert_eq!(frame.get_pixel(0, 4), None);
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let mut frame = gradient_frame(8, 4);
        frame.flip_horizontal();
        // Pixel originally at x=0 is now at x=7
        assert_eq!(frame.get_pixel(7, 1), Some([0, 1, 1]));
        assert_eq!(frame.get_pixel(0, 1), Some([7, 1, 8]));
    }

    #[test]
    fn test_blank_frame_is_black() {
        let frame = VideoFrame::blank(640, 480);
        assert_eq!(frame.data.len(), 640 * 480 * 3);
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn flip_twice_is_identity(width in 1u32..32, height in 1u32..16) {
            let original = gradient_frame(width, height);
            let mut frame = original.clone();
            frame.flip_horizontal();
            frame.flip_horizontal();
            prop_assert_eq!(frame.data, original.data);
        }
    }
}
