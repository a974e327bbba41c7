//! Capture source boundary
//!
//! The blink session consumes frames through `FrameSource` so the capture
//! backend stays swappable: a real device driver in deployment, a synthetic
//! generator in tests and driverless environments.

use std::time::Duration;

use tracing::warn;

use crate::{CameraConfig, CameraError, VideoFrame};

/// A camera-like producer of RGB frames.
///
/// `read_frame` blocks until the next frame is available and returns `None`
/// when the stream ends (device unplugged, synthetic source exhausted).
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CameraError>;
    fn read_frame(&mut self) -> Option<VideoFrame>;
    fn release(&mut self);
}

/// Open the configured capture source.
///
/// No hardware capture backend is linked into this build, so this always
/// returns the synthetic source.
pub fn default_source(config: &CameraConfig) -> Box<dyn FrameSource> {
    warn!(
        device = %config.device,
        "No capture backend configured. Using synthetic frame source."
    );
    let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
    Box::new(
        SyntheticCamera::new(config.width, config.height, config.fps)
            .with_frame_delay(frame_interval),
    )
}

/// Deterministic frame generator standing in for a camera device.
///
/// Produces a moving gradient so consecutive frames differ. Frame pacing and
/// total frame count are configurable so tests can simulate a live stream or
/// an abrupt device loss.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    sequence: u32,
    opened: bool,
    /// Stop yielding frames after this many reads (`None` = unbounded)
    frame_limit: Option<u32>,
    /// Sleep per read to approximate the device frame interval
    frame_delay: Option<Duration>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            sequence: 0,
            opened: false,
            frame_limit: None,
            frame_delay: None,
        }
    }

    /// Yield at most `limit` frames, then report end-of-stream
    pub fn with_frame_limit(mut self, limit: u32) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Sleep this long on each read, like a real device would
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    fn generate(&self) -> VideoFrame {
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        let phase = self.sequence;
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(((x + phase) % 256) as u8);
                data.push((y % 256) as u8);
                data.push(((x + y + phase) % 256) as u8);
            }
        }
        let frame_interval_ns = 1_000_000_000u64 / self.fps.max(1) as u64;
        VideoFrame::new(
            data,
            self.width,
            self.height,
            self.sequence as u64 * frame_interval_ns,
            self.sequence,
        )
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        self.opened = true;
        self.sequence = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Option<VideoFrame> {
        if !self.opened {
            return None;
        }
        if let Some(limit) = self.frame_limit {
            if self.sequence >= limit {
                return None;
            }
        }
        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }
        let frame = self.generate();
        self.sequence += 1;
        Some(frame)
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_open_yields_nothing() {
        let mut camera = SyntheticCamera::new(32, 24, 30);
        assert!(camera.read_frame().is_none());
    }

    #[test]
    fn test_frame_limit_ends_stream() {
        let mut camera = SyntheticCamera::new(32, 24, 30).with_frame_limit(3);
        camera.open().unwrap();
        assert!(camera.read_frame().is_some());
        assert!(camera.read_frame().is_some());
        assert!(camera.read_frame().is_some());
        assert!(camera.read_frame().is_none());
    }

    #[test]
    fn test_sequence_numbers_advance() {
        let mut camera = SyntheticCamera::new(32, 24, 30).with_frame_limit(2);
        camera.open().unwrap();
        let first = camera.read_frame().unwrap();
        let second = camera.read_frame().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert!(second.timestamp_ns > first.timestamp_ns);
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn test_release_stops_reads() {
        let mut camera = SyntheticCamera::new(32, 24, 30);
        camera.open().unwrap();
        assert!(camera.read_frame().is_some());
        camera.release();
        assert!(camera.read_frame().is_none());
    }
}
