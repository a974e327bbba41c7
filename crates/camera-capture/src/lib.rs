//! Camera Capture Library for the Screening Pipeline
//!
//! Provides the webcam frame type and the capture-source boundary used by
//! the blink-detection session:
//! - RGB frame buffer with the pixel operations the pipeline needs
//! - `FrameSource` trait (open / read_frame / release)
//! - Synthetic source for environments without a camera device

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, SyntheticCamera};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Config for the patient-facing webcam used by the blink test
    pub fn webcam() -> Self {
        Self::default()
    }
}
