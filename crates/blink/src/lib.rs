//! Blink Detection Core
//!
//! Real-time blink counting over a webcam feed:
//! - Eye-openness geometry from facial landmarks
//! - Temporal debounce turning per-frame signal into blink events
//! - Time-boxed capture session with a background loop and polled state
//! - Risk banding of the final blink count

pub mod config;
pub mod detector;
pub mod encoder;
pub mod geometry;
pub mod landmarks;
pub mod overlay;
pub mod risk;
pub mod session;

pub use config::BlinkConfig;
pub use detector::BlinkDetector;
pub use landmarks::{FaceLandmarks, FaceMeshExtractor, LandmarkExtractor, LEFT_EYE, RIGHT_EYE};
pub use risk::{RiskLevel, RiskVerdict};
pub use session::{BlinkSession, EndCause, SessionStats};

use thiserror::Error;

/// Blink pipeline error types
#[derive(Error, Debug)]
pub enum BlinkError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),
}
