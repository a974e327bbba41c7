//! Blink session configuration

use serde::{Deserialize, Serialize};

/// Blink detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Eye-openness ratio below which an eye counts as closed
    pub ear_threshold: f32,

    /// Minimum consecutive closed frames for a reopening to count as a blink
    pub min_closed_frames: u32,

    /// Session length in seconds
    pub session_duration_secs: u64,

    /// Placeholder frame width when no frame has been captured yet
    pub frame_width: u32,

    /// Placeholder frame height when no frame has been captured yet
    pub frame_height: u32,

    /// Minimum face score from the landmark model to accept a detection
    pub min_detection_confidence: f32,

    /// Face-mesh ONNX model path (mock landmarks when unset)
    pub face_model_path: Option<String>,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.20,
            min_closed_frames: 2,
            session_duration_secs: 30,
            frame_width: 640,
            frame_height: 480,
            min_detection_confidence: 0.5,
            face_model_path: None,
        }
    }
}
