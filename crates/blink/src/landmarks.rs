//! Facial-landmark provider
//!
//! Boundary with the face-mesh inference model: one RGB frame in, zero or
//! one sets of 468 normalized landmark coordinates out. The blink pipeline
//! only consumes the six-point eye subsets below.

use camera_capture::VideoFrame;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{error, warn};

use crate::geometry::EyePoints;
use crate::{BlinkConfig, BlinkError};

/// Landmark count of the face-mesh topology
pub const LANDMARK_COUNT: usize = 468;

/// Face-mesh input resolution (square)
const MESH_INPUT_SIZE: u32 = 192;

/// Left-eye landmark indices: outer corner, two upper, inner corner, two lower
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Right-eye landmark indices, mirrored ordering
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// One face's landmark set, coordinates normalized to [0, 1]
#[derive(Debug, Clone)]
pub struct FaceLandmarks {
    points: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f32, f32)>) -> Result<Self, BlinkError> {
        if points.len() != LANDMARK_COUNT {
            return Err(BlinkError::Inference(format!(
                "expected {} landmarks, got {}",
                LANDMARK_COUNT,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Extract one eye's six points, scaled to pixel coordinates
    pub fn eye_points(&self, indices: &[usize; 6], width: u32, height: u32) -> EyePoints {
        let mut eye = [(0.0, 0.0); 6];
        for (slot, &idx) in eye.iter_mut().zip(indices.iter()) {
            let (x, y) = self.points[idx];
            *slot = (x * width as f32, y * height as f32);
        }
        eye
    }

    /// Fixed landmark set with both eyes open, used by the mock extractor.
    pub fn synthetic_open() -> Self {
        let mut points = vec![(0.5, 0.5); LANDMARK_COUNT];
        place_open_eye(&mut points, &LEFT_EYE, 0.35, 0.4);
        place_open_eye(&mut points, &RIGHT_EYE, 0.65, 0.4);
        Self { points }
    }
}

/// Write an open-eye six-point layout around `(cx, cy)` into `points`
fn place_open_eye(points: &mut [(f32, f32)], indices: &[usize; 6], cx: f32, cy: f32) {
    let layout = [
        (cx - 0.05, cy),
        (cx - 0.02, cy - 0.02),
        (cx + 0.02, cy - 0.02),
        (cx + 0.05, cy),
        (cx + 0.02, cy + 0.02),
        (cx - 0.02, cy + 0.02),
    ];
    for (&idx, &p) in indices.iter().zip(layout.iter()) {
        points[idx] = p;
    }
}

/// Per-frame landmark inference
pub trait LandmarkExtractor: Send {
    /// Returns `Ok(None)` when no face is found in the frame
    fn extract(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, BlinkError>;
}

/// Face-mesh landmark extractor backed by an ONNX session.
///
/// Without a configured model path it degrades to a mock that reports a
/// fixed open-eyed face every frame.
pub struct FaceMeshExtractor {
    session: Option<Session>,
    min_confidence: f32,
}

impl FaceMeshExtractor {
    pub fn new(config: &BlinkConfig) -> Result<Self, BlinkError> {
        let session = if let Some(path) = &config.face_model_path {
            match Session::builder() {
                Ok(builder) => {
                    match builder.with_optimization_level(GraphOptimizationLevel::Level3) {
                        Ok(builder) => match builder.commit_from_file(path) {
                            Ok(s) => Some(s),
                            Err(e) => {
                                error!("Failed to load face-mesh model: {}", e);
                                return Err(BlinkError::ModelLoad(e.to_string()));
                            }
                        },
                        Err(e) => {
                            error!("Failed to configure model optimization: {}", e);
                            return Err(BlinkError::ModelLoad(e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to create session builder: {}", e);
                    return Err(BlinkError::ModelLoad(e.to_string()));
                }
            }
        } else {
            warn!("No face-mesh model path configured. Using mock landmarks.");
            None
        };

        Ok(Self {
            session,
            min_confidence: config.min_detection_confidence,
        })
    }

    fn run_model(&self, session: &Session, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, BlinkError> {
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| BlinkError::ImageProcessing("frame buffer size mismatch".into()))?;
        let resized = image::imageops::resize(
            &img,
            MESH_INPUT_SIZE,
            MESH_INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        // NHWC tensor, 0..1 normalization
        let size = MESH_INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, size, size, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, y as usize, x as usize, 0]] = pixel[0] as f32 / 255.0;
            input[[0, y as usize, x as usize, 1]] = pixel[1] as f32 / 255.0;
            input[[0, y as usize, x as usize, 2]] = pixel[2] as f32 / 255.0;
        }

        let outputs = session
            .run(ort::inputs![input].map_err(|e| BlinkError::Inference(e.to_string()))?)
            .map_err(|e| BlinkError::Inference(e.to_string()))?;

        // Output 1 is the face presence logit
        let score_tensor = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| BlinkError::Inference(e.to_string()))?;
        let logit = score_tensor.iter().copied().next().unwrap_or(f32::NEG_INFINITY);
        if sigmoid(logit) < self.min_confidence {
            return Ok(None);
        }

        // Output 0 is 468 * (x, y, z) in mesh-input pixel units
        let landmark_tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| BlinkError::Inference(e.to_string()))?;
        let flat: Vec<f32> = landmark_tensor.iter().copied().collect();
        if flat.len() < LANDMARK_COUNT * 3 {
            return Err(BlinkError::Inference(format!(
                "landmark tensor too small: {}",
                flat.len()
            )));
        }

        let scale = MESH_INPUT_SIZE as f32;
        let points = flat
            .chunks(3)
            .take(LANDMARK_COUNT)
            .map(|xyz| (xyz[0] / scale, xyz[1] / scale))
            .collect();

        FaceLandmarks::new(points).map(Some)
    }
}

impl LandmarkExtractor for FaceMeshExtractor {
    fn extract(&mut self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, BlinkError> {
        match &self.session {
            Some(session) => self.run_model(session, frame),
            None => Ok(Some(FaceLandmarks::synthetic_open())),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::openness_ratio;

    #[test]
    fn test_landmark_count_is_enforced() {
        assert!(FaceLandmarks::new(vec![(0.0, 0.0); 10]).is_err());
        assert!(FaceLandmarks::new(vec![(0.0, 0.0); LANDMARK_COUNT]).is_ok());
    }

    #[test]
    fn test_eye_points_scale_to_pixels() {
        let mut points = vec![(0.0, 0.0); LANDMARK_COUNT];
        points[LEFT_EYE[0]] = (0.25, 0.5);
        let landmarks = FaceLandmarks::new(points).unwrap();
        let eye = landmarks.eye_points(&LEFT_EYE, 640, 480);
        assert_eq!(eye[0], (160.0, 240.0));
    }

    #[test]
    fn test_synthetic_face_reads_as_open() {
        let landmarks = FaceLandmarks::synthetic_open();
        for indices in [&LEFT_EYE, &RIGHT_EYE] {
            let eye = landmarks.eye_points(indices, 640, 480);
            let ratio = openness_ratio(&eye);
            assert!(ratio > 0.20, "synthetic eye must be open, got {ratio}");
        }
    }

    #[test]
    fn test_mock_extractor_always_finds_a_face() {
        let mut extractor = FaceMeshExtractor::new(&BlinkConfig::default()).unwrap();
        let frame = VideoFrame::blank(64, 48);
        let result = extractor.extract(&frame).unwrap();
        assert!(result.is_some());
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }
}
