//! Classifier implementation

use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::ScanError;

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanClassifierConfig {
    /// ONNX model path (mock prediction when unset)
    pub model_path: Option<String>,

    /// Class labels in model output order
    pub labels: Vec<String>,

    /// Square input resolution the model expects
    pub input_size: u32,
}

impl Default for ScanClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            labels: vec![
                "glioma".to_string(),
                "meningioma".to_string(),
                "notumor".to_string(),
                "pituitary".to_string(),
            ],
            input_size: 224,
        }
    }
}

/// Prediction for one scan image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPrediction {
    /// Top-1 class label
    pub label: String,
    /// Top-1 probability (0.0 to 1.0)
    pub confidence: f32,
    /// Per-class probabilities in label order
    pub probabilities: Vec<f32>,
}

/// Image classifier over a pretrained ONNX model
pub struct ScanClassifier {
    config: ScanClassifierConfig,
    session: Option<Session>,
}

impl ScanClassifier {
    pub fn new(config: ScanClassifierConfig) -> Result<Self, ScanError> {
        let session = if let Some(path) = &config.model_path {
            info!("Loading scan classifier model from {}", path);
            match Session::builder() {
                Ok(builder) => {
                    match builder.with_optimization_level(GraphOptimizationLevel::Level3) {
                        Ok(builder) => match builder.commit_from_file(path) {
                            Ok(s) => Some(s),
                            Err(e) => {
                                error!("Failed to load scan model: {}", e);
                                return Err(ScanError::ModelLoad(e.to_string()));
                            }
                        },
                        Err(e) => {
                            error!("Failed to configure model optimization: {}", e);
                            return Err(ScanError::ModelLoad(e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to create session builder: {}", e);
                    return Err(ScanError::ModelLoad(e.to_string()));
                }
            }
        } else {
            warn!("No scan model path configured. Using mock classifier.");
            None
        };

        Ok(Self { config, session })
    }

    /// Classify an encoded scan image (PNG/JPEG bytes)
    pub fn classify(&self, image_bytes: &[u8]) -> Result<ScanPrediction, ScanError> {
        let img = image::load_from_memory(image_bytes)
            .map_err(|e| ScanError::ImageDecode(e.to_string()))?
            .to_rgb8();

        match &self.session {
            Some(session) => self.run_model(session, &img),
            None => Ok(self.mock_predict(&img)),
        }
    }

    fn run_model(
        &self,
        session: &Session,
        img: &image::RgbImage,
    ) -> Result<ScanPrediction, ScanError> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(img, size, size, FilterType::Triangle);

        // NCHW tensor, 0..1 normalization
        let size = size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let outputs = session
            .run(ort::inputs![input].map_err(|e| ScanError::Inference(e.to_string()))?)
            .map_err(|e| ScanError::Inference(e.to_string()))?;

        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScanError::Inference(e.to_string()))?;
        let logits: Vec<f32> = logits.iter().copied().collect();

        if logits.len() != self.config.labels.len() {
            return Err(ScanError::Inference(format!(
                "model produced {} scores for {} labels",
                logits.len(),
                self.config.labels.len()
            )));
        }

        let probabilities = softmax(&logits);
        Ok(self.prediction_from(probabilities))
    }

    /// Deterministic stand-in keyed on mean image intensity, so the demo
    /// pipeline stays exercisable without the model file.
    fn mock_predict(&self, img: &image::RgbImage) -> ScanPrediction {
        let pixels = img.as_raw();
        let mean = if pixels.is_empty() {
            0.0
        } else {
            pixels.iter().map(|&b| b as f32).sum::<f32>() / pixels.len() as f32
        };

        let classes = self.config.labels.len().max(1);
        let band = (mean / 256.0 * classes as f32) as usize;
        let top = band.min(classes - 1);

        let spread = 0.1 / (classes.saturating_sub(1)).max(1) as f32;
        let mut probabilities = vec![spread; classes];
        probabilities[top] = 0.9;
        debug!("Mock scan prediction: mean intensity {:.1} -> class {}", mean, top);

        self.prediction_from(probabilities)
    }

    fn prediction_from(&self, probabilities: Vec<f32>) -> ScanPrediction {
        let (top, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap_or((0, &0.0));

        ScanPrediction {
            label: self
                .config
                .labels
                .get(top)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            confidence,
            probabilities,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.session.is_none()
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mock_classifier() -> ScanClassifier {
        ScanClassifier::new(ScanClassifierConfig::default()).unwrap()
    }

    fn png_bytes(luma: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([luma, luma, luma]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, 4.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[3] > probs[0]);
    }

    #[test]
    fn test_mock_prediction_is_deterministic() {
        let classifier = mock_classifier();
        assert!(classifier.is_mock());

        let bytes = png_bytes(40);
        let a = classifier.classify(&bytes).unwrap();
        let b = classifier.classify(&bytes).unwrap();
        assert_eq!(a.label, b.label);
        assert!((a.confidence - b.confidence).abs() < f32::EPSILON);
    }

    #[test]
    fn test_mock_bands_cover_the_label_set() {
        let classifier = mock_classifier();
        let dark = classifier.classify(&png_bytes(10)).unwrap();
        let bright = classifier.classify(&png_bytes(250)).unwrap();
        assert_eq!(dark.label, "glioma");
        assert_eq!(bright.label, "pituitary");
        assert!(dark.confidence > 0.5);
    }

    #[test]
    fn test_garbage_bytes_are_a_decode_error() {
        let classifier = mock_classifier();
        let err = classifier.classify(b"not an image").unwrap_err();
        assert!(matches!(err, ScanError::ImageDecode(_)));
    }

    proptest! {
        #[test]
        fn softmax_is_a_distribution(logits in proptest::collection::vec(-20.0f32..20.0, 1..8)) {
            let probs = softmax(&logits);
            let sum: f32 = probs.iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-4);
            prop_assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
}
