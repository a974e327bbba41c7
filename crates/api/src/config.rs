//! Application configuration
//!
//! Layered: optional `neuroscreen.toml` file, overridden by
//! `NEUROSCREEN_*` environment variables (double underscore nests, e.g.
//! `NEUROSCREEN_BLINK__EAR_THRESHOLD=0.22`).

use blink::BlinkConfig;
use camera_capture::CameraConfig;
use scan_classifier::ScanClassifierConfig;
use serde::Deserialize;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// SQLite database URL
    pub database_url: String,
    /// Directory served as the front end
    pub static_dir: String,
    /// Directory for uploaded scan images
    pub uploads_dir: String,
    /// Blink session tuning
    pub blink: BlinkConfig,
    /// Webcam settings
    pub camera: CameraConfig,
    /// Scan classifier settings
    pub scan: ScanClassifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "sqlite://app.db".to_string(),
            static_dir: "static".to_string(),
            uploads_dir: "uploads".to_string(),
            blink: BlinkConfig::default(),
            camera: CameraConfig::default(),
            scan: ScanClassifierConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("neuroscreen").required(false))
            .add_source(config::Environment::with_prefix("NEUROSCREEN").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.blink.session_duration_secs, 30);
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.scan.labels.len(), 4);
    }
}
