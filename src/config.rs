use crate::classifier::Domain;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SIGNPOSE";
pub const DEFAULT_CONFIG_FILE: &str = "signpose.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub camera: CameraConfig,
    pub detector: DetectorOptions,
    pub classifier: ClassifierConfig,
    pub training: TrainingConfig,
    pub log_level: String,
    /// Zero runs until interrupted.
    pub run_seconds: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            detector: DetectorOptions::default(),
            classifier: ClassifierConfig::default(),
            training: TrainingConfig::default(),
            log_level: "info".to_string(),
            run_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CameraConfig {
    pub const MAX_DIMENSION: u32 = 8192;
    pub const MAX_FPS: u32 = 1000;

    /// Non-zero and within the limits a capture device is driven at.
    pub fn is_supported_mode(&self) -> bool {
        (1..=Self::MAX_DIMENSION).contains(&self.width)
            && (1..=Self::MAX_DIMENSION).contains(&self.height)
            && (1..=Self::MAX_FPS).contains(&self.fps)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "test-pattern".to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// Knobs handed to the landmark detector once, at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_num_hands: u8,
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub detect_timeout_ms: u64,
    pub recording: Option<PathBuf>,
    pub simulated_latency_ms: u64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_num_hands: 1,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            detect_timeout_ms: 1000,
            recording: None,
            simulated_latency_ms: 0,
        }
    }
}

impl DetectorOptions {
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_ms: u64,
    pub domain: Domain,
    pub min_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 5000,
            domain: Domain::Letters,
            min_confidence: 0.6,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// When set, the binary collects samples for this label instead of recognizing.
    pub label: Option<String>,
    pub target_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label: None,
            target_samples: 50,
        }
    }
}

impl Configuration {
    /// Layers an optional TOML file under `SIGNPOSE__SECTION__KEY` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let configuration: Configuration = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));

        if self.camera.width == 0 || self.camera.height == 0 {
            return invalid("Camera resolution must be non-zero");
        }
        if self.camera.fps == 0 {
            return invalid("Camera fps must be greater than 0");
        }
        if !self.camera.is_supported_mode() {
            return invalid(&format!(
                "Camera mode must be at most {0}x{0} at {1} fps",
                CameraConfig::MAX_DIMENSION,
                CameraConfig::MAX_FPS
            ));
        }
        if self.detector.max_num_hands == 0 {
            return invalid("Detector must track at least one hand");
        }
        if self.detector.model_complexity > 1 {
            return invalid("Model complexity must be 0 or 1");
        }
        for threshold in [
            self.detector.min_detection_confidence,
            self.detector.min_tracking_confidence,
            self.classifier.min_confidence,
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return invalid("Confidence thresholds must be between 0.0 and 1.0");
            }
        }
        if self.detector.detect_timeout_ms == 0 {
            return invalid("Detection timeout must be greater than 0");
        }
        if self.classifier.timeout_ms == 0 {
            return invalid("Classifier timeout must be greater than 0");
        }
        if self.training.target_samples == 0 {
            return invalid("Training target must be at least one sample");
        }
        Ok(())
    }
}
