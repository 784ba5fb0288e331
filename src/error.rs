use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Startup Error: {0}")]
    Startup(#[from] StartupError),
    #[error("Classifier Error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pose Error: {0}")]
    Pose(#[from] PoseError),
    #[error("The adapter is already running.")]
    AlreadyStarted,
    #[error("The adapter has been stopped and cannot be restarted.")]
    AdapterStopped,
    #[error("Adapter task failed: {0}")]
    Task(String),
}

// Camera or detector could not be brought up. Surfaced once, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartupError {
    #[error("No capture device named '{0}'")]
    NoDevice(String),
    #[error("Unsupported camera mode {width}x{height}@{fps}")]
    InvalidCameraMode { width: u32, height: u32, fps: u32 },
    #[error("The media source is not producing frames")]
    SourceNotReady,
    #[error("Landmark detector unavailable: {0}")]
    DetectorUnavailable(String),
}

// A single frame could not be analyzed. Absorbed by the adapter as "no hand".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Detection failed: {0}")]
    Failed(String),
    #[error("Detection did not complete within {0:?}")]
    Timeout(Duration),
    #[error("The detector has been closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Service rejected the request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("Model is not trained yet: {0}")]
    NotTrained(String),
    #[error("Invalid response from classification service: {0}")]
    InvalidResponse(String),
    #[error("Operation '{operation}' is not available for {domain}")]
    Unsupported {
        operation: &'static str,
        domain: &'static str,
    },
    #[error("Invalid label '{0}'")]
    InvalidLabel(String),
    #[error("Request did not complete in time")]
    Timeout,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("A pose needs exactly {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },
    #[error("Landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("A prediction is already in flight")]
    Busy,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
