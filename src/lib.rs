pub mod admission;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod pose;
pub mod render;
pub mod session;

pub use admission::{AdapterState, AdapterStats, FrameAdmissionAdapter};
pub use capture::{MediaSource, TestPatternCamera, VideoFrame};
pub use classifier::{ClassifierClient, Domain};
pub use config::Configuration;
pub use detector::{LandmarkDetector, ReplayDetector};
pub use error::{AppError, ClassifierError, DetectionError, RecognitionError, StartupError};
pub use pose::{Landmark, Pose};
pub use render::{Canvas, LatestPose, PoseConsumer, PoseFanout, SkeletonOverlay};
pub use session::{RecognitionSession, TrainingSession};
