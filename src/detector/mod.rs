mod replay;

pub use replay::{RecordedEntry, RecordedHand, ReplayDetector};

use crate::capture::VideoFrame;
use crate::error::DetectionError;
use crate::pose::Pose;
use async_trait::async_trait;

/// Per-frame hand pose estimator.
///
/// Implementations receive their [`DetectorOptions`](crate::config::DetectorOptions)
/// at construction. A call yields at most one hand; `Ok(None)` means no hand
/// was found in the frame.
#[async_trait]
pub trait LandmarkDetector: Send + 'static {
    async fn detect(&mut self, frame: &VideoFrame) -> Result<Option<Pose>, DetectionError>;

    /// Releases detector resources. Called exactly once by the owner.
    async fn close(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
