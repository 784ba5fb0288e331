use super::LandmarkDetector;
use crate::capture::VideoFrame;
use crate::config::DetectorOptions;
use crate::error::{DetectionError, StartupError};
use crate::pose::{Handedness, Landmark, Pose};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// One line of a recording: `null`, a hand, or a recorded failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordedEntry {
    Failure { error: String },
    Hand(RecordedHand),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedHand {
    pub score: f32,
    #[serde(default)]
    pub handedness: Option<Handedness>,
    pub landmarks: Vec<Landmark>,
}

/// Replays poses captured from a real detector session, one entry per call.
///
/// The recording is JSON lines and loops once exhausted.
pub struct ReplayDetector {
    entries: Vec<Option<RecordedEntry>>,
    cursor: usize,
    options: DetectorOptions,
    closed: bool,
}

impl ReplayDetector {
    pub fn open(path: impl AsRef<Path>, options: DetectorOptions) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StartupError::DetectorUnavailable(format!("{}: {}", path.display(), e))
        })?;
        let detector = Self::from_recording(&contents, options)?;
        info!(
            "Replay detector loaded {} entries from {}",
            detector.entries.len(),
            path.display()
        );
        Ok(detector)
    }

    pub fn from_recording(recording: &str, options: DetectorOptions) -> Result<Self, StartupError> {
        let mut entries = Vec::new();
        for (number, line) in recording.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: Option<RecordedEntry> = serde_json::from_str(line).map_err(|e| {
                StartupError::DetectorUnavailable(format!("line {}: {}", number + 1, e))
            })?;
            if let Some(RecordedEntry::Hand(hand)) = &entry {
                if hand.landmarks.len() != crate::pose::LANDMARK_COUNT {
                    return Err(StartupError::DetectorUnavailable(format!(
                        "line {}: expected {} landmarks, got {}",
                        number + 1,
                        crate::pose::LANDMARK_COUNT,
                        hand.landmarks.len()
                    )));
                }
            }
            entries.push(entry);
        }
        if entries.is_empty() {
            return Err(StartupError::DetectorUnavailable(
                "recording has no entries".to_string(),
            ));
        }
        Ok(Self {
            entries,
            cursor: 0,
            options,
            closed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn next_entry(&mut self) -> Option<RecordedEntry> {
        let entry = self.entries[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.entries.len();
        entry
    }
}

#[async_trait]
impl LandmarkDetector for ReplayDetector {
    async fn detect(&mut self, frame: &VideoFrame) -> Result<Option<Pose>, DetectionError> {
        if self.closed {
            return Err(DetectionError::Closed);
        }
        let latency = self.options.simulated_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.next_entry() {
            None => Ok(None),
            Some(RecordedEntry::Failure { error }) => Err(DetectionError::Failed(error)),
            Some(RecordedEntry::Hand(hand)) => {
                if hand.score < self.options.min_detection_confidence {
                    debug!(
                        "Frame {}: hand score {:.2} below threshold",
                        frame.sequence, hand.score
                    );
                    return Ok(None);
                }
                let pose = Pose::from_landmarks(hand.landmarks, hand.score)
                    .map_err(|e| DetectionError::Failed(e.to_string()))?;
                Ok(Some(match hand.handedness {
                    Some(handedness) => pose.with_handedness(handedness),
                    None => pose,
                }))
            }
        }
    }

    async fn close(&mut self) -> Result<(), DetectionError> {
        self.closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
