use super::PoseConsumer;
use crate::capture::VideoFrame;
use crate::pose::Pose;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PoseSample {
    pub pose: Option<Pose>,
    pub frame_sequence: u64,
    pub frame_id: Uuid,
    pub captured_at: DateTime<Utc>,
}

/// Keeps only the newest detection result; readers never see a backlog.
pub struct LatestPose {
    tx: watch::Sender<Option<PoseSample>>,
}

impl LatestPose {
    pub fn new() -> (Self, watch::Receiver<Option<PoseSample>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PoseSample>> {
        self.tx.subscribe()
    }
}

impl PoseConsumer for LatestPose {
    fn on_pose(&mut self, frame: &VideoFrame, pose: Option<&Pose>) {
        self.tx.send_replace(Some(PoseSample {
            pose: pose.cloned(),
            frame_sequence: frame.sequence,
            frame_id: frame.id,
            captured_at: frame.captured_at,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{LANDMARK_COUNT, Landmark};
    use image::RgbImage;

    #[tokio::test]
    async fn test_readers_see_only_the_newest_sample() {
        let (mut latest, mut rx) = LatestPose::new();
        assert!(rx.borrow().is_none());

        let pose = Pose::new([Landmark::default(); LANDMARK_COUNT], 0.8);
        latest.on_pose(&VideoFrame::new(1, RgbImage::new(2, 2)), Some(&pose));
        let newest = VideoFrame::new(2, RgbImage::new(2, 2));
        latest.on_pose(&newest, None);

        rx.changed().await.unwrap();
        let sample = rx.borrow_and_update().clone().unwrap();
        assert_eq!(sample.frame_sequence, 2);
        assert_eq!(sample.frame_id, newest.id);
        assert!(sample.pose.is_none());
        assert!(!rx.has_changed().unwrap());
    }
}
