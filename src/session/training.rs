use crate::classifier::{ClassifierClient, Domain};
use crate::error::ClassifierError;
use crate::pose::Pose;
use crate::render::PoseSample;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    pub submitted: usize,
    pub target: usize,
    /// Samples the service holds for this domain, across all labels.
    pub server_total: Option<u64>,
}

impl TrainingProgress {
    pub fn fraction(&self) -> f32 {
        (self.submitted as f32 / self.target as f32).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.submitted >= self.target
    }
}

/// Collects labeled samples of one symbol until a target count is reached.
pub struct TrainingSession {
    domain: Domain,
    label: String,
    progress: TrainingProgress,
    last_error: Option<String>,
}

impl TrainingSession {
    pub fn new(
        domain: Domain,
        label: &str,
        target_samples: usize,
    ) -> Result<Self, ClassifierError> {
        let label = domain.normalize_label(label)?;
        Ok(Self {
            domain,
            label,
            progress: TrainingProgress {
                submitted: 0,
                target: target_samples.max(1),
                server_total: None,
            },
            last_error: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn progress(&self) -> TrainingProgress {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Sends one sample. Once the target is reached further samples are not sent.
    pub async fn submit(
        &mut self,
        client: &ClassifierClient,
        pose: &Pose,
    ) -> Result<TrainingProgress, ClassifierError> {
        if self.is_complete() {
            return Ok(self.progress);
        }
        match client.train(self.domain, pose, &self.label).await {
            Ok(response) => {
                self.last_error = None;
                self.progress.submitted += 1;
                self.progress.server_total = Some(response.total_samples);
                if self.is_complete() {
                    info!(
                        "Training of '{}' complete with {} samples",
                        self.label, self.progress.submitted
                    );
                }
                Ok(self.progress)
            }
            Err(e) => {
                error!("Training sample for '{}' failed: {}", self.label, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Submits the newest detected pose, if the newest frame had a hand.
    pub async fn submit_latest(
        &mut self,
        client: &ClassifierClient,
        latest: &watch::Receiver<Option<PoseSample>>,
    ) -> Result<Option<TrainingProgress>, ClassifierError> {
        let pose = latest
            .borrow()
            .as_ref()
            .and_then(|sample| sample.pose.clone());
        match pose {
            Some(pose) => self.submit(client, &pose).await.map(Some),
            None => Ok(None),
        }
    }

    /// Submits every new pose sample until the target is reached, the sender
    /// is gone or `cancel_token` fires. A sample in flight at cancellation is
    /// abandoned and not counted.
    pub async fn run(
        &mut self,
        client: &ClassifierClient,
        mut latest: watch::Receiver<Option<PoseSample>>,
        cancel_token: CancellationToken,
    ) {
        info!(
            "Collecting {} samples of '{}' for {}",
            self.progress.target, self.label, self.domain
        );
        while !self.is_complete() {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                changed = latest.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let result = tokio::select! {
                _ = cancel_token.cancelled() => break,
                result = self.submit_latest(client, &latest) => result,
            };
            if let Ok(Some(progress)) = result {
                info!(
                    "Training progress {}/{} ({:.0}%)",
                    progress.submitted,
                    progress.target,
                    progress.fraction() * 100.0
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::VideoFrame;
    use crate::classifier::test_support::{
        client_for, pose, stub_server, stub_server_with_delay,
    };
    use crate::render::{LatestPose, PoseConsumer};
    use image::RgbImage;
    use std::time::Duration;

    #[test]
    fn test_rejects_labels_outside_the_domain() {
        assert!(TrainingSession::new(Domain::Vowels, "x", 50).is_err());
        let session = TrainingSession::new(Domain::Vowels, "a", 50).unwrap();
        assert_eq!(session.label(), "A");
        assert_eq!(session.progress().fraction(), 0.0);
    }

    #[tokio::test]
    async fn test_progress_stops_at_target() {
        let (url, server) = stub_server(vec![
            (200, r#"{"message":"Vocal entrenada","total_samples":1}"#),
            (200, r#"{"message":"Vocal entrenada","total_samples":2}"#),
        ])
        .await;
        let client = client_for(&url);
        let mut session = TrainingSession::new(Domain::Vowels, "o", 2).unwrap();

        let progress = session.submit(&client, &pose()).await.unwrap();
        assert_eq!(progress.fraction(), 0.5);
        let progress = session.submit(&client, &pose()).await.unwrap();
        assert!(progress.is_complete());
        assert_eq!(progress.server_total, Some(2));

        // Not sent: the stub only had two answers.
        let progress = session.submit(&client, &pose()).await.unwrap();
        assert_eq!(progress.submitted, 2);
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_kept_as_error_state() {
        let (url, _server) = stub_server(vec![(500, r#"{"detail":"boom"}"#)]).await;
        let client = client_for(&url);
        let mut session = TrainingSession::new(Domain::Letters, "b", 5).unwrap();

        assert!(session.submit(&client, &pose()).await.is_err());
        assert_eq!(session.progress().submitted, 0);
        assert!(session.last_error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_submit_latest_skips_frames_without_a_hand() {
        let client = client_for("http://127.0.0.1:9");
        let (mut latest, rx) = LatestPose::new();
        let mut session = TrainingSession::new(Domain::Letters, "c", 5).unwrap();

        assert_eq!(session.submit_latest(&client, &rx).await.unwrap(), None);
        latest.on_pose(&VideoFrame::new(1, RgbImage::new(2, 2)), None);
        assert_eq!(session.submit_latest(&client, &rx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_returns_once_the_target_is_reached() {
        let (url, _server) =
            stub_server(vec![(200, r#"{"message":"Letra entrenada","total_samples":9}"#)]).await;
        let client = client_for(&url);
        let mut session = TrainingSession::new(Domain::Letters, "d", 1).unwrap();
        let (mut latest, rx) = LatestPose::new();
        latest.on_pose(&VideoFrame::new(1, RgbImage::new(2, 2)), Some(&pose()));

        tokio::time::timeout(
            Duration::from_secs(2),
            session.run(&client, rx, CancellationToken::new()),
        )
        .await
        .unwrap();
        assert!(session.is_complete());
        assert_eq!(session.progress().server_total, Some(9));
    }

    #[tokio::test]
    async fn test_cancel_abandons_sample_in_flight() {
        let (url, _server) = stub_server_with_delay(
            vec![(200, r#"{"message":"Letra entrenada","total_samples":1}"#)],
            Duration::from_secs(3),
        )
        .await;
        let client = client_for(&url);
        let mut session = TrainingSession::new(Domain::Letters, "e", 5).unwrap();
        let (mut latest, rx) = LatestPose::new();
        latest.on_pose(&VideoFrame::new(1, RgbImage::new(2, 2)), Some(&pose()));
        let cancel_token = CancellationToken::new();

        let token = cancel_token.clone();
        let canceller = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        };
        let run = tokio::time::timeout(
            Duration::from_millis(500),
            session.run(&client, rx, cancel_token),
        );
        let (result, ()) = tokio::join!(run, canceller);

        assert!(result.is_ok());
        assert_eq!(session.progress().submitted, 0);
    }
}
