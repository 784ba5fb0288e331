use crate::classifier::{ClassifierClient, Domain, PredictService, Prediction};
use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, RecognitionError};
use crate::pose::Pose;
use crate::render::PoseSample;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimit;
use tower::load_shed::LoadShed;
use tower::load_shed::error::Overloaded;
use tower::timeout::Timeout;
use tower::timeout::error::Elapsed;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};
use tracing::{debug, info, warn};

type PredictStack = LoadShed<ConcurrencyLimit<Timeout<PredictService>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub label: String,
    pub confidence: f32,
    /// Confidence reached the configured threshold.
    pub accepted: bool,
}

impl Recognition {
    fn from_prediction(prediction: Prediction, min_confidence: f32) -> Self {
        Self {
            accepted: prediction.confidence >= min_confidence,
            label: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// Cheap to clone. All clones share one prediction slot, so a call made
/// while another is still in flight fails fast with `Busy`.
#[derive(Clone)]
pub struct Recognizer {
    stack: PredictStack,
    domain: Domain,
    min_confidence: f32,
}

impl Recognizer {
    pub fn new(client: ClassifierClient, config: &ClassifierConfig) -> Self {
        let stack = ServiceBuilder::new()
            .load_shed()
            .concurrency_limit(1)
            .timeout(config.timeout())
            .service(PredictService::new(client, config.domain));
        Self {
            stack,
            domain: config.domain,
            min_confidence: config.min_confidence,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub async fn recognize(&self, pose: Pose) -> Result<Recognition, RecognitionError> {
        let mut stack = self.stack.clone();
        let service = ServiceExt::<Pose>::ready(&mut stack)
            .await
            .map_err(classify)?;
        let prediction = service.call(pose).await.map_err(classify)?;
        Ok(Recognition::from_prediction(prediction, self.min_confidence))
    }
}

fn classify(error: BoxError) -> RecognitionError {
    if error.is::<Overloaded>() {
        return RecognitionError::Busy;
    }
    if error.is::<Elapsed>() {
        return ClassifierError::Timeout.into();
    }
    match error.downcast::<ClassifierError>() {
        Ok(error) => (*error).into(),
        Err(other) => ClassifierError::InvalidResponse(other.to_string()).into(),
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecognitionStatus {
    #[default]
    Idle,
    NoHand,
    Recognized(Recognition),
    Failed(String),
}

/// Recognizes poses one at a time and builds a sentence from accepted letters.
pub struct RecognitionSession {
    recognizer: Recognizer,
    client: ClassifierClient,
    status: RecognitionStatus,
    sentence: String,
}

impl RecognitionSession {
    pub fn new(client: ClassifierClient, config: &ClassifierConfig) -> Self {
        Self {
            recognizer: Recognizer::new(client.clone(), config),
            client,
            status: RecognitionStatus::Idle,
            sentence: String::new(),
        }
    }

    pub fn status(&self) -> &RecognitionStatus {
        &self.status
    }

    pub fn sentence(&self) -> &str {
        &self.sentence
    }

    /// `Busy` leaves the previous status in place.
    pub async fn recognize(&mut self, pose: Pose) -> Result<Recognition, RecognitionError> {
        match self.recognizer.recognize(pose).await {
            Ok(recognition) => {
                debug!(
                    "Recognized '{}' ({:.2}, accepted: {})",
                    recognition.label, recognition.confidence, recognition.accepted
                );
                self.status = RecognitionStatus::Recognized(recognition.clone());
                Ok(recognition)
            }
            Err(RecognitionError::Busy) => Err(RecognitionError::Busy),
            Err(e) => {
                warn!("Recognition failed: {}", e);
                self.status = RecognitionStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Recognizes the newest detected pose. `Ok(None)` when that frame had no hand.
    pub async fn recognize_latest(
        &mut self,
        latest: &watch::Receiver<Option<PoseSample>>,
    ) -> Result<Option<Recognition>, RecognitionError> {
        let pose = latest
            .borrow()
            .as_ref()
            .and_then(|sample| sample.pose.clone());
        match pose {
            Some(pose) => self.recognize(pose).await.map(Some),
            None => {
                self.status = RecognitionStatus::NoHand;
                Ok(None)
            }
        }
    }

    /// Recognizes every new pose sample until cancelled or the sender is gone.
    /// A prediction still in flight at cancellation is abandoned.
    pub async fn run(
        &mut self,
        mut latest: watch::Receiver<Option<PoseSample>>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                changed = latest.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            // Failures are logged by `recognize`.
            let result = tokio::select! {
                _ = cancel_token.cancelled() => break,
                result = self.recognize_latest(&latest) => result,
            };
            if let Ok(Some(recognition)) = result {
                if recognition.accepted {
                    info!(
                        "Recognized '{}' with confidence {:.2}",
                        recognition.label, recognition.confidence
                    );
                }
            }
        }
    }

    /// Appends an accepted letter to the sentence kept by the service and
    /// returns the updated sentence. Rejected recognitions are ignored.
    pub async fn accept_into_sentence(
        &mut self,
        recognition: &Recognition,
    ) -> Result<Option<&str>, ClassifierError> {
        if !recognition.accepted {
            return Ok(None);
        }
        if self.recognizer.domain() != Domain::Letters {
            return Err(ClassifierError::Unsupported {
                operation: "sentence",
                domain: self.recognizer.domain().name(),
            });
        }
        self.sentence = self.client.add_to_sentence(&recognition.label).await?;
        Ok(Some(self.sentence.as_str()))
    }

    pub async fn clear_sentence(&mut self) -> Result<(), ClassifierError> {
        self.client.reset_sentence().await?;
        self.sentence.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::VideoFrame;
    use crate::classifier::test_support::{client_for, pose, stub_server, stub_server_with_delay};
    use crate::render::{LatestPose, PoseConsumer};
    use image::RgbImage;
    use std::time::Duration;

    fn config(timeout_ms: u64) -> ClassifierConfig {
        ClassifierConfig {
            timeout_ms,
            min_confidence: 0.6,
            domain: Domain::Letters,
            ..ClassifierConfig::default()
        }
    }

    #[tokio::test]
    async fn test_threshold_decides_acceptance() {
        let (url, _server) = stub_server(vec![
            (200, r#"{"prediction":"A","confidence":0.9}"#),
            (200, r#"{"prediction":"B","confidence":0.4}"#),
        ])
        .await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));

        let first = session.recognize(pose()).await.unwrap();
        assert_eq!(first.label, "A");
        assert!(first.accepted);
        let second = session.recognize(pose()).await.unwrap();
        assert!(!second.accepted);
        assert_eq!(session.status(), &RecognitionStatus::Recognized(second));
    }

    #[tokio::test]
    async fn test_second_prediction_in_flight_is_busy() {
        let (url, server) = stub_server_with_delay(
            vec![(200, r#"{"prediction":"A","confidence":0.9}"#)],
            Duration::from_millis(200),
        )
        .await;
        let recognizer = Recognizer::new(client_for(&url), &config(2000));
        let other = recognizer.clone();

        let (first, second) = tokio::join!(recognizer.recognize(pose()), other.recognize(pose()));
        assert_eq!(first.unwrap().label, "A");
        assert!(matches!(second, Err(RecognitionError::Busy)));
        assert_eq!(server.await.unwrap().len(), 1);

        // The slot is free again once the first call finished.
        assert!(!matches!(
            recognizer.recognize(pose()).await,
            Err(RecognitionError::Busy)
        ));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let (url, _server) = stub_server_with_delay(
            vec![(200, r#"{"prediction":"A","confidence":0.9}"#)],
            Duration::from_millis(500),
        )
        .await;
        let mut session = RecognitionSession::new(client_for(&url), &config(50));

        let result = session.recognize(pose()).await;
        assert!(matches!(
            result,
            Err(RecognitionError::Classifier(ClassifierError::Timeout))
        ));
        assert!(matches!(session.status(), RecognitionStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_untrained_model_surfaces_as_classifier_error() {
        let (url, _server) =
            stub_server(vec![(400, r#"{"detail":"Modelo no entrenado"}"#)]).await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));

        let result = session.recognize(pose()).await;
        assert!(matches!(
            result,
            Err(RecognitionError::Classifier(ClassifierError::NotTrained(_)))
        ));
    }

    #[tokio::test]
    async fn test_latest_without_hand_sets_no_hand() {
        let mut session =
            RecognitionSession::new(client_for("http://127.0.0.1:9"), &config(2000));
        let (mut latest, rx) = LatestPose::new();
        latest.on_pose(&VideoFrame::new(3, RgbImage::new(2, 2)), None);

        assert_eq!(session.recognize_latest(&rx).await.unwrap(), None);
        assert_eq!(session.status(), &RecognitionStatus::NoHand);
    }

    #[tokio::test]
    async fn test_only_accepted_letters_reach_the_sentence() {
        let (url, server) = stub_server(vec![(200, r#"{"sentence":"HA"}"#)]).await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));
        let rejected = Recognition {
            label: "Q".to_string(),
            confidence: 0.2,
            accepted: false,
        };
        let accepted = Recognition {
            label: "A".to_string(),
            confidence: 0.8,
            accepted: true,
        };

        assert_eq!(session.accept_into_sentence(&rejected).await.unwrap(), None);
        assert_eq!(
            session.accept_into_sentence(&accepted).await.unwrap(),
            Some("HA")
        );
        assert_eq!(session.sentence(), "HA");
        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains(r#""letter":"A""#));
    }

    fn hand_sample(latest: &mut LatestPose) {
        latest.on_pose(&VideoFrame::new(1, RgbImage::new(2, 2)), Some(&pose()));
    }

    #[tokio::test]
    async fn test_run_recognizes_new_samples() {
        let (url, _server) =
            stub_server(vec![(200, r#"{"prediction":"L","confidence":0.8}"#)]).await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));
        let (mut latest, rx) = LatestPose::new();
        let cancel_token = CancellationToken::new();
        hand_sample(&mut latest);

        let token = cancel_token.clone();
        let task = tokio::spawn(async move {
            session.run(rx, token).await;
            session
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_token.cancel();

        let session = task.await.unwrap();
        assert!(matches!(
            session.status(),
            RecognitionStatus::Recognized(recognition) if recognition.label == "L"
        ));
    }

    #[tokio::test]
    async fn test_cancel_abandons_prediction_in_flight() {
        let (url, _server) = stub_server_with_delay(
            vec![(200, r#"{"prediction":"A","confidence":0.9}"#)],
            Duration::from_secs(3),
        )
        .await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));
        let (mut latest, rx) = LatestPose::new();
        let cancel_token = CancellationToken::new();
        hand_sample(&mut latest);

        let token = cancel_token.clone();
        let task = tokio::spawn(async move {
            session.run(rx, token).await;
            session
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_token.cancel();

        let session = tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("run did not return after cancel")
            .unwrap();
        assert_eq!(session.status(), &RecognitionStatus::Idle);
    }

    #[tokio::test]
    async fn test_clear_sentence_resets_remote_and_local_text() {
        let (url, server) = stub_server(vec![
            (200, r#"{"sentence":"H"}"#),
            (200, r#"{"message":"Oracion reiniciada"}"#),
        ])
        .await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));
        let letter = Recognition {
            label: "H".to_string(),
            confidence: 0.9,
            accepted: true,
        };
        session.accept_into_sentence(&letter).await.unwrap();
        assert_eq!(session.sentence(), "H");

        session.clear_sentence().await.unwrap();
        assert_eq!(session.sentence(), "");
        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("POST /letters/sentence/reset"));
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_the_sentence() {
        let (url, _server) = stub_server(vec![
            (200, r#"{"sentence":"H"}"#),
            (500, r#"{"detail":"boom"}"#),
        ])
        .await;
        let mut session = RecognitionSession::new(client_for(&url), &config(2000));
        let letter = Recognition {
            label: "H".to_string(),
            confidence: 0.9,
            accepted: true,
        };
        session.accept_into_sentence(&letter).await.unwrap();

        assert!(matches!(
            session.clear_sentence().await,
            Err(ClassifierError::Rejected { status: 500, .. })
        ));
        assert_eq!(session.sentence(), "H");
    }
}
