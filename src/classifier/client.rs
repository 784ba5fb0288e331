use super::Domain;
use super::types::{
    ErrorResponse, LetterRequest, MathOperator, MathRequest, MathResult, MessageResponse,
    PredictRequest, Prediction, SentenceResponse, TrainRequest, TrainResponse,
};
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::pose::Pose;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

/// HTTP client for the remote training/prediction service.
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    http: reqwest::Client,
    base_url: String,
}

fn request_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Request(e)
    }
}

impl ClassifierClient {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClassifierError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(request_error)?;
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.detail_text())
                .unwrap_or(body);
            return Err(ClassifierError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClassifierError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(request_error)?;
        Self::decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClassifierError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        Self::decode(response).await
    }

    pub async fn ping(&self) -> Result<bool, ClassifierError> {
        let response: MessageResponse = self.get("ping").await?;
        Ok(response.message == "pong")
    }

    #[instrument(skip(self, pose))]
    pub async fn train(
        &self,
        domain: Domain,
        pose: &Pose,
        label: &str,
    ) -> Result<TrainResponse, ClassifierError> {
        let label = domain.normalize_label(label)?;
        let request = TrainRequest {
            landmarks: pose.landmarks(),
            label: &label,
        };
        let response: TrainResponse = self
            .post(&format!("{}/train", domain.path()), &request)
            .await?;
        debug!(
            "Trained '{}' for {}: {} samples",
            label, domain, response.total_samples
        );
        Ok(response)
    }

    #[instrument(skip(self, pose))]
    pub async fn predict(
        &self,
        domain: Domain,
        pose: &Pose,
    ) -> Result<Prediction, ClassifierError> {
        let result: Result<Prediction, ClassifierError> = self
            .post(&format!("{}/predict", domain.path()), &PredictRequest::new(pose))
            .await;
        let prediction = match result {
            Ok(prediction) => prediction,
            // The service answers 400 until at least one sample was trained.
            Err(ClassifierError::Rejected { status, detail })
                if status == StatusCode::BAD_REQUEST.as_u16() =>
            {
                return Err(ClassifierError::NotTrained(detail));
            }
            Err(e) => {
                error!("Prediction request failed: {}", e);
                return Err(e);
            }
        };
        if !(0.0..=1.0).contains(&prediction.confidence) {
            return Err(ClassifierError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                prediction.confidence
            )));
        }
        Ok(prediction)
    }

    pub async fn list(&self, domain: Domain) -> Result<Vec<String>, ClassifierError> {
        let key = domain.list_key().ok_or(ClassifierError::Unsupported {
            operation: "list",
            domain: domain.name(),
        })?;
        let mut response: HashMap<String, Vec<String>> =
            self.get(&format!("{}/list", domain.path())).await?;
        response
            .remove(key)
            .ok_or_else(|| ClassifierError::InvalidResponse(format!("missing '{}'", key)))
    }

    pub async fn reset(&self, domain: Domain) -> Result<String, ClassifierError> {
        if domain.list_key().is_none() {
            return Err(ClassifierError::Unsupported {
                operation: "reset",
                domain: domain.name(),
            });
        }
        let response: MessageResponse = self
            .post(&format!("{}/reset", domain.path()), &serde_json::json!({}))
            .await?;
        Ok(response.message)
    }

    /// Appends a letter to the server-side sentence and returns the sentence.
    pub async fn add_to_sentence(&self, letter: &str) -> Result<String, ClassifierError> {
        let letter = Domain::Letters.normalize_label(letter)?;
        let response: SentenceResponse = self
            .post("letters/sentence/add", &LetterRequest { letter: &letter })
            .await?;
        Ok(response.sentence)
    }

    pub async fn sentence(&self) -> Result<String, ClassifierError> {
        let response: SentenceResponse = self.get("letters/sentence").await?;
        Ok(response.sentence)
    }

    pub async fn reset_sentence(&self) -> Result<(), ClassifierError> {
        let _: MessageResponse = self
            .post("letters/sentence/reset", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn calculate(
        &self,
        a: f64,
        b: f64,
        operation: MathOperator,
    ) -> Result<MathResult, ClassifierError> {
        self.post("math/calculate", &MathRequest { a, b, operation })
            .await
    }
}
