use crate::pose::{Landmark, Pose};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct TrainRequest<'a> {
    pub landmarks: &'a [Landmark],
    pub label: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest<'a> {
    pub landmarks: &'a [Landmark],
}

impl<'a> PredictRequest<'a> {
    pub fn new(pose: &'a Pose) -> Self {
        Self {
            landmarks: pose.landmarks(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LetterRequest<'a> {
    pub letter: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainResponse {
    pub message: String,
    pub total_samples: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentenceResponse {
    pub sentence: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    pub fn detail_text(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "**")]
    Power,
    #[serde(rename = "sqrt")]
    SquareRoot,
}

#[derive(Debug, Serialize)]
pub(crate) struct MathRequest {
    pub a: f64,
    pub b: f64,
    pub operation: MathOperator,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MathResult {
    pub result: f64,
    pub operation: String,
}
