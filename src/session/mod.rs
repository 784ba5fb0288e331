mod recognition;
mod training;

pub use recognition::{Recognition, RecognitionSession, RecognitionStatus, Recognizer};
pub use training::{TrainingProgress, TrainingSession};
