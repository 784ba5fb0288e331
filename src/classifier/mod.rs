mod client;
mod service;
mod types;

pub use client::ClassifierClient;
pub use service::PredictService;
pub use types::{MathOperator, MathResult, Prediction, TrainResponse};

#[cfg(test)]
pub(crate) use client::tests as test_support;

use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol families the remote service keeps a separate model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Vowels,
    Letters,
    Signs,
}

impl Domain {
    pub(crate) fn path(self) -> &'static str {
        match self {
            Domain::Vowels => "vocales",
            Domain::Letters => "letters",
            Domain::Signs => "sign",
        }
    }

    /// Key of the label list in `GET /{domain}/list`; signs have no list.
    pub(crate) fn list_key(self) -> Option<&'static str> {
        match self {
            Domain::Vowels => Some("vocales"),
            Domain::Letters => Some("letters"),
            Domain::Signs => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Domain::Vowels => "vowels",
            Domain::Letters => "letters",
            Domain::Signs => "signs",
        }
    }

    /// Uppercases and checks a training label.
    pub fn normalize_label(self, label: &str) -> Result<String, ClassifierError> {
        let trimmed = label.trim();
        let normalized = trimmed.to_uppercase();
        let mut chars = normalized.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        let valid = match self {
            Domain::Vowels => single.is_some_and(|c| "AEIOU".contains(c)),
            Domain::Letters => single.is_some_and(char::is_alphabetic),
            Domain::Signs => !trimmed.is_empty(),
        };
        match (valid, self) {
            (false, _) => Err(ClassifierError::InvalidLabel(label.to_string())),
            (true, Domain::Signs) => Ok(trimmed.to_string()),
            (true, _) => Ok(normalized),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
