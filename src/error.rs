//! Error taxonomy for the decisioning pipeline

use thiserror::Error;

/// A raw field value is missing, malformed, or outside its allowed range.
///
/// The message is returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A categorical field carries a value outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {field} value: '{value}'")]
pub struct UnknownCategoryError {
    pub field: &'static str,
    pub value: String,
}

/// The classifier was unavailable or produced output we cannot trust.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Model runtime error: {0}")]
    Runtime(#[from] ort::Error),
}

/// The prediction log could not be read or written.
///
/// Never surfaced to the caller; the decision is returned regardless.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Prediction store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Prediction store lock poisoned")]
    LockPoisoned,

    #[error("Failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal startup misconfiguration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Encoder produces {encoder} features but the model was trained on {model}")]
    FeatureCountMismatch { encoder: usize, model: usize },

    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Per-request failure. Every variant ends the request with a 400-equivalent.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PipelineError {
    /// HTTP-equivalent status code reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation(_)
            | PipelineError::UnknownCategory(_)
            | PipelineError::Inference(_) => 400,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::UnknownCategory(_) => "unknown_category",
            PipelineError::Inference(_) => "inference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = PipelineError::from(ValidationError::new("Age must be between 18 and 100"));
        assert_eq!(err.to_string(), "Age must be between 18 and 100");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_unknown_category_message() {
        let err = UnknownCategoryError {
            field: "person_education",
            value: "PhD".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown person_education value: 'PhD'");
    }

    #[test]
    fn test_inference_errors_are_bad_requests() {
        let err = PipelineError::from(InferenceError::MalformedOutput("empty".to_string()));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind(), "inference");
    }
}
