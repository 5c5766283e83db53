use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the wound analysis pipeline.
///
/// Only [`WoundAnalysisError::Input`] ever reaches the caller of
/// [`crate::WoundAnalyzer::analyze`]; every other variant is converted into a
/// stage fallback or a whole-result fallback carrying its message.
#[derive(Error, Debug)]
pub enum WoundAnalysisError {
    #[error("Input error: {field} {reason}")]
    Input { field: String, reason: String },

    #[error("Model unavailable: {name} could not be resolved")]
    ModelUnavailable { name: String },

    #[error("Inference engine not ready: {reason}")]
    EngineNotReady { reason: String },

    #[error("Decode error: could not decode image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Inference error: {operation} failed")]
    Inference {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task error: {operation} did not complete: {reason}")]
    Task { operation: String, reason: String },
}

pub type Result<T> = std::result::Result<T, WoundAnalysisError>;

impl WoundAnalysisError {
    pub fn input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn inference(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::Inference {
            operation: operation.into(),
            source: reason.into(),
        }
    }

    pub const fn is_input_error(&self) -> bool {
        matches!(self, Self::Input { .. })
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should construct
/// `WoundAnalysisError::FileSystem` directly.
impl From<std::io::Error> for WoundAnalysisError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert ONNX Runtime errors to inference errors.
impl From<ort::Error> for WoundAnalysisError {
    fn from(err: ort::Error) -> Self {
        Self::Inference {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor reshaping around a session call, so they
/// are reported as inference failures.
impl From<ndarray::ShapeError> for WoundAnalysisError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Inference {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

/// A panicked or cancelled blocking task.
impl From<tokio::task::JoinError> for WoundAnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            operation: "blocking task".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_classification() {
        let err = WoundAnalysisError::input("image_path", "must not be empty");
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "Input error: image_path must not be empty");

        let err = WoundAnalysisError::ModelUnavailable {
            name: "wound_classifier.onnx".to_string(),
        };
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_inference_error_keeps_reason_as_source() {
        let err = WoundAnalysisError::inference("classification", "bad output shape");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("bad output shape"));
    }
}
