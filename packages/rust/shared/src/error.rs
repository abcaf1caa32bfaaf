//! Error types for Blueprint.
//!
//! Library crates use [`BlueprintError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Blueprint operations.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// Malformed dimensions, empty batches, bad chunk parameters.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Declared content type is outside the extraction allow-list.
    #[error("unsupported format: {content_type}")]
    UnsupportedFormat { content_type: String },

    /// Document bytes could not be decoded into text.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Embedding or completion provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// A step's failure handler itself failed. `cause` is the step failure
    /// that triggered the handler.
    #[error("recovery for step '{step}' failed: {handler_error}")]
    Recovery {
        step: String,
        handler_error: Box<BlueprintError>,
        #[source]
        cause: Box<BlueprintError>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Broken internal state (poisoned lock, serialization failure).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlueprintError>;

impl BlueprintError {
    /// Create an invalid-argument error from any displayable message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Create an unsupported-format error for a content type.
    pub fn unsupported_format(content_type: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            content_type: content_type.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a step retry budget may absorb this error.
    ///
    /// Only provider failures are transient; everything else surfaces on the
    /// first attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BlueprintError::invalid_argument("dimension must be positive");
        assert_eq!(err.to_string(), "invalid argument: dimension must be positive");

        let err = BlueprintError::unsupported_format("image/png");
        assert!(err.to_string().contains("image/png"));
    }

    #[test]
    fn only_provider_errors_are_retryable() {
        assert!(BlueprintError::Provider("rate limited".into()).is_retryable());
        assert!(!BlueprintError::invalid_argument("k must be positive").is_retryable());
        assert!(!BlueprintError::decode("bad utf-8").is_retryable());
        assert!(!BlueprintError::unsupported_format("image/png").is_retryable());
    }

    #[test]
    fn recovery_keeps_original_cause_as_source() {
        use std::error::Error;

        let err = BlueprintError::Recovery {
            step: "govern".into(),
            handler_error: Box::new(BlueprintError::Internal("handler broke".into())),
            cause: Box::new(BlueprintError::Provider("timeout".into())),
        };
        assert!(err.to_string().contains("govern"));
        assert!(err.to_string().contains("handler broke"));
        let source = err.source().expect("recovery has a source");
        assert_eq!(source.to_string(), "provider error: timeout");
    }
}
