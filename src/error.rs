//! # Error Types
//!
//! Custom error types for Bagwatch using `thiserror`.

use thiserror::Error;

/// Main error type for Bagwatch
#[derive(Debug, Error)]
pub enum BagwatchError {
    /// Network failure talking to the backend
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Backend answered with a non-2xx status
    #[error("Backend returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Response body was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record or envelope could not be mapped onto the typed model
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Canonical payload would not fit in the scannable code
    #[error("Encoded payload is {len} bytes, exceeding the {limit} byte capacity budget")]
    EncodingOverflow { len: usize, limit: usize },

    /// The polling task panicked or was cancelled
    #[error("Poller task failed: {0}")]
    Task(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BagwatchError {
    /// Whether the failure is a transient fetch error.
    ///
    /// Transient errors leave the last good state in place; the next
    /// scheduled tick is the retry. A `Normalization` error reaching a
    /// caller always concerns a whole response envelope, since single bad
    /// records are dropped inside the normalizer.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BagwatchError::Fetch(_)
                | BagwatchError::HttpStatus { .. }
                | BagwatchError::Json(_)
                | BagwatchError::Normalization(_)
        )
    }
}

impl From<reqwest::Error> for BagwatchError {
    fn from(err: reqwest::Error) -> Self {
        BagwatchError::Fetch(err.to_string())
    }
}

/// Result type alias for Bagwatch
pub type Result<T> = std::result::Result<T, BagwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BagwatchError::Fetch("connection refused".to_string()).is_transient());
        assert!(BagwatchError::HttpStatus { status: 503, url: "/snapshot".to_string() }.is_transient());

        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(BagwatchError::from(json_err).is_transient());

        assert!(BagwatchError::Normalization("missing bags".to_string()).is_transient());

        assert!(!BagwatchError::EncodingOverflow { len: 400, limit: 300 }.is_transient());
        assert!(!BagwatchError::Task("panicked".to_string()).is_transient());
    }

    #[test]
    fn test_overflow_message_names_sizes() {
        let err = BagwatchError::EncodingOverflow { len: 412, limit: 300 };
        let msg = err.to_string();
        assert!(msg.contains("412"));
        assert!(msg.contains("300"));
    }
}
