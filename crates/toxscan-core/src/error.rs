//! Error types for toxscan

/// Result type alias using toxscan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for toxscan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Scoring service errors
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),

    /// Store read, write, or connection errors
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from the store
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }
}

/// Failure to obtain a score for one piece of text.
///
/// Always recovered by the caller: the item is left unscored and becomes
/// eligible again on the next cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    /// The request did not complete within the configured timeout
    #[error("scoring request timed out")]
    Timeout,

    /// Connection, TLS, or body transfer failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Non-success HTTP status from the service
    #[error("scoring service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response was not the expected `{class, confidence}` shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Caller passed text that is empty after trimming
    #[error("refusing to classify empty text")]
    EmptyInput,
}

impl ClassificationError {
    /// Short stable name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::EmptyInput => "empty_input",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_error_converts() {
        let err: Error = ClassificationError::Timeout.into();
        assert!(matches!(err, Error::Classification(ClassificationError::Timeout)));
        assert!(!err.is_persistence());
    }

    #[test]
    fn test_error_display() {
        let err = ClassificationError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "scoring service returned 503: unavailable");
        assert_eq!(err.kind(), "status");
        assert!(Error::persistence("disk full").is_persistence());
    }
}
