//! Domain-level error taxonomy for Guardian.

/// Errors produced when a payload crossing a collaborator boundary is malformed.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unknown confidence level: {value}")]
    UnknownConfidence { value: String },

    #[error("finding line number must be positive")]
    InvalidLineNumber,
}

/// Guardian domain errors.
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error("analyzer error: {0}")]
    Analyzer(String),

    #[error("suggestion error: {0}")]
    Suggestion(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("notification error: {0}")]
    Notify(String),

    #[error("integration error: {0}")]
    Integration(String),

    #[error("invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("path escapes workspace: {0}")]
    PathEscape(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Guardian domain operations.
pub type Result<T> = std::result::Result<T, GuardianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardian_error_display() {
        let err = GuardianError::Vcs("push rejected".to_string());
        assert!(err.to_string().contains("vcs error"));
        assert!(err.to_string().contains("push rejected"));

        let err = GuardianError::Analyzer("bandit not installed".to_string());
        assert!(err.to_string().contains("analyzer error"));
    }

    #[test]
    fn test_payload_error_wraps() {
        let err: GuardianError = PayloadError::UnknownConfidence {
            value: "CRITICAL".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("invalid payload"));
        assert!(msg.contains("CRITICAL"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: GuardianError = io.into();
        assert!(matches!(err, GuardianError::Io(_)));
    }
}
