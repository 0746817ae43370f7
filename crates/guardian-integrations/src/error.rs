//! Error types for guardian-integrations

use thiserror::Error;

/// Errors raised while talking to an external tool or service
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Executable not found in PATH
    #[error("{tool} is not installed or not in PATH")]
    ToolNotFound { tool: String },

    /// External command exited unsuccessfully
    #[error("{command} failed (exit code {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// External command exceeded its time limit
    #[error("{command} timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    /// Tool output could not be understood
    #[error("unparseable report: {0}")]
    ReportParse(String),

    /// Required credential or setting missing
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Service answered, but not with what we asked for
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered without usable content
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// Transport-level HTTP error
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        IntegrationError::Http(err.to_string())
    }
}

/// Keep at most `max` characters of a response body for error messages.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        format!("{}...", trimmed.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = IntegrationError::CommandFailed {
            command: "git push".to_string(),
            exit_code: 1,
            stderr: "rejected".to_string(),
        };
        assert_eq!(err.to_string(), "git push failed (exit code 1): rejected");
    }

    #[test]
    fn test_snippet_truncates() {
        assert_eq!(snippet("  short  ", 10), "short");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }
}
