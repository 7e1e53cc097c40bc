// Error taxonomy for the analysis session.
//
// Configuration errors are fatal at startup. Everything else is a
// request-level error: the session host catches it and shows the message to
// the user instead of stopping the process.
//
// Internal plumbing (database, CLI) keeps using anyhow; it gets folded into
// `Storage` at the session boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopicalError {
    /// Missing, malformed or unreadable settings (including the API key).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The analysis service rejected the credential (401/403).
    #[error("Analysis service rejected the API key: {0}")]
    Authentication(String),

    /// The external call failed, returned a non-success status, or sent back
    /// something we couldn't parse.
    #[error("Analysis service error: {0}")]
    Service(String),

    /// The external call didn't finish within the configured timeout.
    #[error("Analysis service timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Empty or malformed user input. Raised before any network activity.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Another analysis is already running in this session host.
    #[error("An analysis is already running, try again when it finishes")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TopicalError {
    /// Stable, machine-readable name for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            TopicalError::Configuration(_) => "configuration",
            TopicalError::Authentication(_) => "authentication",
            TopicalError::Service(_) | TopicalError::Timeout { .. } => "service",
            TopicalError::Validation(_) => "validation",
            TopicalError::NotFound(_) => "not_found",
            TopicalError::Busy => "busy",
            TopicalError::Storage(_) => "storage",
        }
    }

    /// Wrap an anyhow error from the storage layer.
    pub fn storage(err: anyhow::Error) -> Self {
        TopicalError::Storage(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_a_service_error() {
        let err = TopicalError::Timeout { seconds: 60 };
        assert_eq!(err.kind(), "service");
        assert!(err.to_string().contains("60 seconds"));
    }

    #[test]
    fn test_storage_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("Failed to save topics");
        let err = TopicalError::storage(inner);
        let msg = err.to_string();
        assert!(msg.contains("Failed to save topics"));
        assert!(msg.contains("disk full"));
    }
}
