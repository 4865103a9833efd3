//! Error type for the retrieval core.
//!
//! Configuration faults, "not ready" conditions and recoverable runtime
//! failures are separate variants so callers (CLI, HTTP layer) can decide
//! whether to retry, fall back to a stale index, or report a bad request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameters, detected before any work is done.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No index has been installed yet.
    #[error("index not ready: no index has been built yet")]
    NotReady,

    /// Another index build is already running.
    #[error("an index build is already in progress")]
    BuildInProgress,

    /// The build was cancelled through its token.
    #[error("index build cancelled")]
    Cancelled,

    /// Index construction failed. The previously installed index is untouched.
    #[error("index build failed: {0}")]
    Build(String),

    /// Query-time embedding failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("document source failed: {0}")]
    Source(String),

    #[error("answer generation failed: {0}")]
    Generation(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// True for caller mistakes that will fail again unchanged.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True for failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NotReady
                | Error::BuildInProgress
                | Error::Build(_)
                | Error::Embedding(_)
                | Error::Source(_)
                | Error::Generation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_not_retryable() {
        let err = Error::config("overlap must be smaller than window_size");
        assert!(err.is_config());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_not_ready_is_retryable() {
        assert!(Error::NotReady.is_retryable());
        assert!(!Error::NotReady.is_config());
    }
}
