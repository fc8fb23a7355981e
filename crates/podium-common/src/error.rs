//! Error types for Podium
//!
//! These are the error kinds surfaced to callers of the leaderboard.
//! Storage adapters have their own error type that converts into this one.

use crate::types::PlayerIdError;
use thiserror::Error;

/// Common result type for Podium operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Podium
#[derive(Debug, Error)]
pub enum Error {
    /// Player absent from the queried store. A normal outcome, not a fault.
    #[error("player not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid player id: {0}")]
    InvalidPlayerId(#[from] PlayerIdError),

    /// Transport, connection or deadline failure in either store
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A non-authoritative step failed while the authoritative one succeeded
    #[error("degraded: {0}")]
    Degraded(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a store unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a retryable error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Get HTTP status code for the boundary layer
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::InvalidPlayerId(_) => 400,
            Self::NotFound(_) => 404,
            Self::StoreUnavailable(_) => 503,
            Self::Degraded(_) | Self::Configuration(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerId;

    #[test]
    fn test_error_not_found() {
        assert!(Error::NotFound("p1".into()).is_not_found());
        assert!(!Error::store_unavailable("down").is_not_found());
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::store_unavailable("timeout").is_retryable());
        assert!(!Error::invalid_input("n").is_retryable());
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::invalid_input("zero delta").http_status_code(), 400);
        assert_eq!(Error::NotFound("p1".into()).http_status_code(), 404);
        assert_eq!(Error::store_unavailable("down").http_status_code(), 503);

        let err: Error = PlayerId::new("").unwrap_err().into();
        assert_eq!(err.http_status_code(), 400);
    }
}
