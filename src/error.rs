//! Error types for the market data scheduler

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of a single provider call
///
/// Transport errors and HTTP statuses are classified into these variants once,
/// at the provider boundary. None of them ever reach a scheduler caller: the
/// fetcher answers every one of them with fallback data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider signalled quota exhaustion (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// No response within the request bound
    #[error("Request timeout")]
    Timeout,

    /// Connectivity failure or server error (5xx)
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// Anything else, including undecodable payloads
    #[error("Provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Classifies an HTTP status that is not a success
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else if status.is_server_error() {
            Self::Unreachable(format!("HTTP {}: {}", status, body))
        } else {
            Self::Unknown(format!("HTTP {}: {}", status, body))
        }
    }

    /// Returns the serializable failure tag for this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited => FailureKind::RateLimited,
            Self::Timeout => FailureKind::Timeout,
            Self::Unreachable(_) => FailureKind::Unreachable,
            Self::Unknown(_) => FailureKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::from_status(status, "")
        } else if err.is_connect() || err.is_request() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

/// Why a response was synthesized instead of fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Timeout,
    Unreachable,
    Unknown,
}

/// Errors surfaced to scheduler callers
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    /// The requested operation is malformed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// Creates an InvalidOperation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Creates an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
