//! Error taxonomy for calls against the source-control API.
//!
//! [`ApiError`] is what a single request can fail with. The rate-limited
//! client retries the transient kinds and turns everything that escapes it
//! into a [`FatalError`].

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request rejected: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Rate limits and network hiccups are "try again later".
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::RateLimited(_) | ApiError::Network(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    /// Classifies an HTTP status plus response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {}", body.trim());
        match status {
            429 => ApiError::RateLimited(message),
            403 if mentions_rate_limit(body) => ApiError::RateLimited(message),
            401 | 403 => ApiError::Auth(message),
            408 | 500..=599 => ApiError::Network(message),
            _ => ApiError::Request(message),
        }
    }

    /// Classifies an error that only exposes a message, e.g. one surfaced by
    /// an SDK.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if mentions_rate_limit(&lower) || lower.contains("429") {
            ApiError::RateLimited(message)
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
        {
            ApiError::Auth(message)
        } else if lower.contains("404") || lower.contains("not found") || lower.contains("422") {
            ApiError::Request(message)
        } else if lower.contains("decod") || lower.contains("deserializ") || lower.contains("json") {
            ApiError::Malformed(message)
        } else {
            ApiError::Network(message)
        }
    }
}

fn mentions_rate_limit(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("rate-limit") || lower.contains("too many requests")
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// A request failure the pipeline cannot recover from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("{0}")]
    Rejected(ApiError),

    #[error("giving up after {attempts} attempts ({}s spent waiting): {last}", .waited.as_secs())]
    Exhausted {
        attempts: u32,
        waited: Duration,
        last: ApiError,
    },
}

impl FatalError {
    /// The underlying cause of the last failed attempt.
    pub fn cause(&self) -> &ApiError {
        match self {
            FatalError::Rejected(err) => err,
            FatalError::Exhausted { last, .. } => last,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.cause().is_auth()
    }

    /// A permanent, non-auth rejection of one request. A spent retry budget
    /// is never recoverable: the next request would hit the same limit.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FatalError::Rejected(err) if !err.is_auth())
    }
}
