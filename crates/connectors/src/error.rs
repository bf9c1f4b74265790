use std::{fmt, time::Duration};
use thiserror::Error;

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Throttled by the API; recoverable by backing off.
    RateLimited,
    /// Recoverable failure other than throttling (e.g. a 5xx).
    Transient,
    /// Unrecoverable; the job cannot continue past this page.
    Fatal,
    /// The caller cancelled while the request was backing off.
    Cancelled,
}

impl ApiErrorKind {
    pub fn is_recoverable(self) -> bool {
        matches!(self, ApiErrorKind::RateLimited | ApiErrorKind::Transient)
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::RateLimited => write!(f, "rate limited"),
            ApiErrorKind::Transient => write!(f, "transient"),
            ApiErrorKind::Fatal => write!(f, "fatal"),
            ApiErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Classified outcome of a failed request attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} API error: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Server-specified wait before the next attempt.
    pub retry_after: Option<Duration>,
    pub message: String,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(ApiErrorKind::RateLimited, message)
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Fatal, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Cancelled, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ApiErrorKind::Fatal
    }
}

/// Connection-level failure: no HTTP response was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL is logged without its query, which may carry credentials.
    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),
}
