/*
[INPUT]:  Error sources (HTTP, API, handshake, signatures, serialization, pagination)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Handshake step that produced a [`BunqError::Handshake`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Installation,
    DeviceRegistration,
    SessionCreation,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStep::Installation => "installation",
            HandshakeStep::DeviceRegistration => "device registration",
            HandshakeStep::SessionCreation => "session creation",
        };
        f.write_str(name)
    }
}

/// Failure to derive or apply query parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("cannot get next page; there is none")]
    NoNextPage,

    #[error("cannot get previous page; there is none")]
    NoPreviousPage,

    #[error("cannot get id for pagination; there is none")]
    NoPaginationId,

    #[error("invalid pagination link {link:?}: {reason}")]
    InvalidLink { link: String, reason: String },
}

/// Main error type for the bunq client
#[derive(Error, Debug)]
pub enum BunqError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// One of the installation, device or session steps failed
    #[error("handshake failed during {step}: {source}")]
    Handshake {
        step: HandshakeStep,
        #[source]
        source: Box<BunqError>,
    },

    /// Still rate limited after the retry budget was spent
    #[error("http request failed due to rate limit exceeded")]
    RateLimitExceeded,

    /// Still failing server-side after the retry budget was spent
    #[error("http request failed due to internal server error (status {status})")]
    InternalServerError { status: u16 },

    /// Response signature missing or not matching the server public key
    #[error("request was successful but response verification failed")]
    ResponseVerificationFailed,

    /// Handshake response lacks an expected tagged element
    #[error("response is missing the {0} element")]
    MissingElement(&'static str),

    /// Verified payload did not match the expected shape
    #[error("failed to decode verified response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Remote side refused to delete the session
    #[error("request to delete session resulted in response code: {status}")]
    SessionDeletion { status: u16 },

    /// Pagination query parameters could not be applied
    #[error("failed to apply query parameters: {0}")]
    Pagination(#[from] PaginationError),

    /// API returned a non-retryable error response
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Request or context serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Key generation, encoding or signing failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Operation attempted in the wrong session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Context file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BunqError {
    /// Check if a fresh attempt of the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BunqError::Http(err) => err.is_timeout() || err.is_connect(),
            BunqError::RateLimitExceeded | BunqError::InternalServerError { .. } => true,
            BunqError::Handshake { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The server no longer accepts the session token
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, BunqError::Api { status: 401, .. })
    }

    /// Session deletion failed because the server has already forgotten the session
    pub fn is_session_gone(&self) -> bool {
        matches!(self, BunqError::SessionDeletion { status: 401 | 403 | 404 })
    }

    /// Signature problems must never be retried or ignored
    pub fn is_security_event(&self) -> bool {
        match self {
            BunqError::ResponseVerificationFailed => true,
            BunqError::Handshake { source, .. } => source.is_security_event(),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BunqError::Http(err) => err.status().map(|status| status.as_u16()),
            BunqError::RateLimitExceeded => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            BunqError::InternalServerError { status }
            | BunqError::SessionDeletion { status }
            | BunqError::Api { status, .. } => Some(*status),
            BunqError::Handshake { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        BunqError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub(crate) fn handshake(step: HandshakeStep, source: BunqError) -> Self {
        BunqError::Handshake {
            step,
            source: Box::new(source),
        }
    }

    pub(crate) fn crypto(err: impl fmt::Display) -> Self {
        BunqError::Crypto(err.to_string())
    }
}

/// Result type alias for bunq operations
pub type Result<T> = std::result::Result<T, BunqError>;
