use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Machine-readable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExternalSigning,
    Signing,
    Network,
    Api,
    Auth,
    CircuitBreakerOpen,
    Validation,
    InsufficientAllowance,
    Config,
    Storage,
    Crypto,
    Serialization,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ExternalSigning => "external_signing",
            ErrorKind::Signing => "signing",
            ErrorKind::Network => "network",
            ErrorKind::Api => "api",
            ErrorKind::Auth => "auth",
            ErrorKind::CircuitBreakerOpen => "circuit_breaker_open",
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientAllowance => "insufficient_allowance",
            ErrorKind::Config => "config",
            ErrorKind::Storage => "storage",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("External L1 signer failed: {0}")]
    ExternalSigning(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Circuit breaker is open, retry after {}s", .retry_after.as_secs())]
    CircuitBreakerOpen { retry_after: Duration },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Daily sponsorship allowance exhausted ({remaining}/{limit} remaining)")]
    InsufficientAllowance { remaining: u32, limit: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secure storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("{operation} failed after {attempts} attempt(s) in {}ms: {source}", .elapsed.as_millis())]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ExternalSigning(_) => ErrorKind::ExternalSigning,
            Error::Signing(_) => ErrorKind::Signing,
            Error::Network(_) => ErrorKind::Network,
            Error::Api { .. } => ErrorKind::Api,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::CircuitBreakerOpen { .. } => ErrorKind::CircuitBreakerOpen,
            Error::Validation(_) => ErrorKind::Validation,
            Error::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            Error::Config(_) => ErrorKind::Config,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    /// Whether the retry executor may attempt the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => is_retryable_status(*status),
            Error::RetriesExhausted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether the caller should degrade to a non-gasless (paid) transaction path.
    pub fn should_use_fallback(&self) -> bool {
        match self {
            Error::Network(_)
            | Error::Auth { .. }
            | Error::CircuitBreakerOpen { .. }
            | Error::InsufficientAllowance { .. } => true,
            Error::Api { status, .. } => is_retryable_status(*status),
            Error::RetriesExhausted { source, .. } => source.should_use_fallback(),
            _ => false,
        }
    }

    /// Whether the failure says something about the health of the remote service.
    pub(crate) fn is_remote_failure(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => is_retryable_status(*status),
            Error::RetriesExhausted { source, .. } => source.is_remote_failure(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status to the matching error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Auth { status, message },
            _ => Error::Api { status, message },
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Validation(format!("Hex decode error: {err}"))
    }
}
