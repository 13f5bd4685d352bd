//! Failure taxonomy of an analysis round trip
//!
//! Every failure surfaces as exactly one of three kinds so callers can tell bad
//! input apart from an unreachable service and from a service that replied
//! badly. None of them is retried or defaulted here.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InputValidation(#[from] InputValidationError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("service response error: {0}")]
    ServiceResponse(#[from] ServiceResponseError),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "InputValidationError",
            Self::Transport(_) => "TransportError",
            Self::ServiceResponse(_) => "ServiceResponseError",
        }
    }
}

/// Detected before any external call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputValidationError {
    #[error("source text cannot be empty")]
    EmptySource,

    #[error("unknown tier '{0}' (expected free, pro or enterprise)")]
    InvalidTier(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("service rejected the request: {0}")]
    Api(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("malformed service envelope: {0}")]
    MalformedEnvelope(String),

    #[error("call cancelled by caller")]
    Cancelled,
}

/// The service answered, but the answer cannot be trusted as a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceResponseError {
    #[error("model declined to answer: {0}")]
    Declined(String),

    #[error("reply is not a JSON object: {0}")]
    Unparseable(String),

    #[error("reply is missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' should be {expected}, found {found}")]
    WrongType {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}' value {value} is outside {min}..={max}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("reply applied tier '{applied}' but '{requested}' was requested")]
    TierMismatch { requested: String, applied: String },
}
