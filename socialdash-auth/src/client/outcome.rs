use socialdash_api::{ApiError, StatusCode};
use thiserror::Error;

pub const RATE_LIMITED_MESSAGE: &str = "Too many authentication attempts. Please try again later.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    InvalidCredentials,
    /// The server answered but did not report success.
    Rejected,
    Generic,
}

/// User-facing failure of a manager operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ActionError {
    pub kind: FailureKind,
    pub message: String,
}

pub type Outcome<T> = Result<T, ActionError>;

impl ActionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Generic, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    /// Server description when present, otherwise the error's own text.
    pub fn from_api(error: &ApiError, default: &str) -> Self {
        Self::generic(describe(error, default))
    }

    /// Login and registration failures, with rate limiting and bad
    /// credentials told apart.
    pub fn from_credential_failure(error: &ApiError, default: &str) -> Self {
        match error.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => Self::new(
                FailureKind::RateLimited,
                error.description().unwrap_or(RATE_LIMITED_MESSAGE),
            ),
            Some(StatusCode::UNAUTHORIZED) => Self::new(
                FailureKind::InvalidCredentials,
                error.description().unwrap_or(INVALID_CREDENTIALS_MESSAGE),
            ),
            _ => Self::from_api(error, default),
        }
    }
}

fn describe(error: &ApiError, default: &str) -> String {
    if let Some(description) = error.description() {
        return description.to_string();
    }
    let text = error.to_string();
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}
