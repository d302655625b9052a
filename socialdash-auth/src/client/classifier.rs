use super::token_inspector::TokenInspector;
use socialdash_api::{ApiError, StatusCode};

/// Backend error codes that always mean the session is unusable.
pub const AUTH_ERROR_CODES: [&str; 12] = [
    "VTAPP-AUTH001",
    "VTAPP-AUTH002",
    "VTAPP-AUTH003",
    "VTAPP-AUTH004",
    "VTAPP-AUTH005",
    "VTAPP-AUTH006",
    "VTAPP-AUTH012",
    "VTAPP-AUTH013",
    "USER_NOT_AUTHENTICATED",
    "TOKEN_EXPIRED",
    "INVALID_TOKEN",
    "UNAUTHORIZED",
];

/// Error filter the backend attaches to a policy-violating user.
pub const POLICY_VIOLATION_FILTER: &str = "USER_END_VIOLATION";

pub fn is_auth_error_code(code: &str) -> bool {
    AUTH_ERROR_CODES.contains(&code)
}

/// Decides whether a failed call means the session is over.
#[derive(Clone)]
pub struct AuthErrorClassifier {
    inspector: TokenInspector,
}

impl AuthErrorClassifier {
    pub fn new(inspector: TokenInspector) -> Self {
        Self { inspector }
    }

    /// Errors without a server response (network, timeout) are never auth
    /// errors. A 401/403 only counts when the stored credential is no longer
    /// live; a live one means the server refused something else.
    pub fn is_auth_error(&self, error: &ApiError) -> bool {
        let ApiError::Response { status, body, .. } = error else {
            return false;
        };

        if let Some(body) = body {
            if body.error_code.as_deref().is_some_and(is_auth_error_code) {
                return true;
            }
            if body.error_filter.as_deref() == Some(POLICY_VIOLATION_FILTER) {
                return true;
            }
        }

        match *status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                !self.inspector.credential_is_live()
            }
            _ => false,
        }
    }
}
