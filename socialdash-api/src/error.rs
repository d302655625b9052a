use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Failure of a single remote call.
///
/// `Clone` so that one refresh outcome can be handed to every request that
/// queued behind it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The server answered with a non-success status.
    Response {
        status: StatusCode,
        url: String,
        body: Option<ErrorBody>,
    },
    Network(String),
    Timeout,
    Decode(String),
    /// A refresh was requested but no user id is cached.
    MissingSubject,
    /// The in-flight refresh was dropped before it settled.
    RefreshAborted,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Response { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ApiError::Response { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Server supplied `ERROR_DESCRIPTION`, if any.
    pub fn description(&self) -> Option<&str> {
        self.body().and_then(|b| b.error_description.as_deref())
    }

    pub fn has_response(&self) -> bool {
        matches!(self, ApiError::Response { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            ApiError::Timeout
        } else if value.is_decode() {
            ApiError::Decode(value.to_string())
        } else {
            ApiError::Network(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Decode(value.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Response { status, body, .. } => {
                match body.as_ref().and_then(|b| b.error_description.as_deref()) {
                    Some(description) => f.write_str(description),
                    None => write!(f, "Request failed with status code {}", status.as_u16()),
                }
            }
            ApiError::Network(e) => write!(f, "Network error: {}", e),
            ApiError::Timeout => f.write_str("Request timed out"),
            ApiError::Decode(e) => write!(f, "Invalid response: {}", e),
            ApiError::MissingSubject => f.write_str("No user ID available"),
            ApiError::RefreshAborted => f.write_str("Token refresh was aborted"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error fields the backend places in a failed response body. Both the
/// upper-case and lower-case spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "STATUS", default)]
    pub status: Option<String>,
    #[serde(rename = "ERROR_CODE", alias = "error_code", default)]
    pub error_code: Option<String>,
    #[serde(rename = "ERROR_FILTER", alias = "error_filter", default)]
    pub error_filter: Option<String>,
    #[serde(rename = "ERROR_DESCRIPTION", alias = "error_description", default)]
    pub error_description: Option<String>,
}

impl ErrorBody {
    /// Lenient parse: bodies that are not JSON objects yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<ErrorBody>(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_accepts_both_spellings() {
        let upper = ErrorBody::parse(r#"{"ERROR_CODE":"TOKEN_EXPIRED"}"#).unwrap();
        assert_eq!(upper.error_code.as_deref(), Some("TOKEN_EXPIRED"));

        let lower = ErrorBody::parse(r#"{"error_filter":"USER_END_VIOLATION"}"#).unwrap();
        assert_eq!(lower.error_filter.as_deref(), Some("USER_END_VIOLATION"));
    }

    #[test]
    fn error_body_rejects_non_json() {
        assert!(ErrorBody::parse("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn display_prefers_server_description() {
        let err = ApiError::Response {
            status: StatusCode::BAD_REQUEST,
            url: "/api/posts".into(),
            body: Some(ErrorBody {
                error_description: Some("Content too long".into()),
                ..Default::default()
            }),
        };
        assert_eq!(err.to_string(), "Content too long");

        let bare = ApiError::Response {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            url: "/api/posts".into(),
            body: None,
        };
        assert_eq!(bare.to_string(), "Request failed with status code 500");
    }
}
