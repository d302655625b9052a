use super::{paths, Endpoint, RequestData};
use crate::macros::setter;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

// Common

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

// Requests

#[derive(Clone, Serialize)]
pub struct RegisterUser {
    email: String,
    password: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl RegisterUser {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            role: None,
        }
    }

    setter!(opt role: String);

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

impl Endpoint for RegisterUser {
    type Data = Self;
    type Response = AuthPayload;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::REGISTER.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Clone, Serialize)]
pub struct LoginUser {
    email: String,
    password: String,
}

impl LoginUser {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Debug for LoginUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Endpoint for LoginUser {
    type Data = Self;
    type Response = AuthPayload;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::LOGIN.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

/// Mints a new access token for `user_id`. The renewal capability lives
/// server side; the expired token is not presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshAccessToken {
    pub user_id: String,
}

impl RefreshAccessToken {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl Endpoint for RefreshAccessToken {
    type Data = Self;
    type Response = RefreshPayload;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::REFRESH.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Default, Debug, Clone)]
pub struct Logout;

impl Endpoint for Logout {
    type Data = ();
    type Response = serde_json::Value;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::LOGOUT.into()
    }
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: UserProfile,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiRequest;

    #[test]
    fn profile_reads_mongo_style_id() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"_id":"u1","email":"a@b.c","name":"Ada","role":"admin"}"#,
        )
        .unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.role, "admin");
    }

    #[test]
    fn login_debug_hides_password() {
        let login = LoginUser::new("a@b.c", "hunter2");
        assert!(!format!("{:?}", login).contains("hunter2"));
    }

    #[test]
    fn register_omits_missing_role() {
        let request = ApiRequest::from_endpoint(&RegisterUser::new("a@b.c", "pw", "Ada")).unwrap();
        let body = request.body.unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, paths::REGISTER);
        assert!(body.get("role").is_none());
        assert_eq!(body["name"], "Ada");
    }
}
