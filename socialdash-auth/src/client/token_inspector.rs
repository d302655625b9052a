use super::token_storage::{TokenStore, USER_EMAIL, USER_ID, USER_ROLE};
use crate::common::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Claims carried in the payload segment of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, alias = "userId", alias = "sub", deserialize_with = "lenient_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// Decodes the payload of `token` without verifying its signature.
pub fn decode(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A token is live when it decodes and its expiry lies strictly after `now`.
pub fn is_live_at(token: &str, now: i64) -> bool {
    decode(token)
        .and_then(|claims| claims.exp)
        .is_some_and(|exp| exp > now)
}

pub fn is_live(token: &str) -> bool {
    is_live_at(token, Utc::now().timestamp())
}

impl Identity {
    pub fn from_claims(claims: &Claims) -> Self {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        Identity {
            user_id: present(&claims.user_id),
            email: present(&claims.email),
            role: present(&claims.role),
        }
    }

    pub fn cached(store: &TokenStore) -> Self {
        Identity {
            user_id: store.user_id(),
            email: store.get_string(USER_EMAIL).filter(|v| !v.is_empty()),
            role: store.get_string(USER_ROLE).filter(|v| !v.is_empty()),
        }
    }
}

/// Reads identity and liveness from the stored credential.
#[derive(Clone)]
pub struct TokenInspector {
    store: TokenStore,
}

impl TokenInspector {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    pub fn claims(&self) -> Option<Claims> {
        decode(&self.store.access_token()?)
    }

    /// `false` when no token is stored or it doesn't decode.
    pub fn credential_is_live(&self) -> bool {
        self.store
            .access_token()
            .is_some_and(|token| is_live(&token))
    }

    /// Decoded claims first, the cached keys for whatever they lack.
    pub fn identity(&self) -> Identity {
        let cached = Identity::cached(&self.store);
        match self.claims() {
            Some(claims) => Identity::from_claims(&claims).or(cached),
            None => cached,
        }
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity().user_id
    }

    pub fn email(&self) -> Option<String> {
        self.identity().email
    }

    pub fn role(&self) -> Option<String> {
        self.identity().role
    }

    /// Same as [`TokenInspector::user_id`], but `None` for a missing or
    /// undecodable token even if a cached id exists.
    pub fn token_subject(&self) -> Option<String> {
        self.claims()
            .map(|claims| Identity::from_claims(&claims))
            .and_then(|identity| identity.user_id)
    }
}
