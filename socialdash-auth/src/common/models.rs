use socialdash_api::endpoints::auth::UserProfile;

/// Bearer access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    /// Only entered while restoring a cached session at start-up.
    Authenticating,
    Authenticated,
}

/// Process-wide authentication state.
///
/// `Authenticated` always carries both `user` and `credential`; the other
/// states carry neither. Use the constructors rather than building the struct
/// by hand.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub credential: Option<Credential>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            user: None,
            credential: None,
        }
    }

    pub fn authenticated(user: UserProfile, credential: impl Into<Credential>) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
            credential: Some(credential.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Who the current credential belongs to.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Identity {
    /// Field-by-field merge: values already present win, gaps are filled from
    /// `fallback`.
    pub fn or(self, fallback: Identity) -> Identity {
        Identity {
            user_id: self.user_id.or(fallback.user_id),
            email: self.email.or(fallback.email),
            role: self.role.or(fallback.role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("eyJhbGciOi.secret.sig");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
    }

    #[test]
    fn identity_merge_prefers_primary_per_field() {
        let decoded = Identity {
            user_id: Some("u1".into()),
            email: None,
            role: Some("admin".into()),
        };
        let cached = Identity {
            user_id: Some("stale".into()),
            email: Some("a@b.c".into()),
            role: Some("user".into()),
        };

        let merged = decoded.or(cached);
        assert_eq!(merged.user_id.as_deref(), Some("u1"));
        assert_eq!(merged.email.as_deref(), Some("a@b.c"));
        assert_eq!(merged.role.as_deref(), Some("admin"));
    }
}
