use super::escalation::is_auth_surface;
use super::outcome::{ActionError, Outcome};
use super::pipeline::RequestPipeline;
use super::refresh::RefreshCoordinator;
use super::token_inspector::is_live;
use super::token_storage::TokenStore;
use crate::common::{Credential, Session, SessionStatus};
use socialdash_api::endpoints::auth::{AuthPayload, LoginUser, RegisterUser, UserProfile};
use socialdash_api::{Request, StatusCode};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTRATION_FAILED: &str = "Registration failed";
pub const TOKEN_REFRESH_FAILED: &str = "Token refresh failed";
pub const NO_USER_ID: &str = "No user ID available";

/// Shared, observable session state. Cloning yields another handle onto the
/// same state; only this crate writes to it.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.tx.borrow().status
    }

    /// Receiver that observes every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub(crate) fn replace(&self, session: Session) {
        self.tx.send_replace(session);
    }

    pub(crate) fn modify<F: FnOnce(&mut Session)>(&self, apply: F) {
        self.tx.send_modify(apply);
    }

    pub(crate) fn clear(&self) {
        self.replace(Session::unauthenticated());
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the session lifecycle: restore at start-up, login, registration,
/// logout and explicit refresh.
pub struct SessionManager {
    pipeline: Arc<RequestPipeline>,
    refresher: Arc<RefreshCoordinator>,
    store: TokenStore,
    session: SessionHandle,
}

impl SessionManager {
    pub fn new(
        pipeline: Arc<RequestPipeline>,
        refresher: Arc<RefreshCoordinator>,
        store: TokenStore,
        session: SessionHandle,
    ) -> Self {
        Self {
            pipeline,
            refresher,
            store,
            session,
        }
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.session
    }

    /// Restores a cached session. Ends `Authenticated` with a live
    /// credential or `Unauthenticated` with storage cleared.
    pub async fn initialize(&self) -> SessionStatus {
        self.session.replace(Session::authenticating());

        let (token, user) = (self.store.access_token(), self.store.user_profile());
        let (Some(token), Some(user)) = (token, user) else {
            debug!("No cached session");
            self.session.clear();
            return SessionStatus::Unauthenticated;
        };

        if is_live(&token) {
            info!("Restored session for {}", user.email);
            self.session.replace(Session::authenticated(user, token));
            return SessionStatus::Authenticated;
        }

        info!("Cached credential expired, refreshing");
        match self.refresh_access_token().await {
            Ok(token) => {
                self.session.replace(Session::authenticated(user, token));
                SessionStatus::Authenticated
            }
            Err(e) => {
                warn!("Could not restore session: {}", e);
                self.store.clear_all();
                self.session.clear();
                SessionStatus::Unauthenticated
            }
        }
    }

    pub async fn login(&self, credentials: LoginUser) -> Outcome<UserProfile> {
        let reply = self
            .pipeline
            .send(&credentials)
            .await
            .map_err(|e| ActionError::from_credential_failure(&e, LOGIN_FAILED))?;
        let payload = reply.accept(StatusCode::OK, LOGIN_FAILED)?;
        Ok(self.establish(payload))
    }

    pub async fn register(&self, fields: RegisterUser) -> Outcome<UserProfile> {
        let reply = self
            .pipeline
            .send(&fields)
            .await
            .map_err(|e| ActionError::from_credential_failure(&e, REGISTRATION_FAILED))?;
        let payload = reply.accept(StatusCode::CREATED, REGISTRATION_FAILED)?;
        Ok(self.establish(payload))
    }

    fn establish(&self, payload: AuthPayload) -> UserProfile {
        let AuthPayload { user, access_token } = payload;
        if !self.store.persist_login(&user, &access_token) {
            warn!("Session established but could not be persisted");
        }
        info!("Authenticated as {}", user.email);
        self.session
            .replace(Session::authenticated(user.clone(), access_token));
        user
    }

    /// Remote invalidation is best effort; local state is always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.pipeline.send_best_effort(&Request::auth().logout()).await {
            debug!("Remote logout failed, clearing locally anyway: {}", e);
        }
        self.store.clear_all();
        self.session.clear();
        info!("Logged out");
    }

    /// Any failure logs the user out.
    pub async fn refresh_access_token(&self) -> Outcome<String> {
        if self.store.user_id().is_none() {
            return Err(ActionError::generic(NO_USER_ID));
        }

        match self.refresher.refresh().await {
            Ok(token) => {
                self.session.modify(|session| {
                    if session.is_authenticated() {
                        session.credential = Some(Credential::new(token.clone()));
                    }
                });
                Ok(token)
            }
            Err(e) => {
                error!("Token refresh failed: {}", e);
                self.logout().await;
                Err(ActionError::generic(
                    e.description().unwrap_or(TOKEN_REFRESH_FAILED),
                ))
            }
        }
    }

    /// Whether a loading indicator should cover `location`.
    pub fn shows_loading(&self, location: &str) -> bool {
        self.session.status() == SessionStatus::Authenticating && !is_auth_surface(location)
    }
}
