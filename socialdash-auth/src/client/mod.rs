pub mod classifier;
mod config;
pub mod escalation;
pub mod outcome;
mod pipeline;
mod refresh;
mod session;
pub mod token_inspector;
pub mod token_storage;

pub use classifier::AuthErrorClassifier;
pub use self::config::{ReconnectSettings, Settings};
pub use escalation::{Escalation, Navigator, RouteTracker};
pub use pipeline::{Reply, RequestPipeline, RetryToken};
pub use refresh::RefreshCoordinator;
pub use session::{SessionHandle, SessionManager};
pub use token_inspector::TokenInspector;
pub use token_storage::{FileStorage, MemoryStorage, StorageBackend, TokenStore};

use crate::error::AuthError;
use socialdash_api::{ReqwestTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything the application layer needs, wired once.
#[derive(Clone)]
pub struct AuthContext {
    pub store: TokenStore,
    pub inspector: TokenInspector,
    pub session: SessionHandle,
    pub pipeline: Arc<RequestPipeline>,
    pub manager: Arc<SessionManager>,
    pub escalation: Arc<Escalation>,
}

impl AuthContext {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
        redirect_delay: Duration,
    ) -> Self {
        let session = SessionHandle::new();
        let refresher = Arc::new(RefreshCoordinator::new(transport.clone(), store.clone()));
        let escalation = Arc::new(Escalation::new(
            store.clone(),
            session.clone(),
            navigator,
            redirect_delay,
        ));
        let pipeline = Arc::new(RequestPipeline::new(
            transport,
            store.clone(),
            refresher.clone(),
            escalation.clone(),
        ));
        let manager = Arc::new(SessionManager::new(
            pipeline.clone(),
            refresher,
            store.clone(),
            session.clone(),
        ));

        Self {
            inspector: TokenInspector::new(store.clone()),
            store,
            session,
            pipeline,
            manager,
            escalation,
        }
    }

    /// HTTP transport and on-disk storage as described by `settings`.
    pub fn from_settings(settings: &Settings, navigator: Arc<dyn Navigator>) -> Result<Self, AuthError> {
        let transport = ReqwestTransport::new(&settings.api_base_url, settings.request_timeout())?;
        let storage_path = match &settings.storage_path {
            Some(path) => path.clone(),
            None => FileStorage::default_path()?,
        };
        let store = TokenStore::file(storage_path)?;

        Ok(Self::new(
            Arc::new(transport),
            store,
            navigator,
            settings.redirect_delay(),
        ))
    }
}

/// Loads settings, wires the client, and restores any cached session.
pub async fn bootstrap(navigator: Arc<dyn Navigator>) -> Result<(AuthContext, Settings), AuthError> {
    let settings = Settings::new()?;
    settings.validate().map_err(AuthError::Configuration)?;

    let context = AuthContext::from_settings(&settings, navigator)?;
    let status = context.manager.initialize().await;
    info!("Session restored as {:?}", status);

    Ok((context, settings))
}
