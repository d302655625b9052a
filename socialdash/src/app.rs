use anyhow::Result;
use socialdash_api::endpoints::auth::{LoginUser, UserProfile};
use socialdash_auth::{AuthContext, Navigator, Outcome, SessionStatus, Settings};
use std::sync::Arc;

use crate::analytics::AnalyticsStore;
use crate::dashboard::DashboardStore;
use crate::live::{LifecycleHooks, LiveUpdateChannel, PushConnector, Subscription, WebSocketConnector};
use crate::logging::init_logging;
use crate::posts::PostCollectionManager;

/// The client core, wired once: session, stores, and the live channel all
/// share one token store and one request pipeline.
#[derive(Clone)]
pub struct SocialDash {
    pub auth: AuthContext,
    pub posts: PostCollectionManager,
    pub dashboard: DashboardStore,
    pub analytics: AnalyticsStore,
    pub live: LiveUpdateChannel,
    pub settings: Settings,
}

impl SocialDash {
    pub fn new(auth: AuthContext, connector: Arc<dyn PushConnector>, settings: Settings) -> Self {
        let live = LiveUpdateChannel::new(
            connector,
            auth.store.clone(),
            settings.socket_url(),
            settings.reconnect.clone(),
        );

        Self {
            posts: PostCollectionManager::new(auth.pipeline.clone()),
            dashboard: DashboardStore::new(auth.pipeline.clone()),
            analytics: AnalyticsStore::new(auth.pipeline.clone()),
            live,
            auth,
            settings,
        }
    }

    /// HTTP, file storage and websocket wired from `settings`.
    pub fn from_settings(settings: Settings, navigator: Arc<dyn Navigator>) -> Result<Self> {
        settings.validate().map_err(anyhow::Error::msg)?;
        let auth = AuthContext::from_settings(&settings, navigator)?;
        Ok(Self::new(auth, Arc::new(WebSocketConnector::new()), settings))
    }

    /// Loads settings from file and environment, then restores any cached
    /// session.
    pub async fn start(navigator: Arc<dyn Navigator>) -> Result<Self> {
        let app = Self::from_settings(Settings::new()?, navigator)?;
        let status = app.auth.manager.initialize().await;
        tracing::info!("Session restored as {:?}", status);
        Ok(app)
    }

    pub fn status(&self) -> SessionStatus {
        self.auth.session.status()
    }

    pub async fn login(&self, credentials: LoginUser) -> Outcome<UserProfile> {
        self.auth.manager.login(credentials).await
    }

    /// Drops the push connection before the session goes.
    pub async fn logout(&self) {
        self.live.disconnect();
        self.auth.manager.logout().await;
    }

    /// Routes live engagement pushes into the dashboard and opens the channel.
    pub fn go_live(&self, hooks: LifecycleHooks) -> Subscription {
        let subscription = self.dashboard.attach(&self.live);
        self.live.connect(hooks);
        subscription
    }

    /// Headless run: restore, load the overview, follow live updates until
    /// interrupted.
    pub async fn run(&self) -> Result<()> {
        if self.status() != SessionStatus::Authenticated {
            anyhow::bail!("No cached session; log in first");
        }

        if let Err(e) = self.dashboard.load_overview().await {
            tracing::warn!("Dashboard overview unavailable: {}", e);
        }

        let _updates = self.go_live(
            LifecycleHooks::new()
                .on_open(|| tracing::info!("Live updates connected"))
                .on_close(|reason| tracing::info!("Live updates closed: {}", reason))
                .on_error(|e| tracing::error!("Live updates gave up: {}", e)),
        );

        tokio::signal::ctrl_c().await?;
        tracing::info!("Interrupted, shutting down");
        self.live.disconnect();
        Ok(())
    }
}

/// Binary entry point: logging first, then [`SocialDash::start`].
pub async fn run_headless(navigator: Arc<dyn Navigator>) -> Result<()> {
    let log_path = init_logging()?;
    tracing::info!("socialdash starting, logging to {}", log_path.display());

    SocialDash::start(navigator).await?.run().await
}
