use super::token_storage::TokenStore;
use super::SessionHandle;
use socialdash_api::ApiError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Locations where a missing session is expected.
pub fn is_auth_surface(location: &str) -> bool {
    location == LOGIN_PATH || location == REGISTER_PATH
}

/// The host application's view layer: where the user is, how to tell them
/// something and how to send them to the login surface.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> String;

    fn notify(&self, message: &str);

    fn redirect_to_login(&self);
}

/// Headless [`Navigator`] that records what it was asked to do.
pub struct RouteTracker {
    location: Mutex<String>,
    notices: Mutex<Vec<String>>,
    redirects: AtomicUsize,
}

impl RouteTracker {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
            notices: Mutex::new(Vec::new()),
            redirects: AtomicUsize::new(0),
        }
    }

    pub fn navigate(&self, location: impl Into<String>) {
        if let Ok(mut current) = self.location.lock() {
            *current = location.into();
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteTracker {
    fn current_location(&self) -> String {
        self.location
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    fn notify(&self, message: &str) {
        info!("Notice: {}", message);
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(message.to_string());
        }
    }

    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        self.navigate(LOGIN_PATH);
    }
}

/// Ends the session after an unrecoverable auth failure: one notice, local
/// state wiped, then a delayed trip to the login surface. Concurrent
/// failures collapse into a single escalation.
pub struct Escalation {
    store: TokenStore,
    session: SessionHandle,
    navigator: Arc<dyn Navigator>,
    redirect_delay: Duration,
    redirecting: Arc<AtomicBool>,
}

impl Escalation {
    pub fn new(
        store: TokenStore,
        session: SessionHandle,
        navigator: Arc<dyn Navigator>,
        redirect_delay: Duration,
    ) -> Self {
        Self {
            store,
            session,
            navigator,
            redirect_delay,
            redirecting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_redirecting(&self) -> bool {
        self.redirecting.load(Ordering::SeqCst)
    }

    /// Returns `true` if this call performed the escalation. Must be called
    /// from within a Tokio runtime.
    pub fn escalate(&self, error: &ApiError) -> bool {
        let location = self.navigator.current_location();
        if is_auth_surface(&location) {
            debug!("Auth failure on {}, not escalating", location);
            return false;
        }
        if self.redirecting.swap(true, Ordering::SeqCst) {
            debug!("Escalation already in progress");
            return false;
        }

        let message = error.description().unwrap_or(SESSION_EXPIRED_MESSAGE);
        warn!("Session ended by auth failure: {}", error);
        self.navigator.notify(message);

        self.store.clear_all();
        self.session.clear();

        let navigator = Arc::clone(&self.navigator);
        let redirecting = Arc::clone(&self.redirecting);
        let delay = self.redirect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if navigator.current_location() != LOGIN_PATH {
                navigator.redirect_to_login();
            }
            redirecting.store(false, Ordering::SeqCst);
        });

        true
    }
}
