mod websocket;

pub use websocket::WebSocketConnector;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use socialdash_auth::token_inspector::is_live;
use socialdash_auth::{ReconnectSettings, TokenStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiveError {
    #[error("No access token found")]
    NoCredential,

    #[error("Connection failed: {0}")]
    Connect(String),
}

/// One named push event. On the wire: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl LiveEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// An open push connection. `incoming` ends when the remote side closes;
/// dropping `outgoing` closes the connection from this side.
pub struct PushLink {
    pub outgoing: mpsc::UnboundedSender<LiveEvent>,
    pub incoming: mpsc::UnboundedReceiver<LiveEvent>,
}

/// Opens push connections authenticated with a bearer credential.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, url: &str, token: &str) -> Result<PushLink, LiveError>;
}

type OpenHook = Box<dyn Fn() + Send + Sync>;
type CloseHook = Box<dyn Fn(&str) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&LiveError) + Send + Sync>;

/// Connection lifecycle callbacks.
#[derive(Default)]
pub struct LifecycleHooks {
    on_open: Option<OpenHook>,
    on_close: Option<CloseHook>,
    on_error: Option<ErrorHook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&LiveError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    fn opened(&self) {
        if let Some(hook) = &self.on_open {
            hook();
        }
    }

    fn closed(&self, reason: &str) {
        if let Some(hook) = &self.on_close {
            hook(reason);
        }
    }

    fn failed(&self, error: &LiveError) {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
    }
}

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;
type Registry = Mutex<HashMap<String, Vec<(u64, Handler)>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a registered event handler. Dropping it unregisters the
/// handler unless [`Subscription::detach`] was called.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    id: u64,
    event: String,
    registry: Weak<Registry>,
    detached: bool,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn unsubscribe(self) {}

    /// Keeps the handler registered for the channel's lifetime.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let mut handlers = lock(&registry);
            if let Some(list) = handlers.get_mut(&self.event) {
                list.retain(|(id, _)| *id != self.id);
                if list.is_empty() {
                    handlers.remove(&self.event);
                }
            }
        }
    }
}

struct Connection {
    outgoing: Option<mpsc::UnboundedSender<LiveEvent>>,
    supervisor: Option<JoinHandle<()>>,
}

struct Shared {
    connector: Arc<dyn PushConnector>,
    store: TokenStore,
    url: String,
    reconnect: ReconnectSettings,
    connected: AtomicBool,
    connection: Mutex<Connection>,
    handlers: Arc<Registry>,
    next_id: AtomicU64,
}

/// Persistent push subscription with reconnect and named-event fan-out.
///
/// Handlers live independently of the connection, so they survive
/// reconnects and may be registered before `connect`.
#[derive(Clone)]
pub struct LiveUpdateChannel {
    shared: Arc<Shared>,
}

impl LiveUpdateChannel {
    pub fn new(
        connector: Arc<dyn PushConnector>,
        store: TokenStore,
        url: impl Into<String>,
        reconnect: ReconnectSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                store,
                url: url.into(),
                reconnect,
                connected: AtomicBool::new(false),
                connection: Mutex::new(Connection {
                    outgoing: None,
                    supervisor: None,
                }),
                handlers: Arc::new(Mutex::new(HashMap::new())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Starts the connection in the background. Already connected: `on_open`
    /// fires again and nothing else happens. A connection attempt already
    /// running: no-op. No live credential: `on_error` fires immediately.
    pub fn connect(&self, hooks: LifecycleHooks) {
        if self.is_connected() {
            hooks.opened();
            return;
        }

        let mut connection = lock(&self.shared.connection);
        if connection
            .supervisor
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            debug!("Live channel already connecting");
            return;
        }

        if !self.shared.store.access_token().is_some_and(|t| is_live(&t)) {
            drop(connection);
            warn!("Live channel needs a live credential");
            hooks.failed(&LiveError::NoCredential);
            return;
        }

        let shared = Arc::clone(&self.shared);
        connection.supervisor = Some(tokio::spawn(supervise(shared, hooks)));
    }

    pub fn disconnect(&self) {
        let mut connection = lock(&self.shared.connection);
        if let Some(task) = connection.supervisor.take() {
            task.abort();
        }
        connection.outgoing = None;
        self.shared.connected.store(false, Ordering::SeqCst);
        info!("Live channel disconnected");
    }

    /// Reflects the transport, not whether `connect` was called.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn on<F>(&self, event: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.handlers)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            event: event.to_string(),
            registry: Arc::downgrade(&self.shared.handlers),
            detached: false,
        }
    }

    /// Like [`LiveUpdateChannel::on`] with the payload deserialised first.
    /// Payloads that don't fit `T` are skipped.
    pub fn on_typed<T, F>(&self, event: &str, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = event.to_string();
        self.on(event, move |data| match serde_json::from_value::<T>(data.clone()) {
            Ok(payload) => handler(payload),
            Err(e) => debug!("Skipping malformed {} payload: {}", name, e),
        })
    }

    /// Removes every handler for `event`. Outstanding subscriptions for it
    /// become inert.
    pub fn off(&self, event: &str) {
        lock(&self.shared.handlers).remove(event);
    }

    pub fn handler_count(&self, event: &str) -> usize {
        lock(&self.shared.handlers)
            .get(event)
            .map_or(0, |list| list.len())
    }

    /// Returns `false` without sending when not connected.
    pub fn emit(&self, event: &str, data: Value) -> bool {
        if !self.is_connected() {
            return false;
        }
        let connection = lock(&self.shared.connection);
        match &connection.outgoing {
            Some(outgoing) => outgoing.send(LiveEvent::new(event, data)).is_ok(),
            None => false,
        }
    }
}

impl Shared {
    fn dispatch(&self, event: &LiveEvent) {
        let handlers: Vec<Handler> = lock(&self.handlers)
            .get(&event.event)
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("No handlers for {}", event.event);
        }
        for handler in handlers {
            handler(&event.data);
        }
    }

    /// `delay * 2^(attempt - 1)`, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.reconnect.delay();
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor).min(self.reconnect.delay_max())
    }

    fn set_outgoing(&self, outgoing: Option<mpsc::UnboundedSender<LiveEvent>>) {
        lock(&self.connection).outgoing = outgoing;
    }
}

/// Connects, pumps events, and reconnects until attempts run out.
async fn supervise(shared: Arc<Shared>, hooks: LifecycleHooks) {
    let mut failures: u32 = 0;

    loop {
        // Read fresh each attempt; the credential may have been refreshed
        let Some(token) = shared.store.access_token() else {
            hooks.failed(&LiveError::NoCredential);
            break;
        };

        match shared.connector.connect(&shared.url, &token).await {
            Ok(PushLink {
                outgoing,
                mut incoming,
            }) => {
                failures = 0;
                shared.set_outgoing(Some(outgoing));
                shared.connected.store(true, Ordering::SeqCst);
                info!("Live channel connected");
                hooks.opened();

                while let Some(event) = incoming.recv().await {
                    shared.dispatch(&event);
                }

                shared.connected.store(false, Ordering::SeqCst);
                shared.set_outgoing(None);
                info!("Live channel closed by remote");
                hooks.closed("transport close");
            }
            Err(e) => {
                failures += 1;
                warn!(
                    "Live channel attempt {}/{} failed: {}",
                    failures, shared.reconnect.max_attempts, e
                );
                if failures >= shared.reconnect.max_attempts {
                    hooks.failed(&e);
                    break;
                }
            }
        }

        tokio::time::sleep(shared.backoff(failures.max(1))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPushConnector;
    use serde_json::json;
    use socialdash_auth::testing::{expired_token, live_token};
    use std::sync::atomic::AtomicUsize;

    fn settings() -> ReconnectSettings {
        ReconnectSettings::default()
    }

    fn channel_with(token: Option<String>) -> (LiveUpdateChannel, Arc<MockPushConnector>) {
        let store = TokenStore::in_memory();
        if let Some(token) = token {
            store.set_access_token(&token);
        }
        let connector = Arc::new(MockPushConnector::new());
        let channel = LiveUpdateChannel::new(connector.clone(), store, "wss://example.test/ws", settings());
        (channel, connector)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let (channel, _) = channel_with(None);
        let shared = &channel.shared;
        assert_eq!(shared.backoff(1), Duration::from_secs(1));
        assert_eq!(shared.backoff(2), Duration::from_secs(2));
        assert_eq!(shared.backoff(3), Duration::from_secs(4));
        assert_eq!(shared.backoff(4), Duration::from_secs(5));
        assert_eq!(shared.backoff(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn connect_without_live_credential_fails_immediately() {
        for token in [None, Some(expired_token("u1"))] {
            let (channel, connector) = channel_with(token);
            let errors = Arc::new(Mutex::new(Vec::new()));
            let sink = errors.clone();

            channel.connect(LifecycleHooks::new().on_error(move |e| sink.lock().unwrap().push(e.clone())));

            assert_eq!(*errors.lock().unwrap(), vec![LiveError::NoCredential]);
            assert_eq!(connector.attempts(), 0);
            assert!(!channel.is_connected());
        }
    }

    #[test]
    fn handlers_unregister_on_drop() {
        let (channel, _) = channel_with(None);
        let first = channel.on("metric", |_| {});
        let second = channel.on("metric", |_| {});
        assert_eq!(channel.handler_count("metric"), 2);

        drop(first);
        assert_eq!(channel.handler_count("metric"), 1);
        second.unsubscribe();
        assert_eq!(channel.handler_count("metric"), 0);

        channel.on("metric", |_| {}).detach();
        assert_eq!(channel.handler_count("metric"), 1);
    }

    #[test]
    fn off_removes_all_handlers_for_event() {
        let (channel, _) = channel_with(None);
        let _a = channel.on("metric", |_| {});
        let _b = channel.on("metric", |_| {});
        let _c = channel.on("other", |_| {});

        channel.off("metric");
        assert_eq!(channel.handler_count("metric"), 0);
        assert_eq!(channel.handler_count("other"), 1);
    }

    #[test]
    fn emit_is_noop_when_disconnected() {
        let (channel, _) = channel_with(Some(live_token("u1")));
        assert!(!channel.emit("ping", json!({})));
    }

    #[tokio::test(start_paused = true)]
    async fn events_reach_typed_handlers() {
        let (channel, connector) = channel_with(Some(live_token("u1")));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _sub = channel.on_typed::<serde_json::Map<String, Value>, _>("metric", move |payload| {
            if payload.contains_key("value") {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        channel.connect(LifecycleHooks::new());
        connector.wait_connected().await;
        assert!(channel.is_connected());

        assert!(connector.push("metric", json!({ "value": 3 })));
        // Not an object: skipped by the typed handler
        assert!(connector.push("metric", json!(7)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(channel.emit("subscribe", json!({ "room": "dashboard" })));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.sent(), vec![LiveEvent::new("subscribe", json!({ "room": "dashboard" }))]);
    }
}
