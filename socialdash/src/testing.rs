//! Test doubles for the application layer.

use crate::app::SocialDash;
use crate::live::{LiveError, LiveEvent, PushConnector, PushLink};
use async_trait::async_trait;
use serde_json::Value;
use socialdash_auth::testing::{context, seed_session, MockTransport};
use socialdash_auth::{RouteTracker, Settings};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// The server's end of one mock connection.
struct ServerEnd {
    to_client: mpsc::UnboundedSender<LiveEvent>,
    from_client: mpsc::UnboundedReceiver<LiveEvent>,
}

/// Scripted [`PushConnector`]. Refuses the next `n` attempts when told to,
/// records the credential each attempt carried, and lets tests push frames
/// or drop the connection.
#[derive(Default)]
pub struct MockPushConnector {
    refuse_next: AtomicU32,
    refuse_all: AtomicBool,
    attempts: AtomicUsize,
    tokens: Mutex<Vec<String>>,
    server: Mutex<Option<ServerEnd>>,
}

impl MockPushConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_next(&self, attempts: u32) {
        self.refuse_next.store(attempts, Ordering::SeqCst);
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.refuse_all.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Bearer tokens presented, in attempt order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn is_open(&self) -> bool {
        self.server
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|end| !end.to_client.is_closed())
    }

    /// Sends a frame to the client. `false` when no connection is open.
    pub fn push(&self, event: &str, data: Value) -> bool {
        match self.server.lock().unwrap().as_ref() {
            Some(end) => end.to_client.send(LiveEvent::new(event, data)).is_ok(),
            None => false,
        }
    }

    /// Frames the client emitted since the last call.
    pub fn sent(&self) -> Vec<LiveEvent> {
        let mut server = self.server.lock().unwrap();
        let mut events = Vec::new();
        if let Some(end) = server.as_mut() {
            while let Ok(event) = end.from_client.try_recv() {
                events.push(event);
            }
        }
        events
    }

    /// Closes the connection from the server side.
    pub fn drop_connection(&self) {
        self.server.lock().unwrap().take();
    }

    /// Yields until a connection is open. Pair with a paused clock.
    pub async fn wait_connected(&self) {
        while !self.is_open() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl PushConnector for MockPushConnector {
    async fn connect(&self, _url: &str, token: &str) -> Result<PushLink, LiveError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());

        if self.refuse_all.load(Ordering::SeqCst) {
            return Err(LiveError::Connect("connection refused".to_string()));
        }
        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(LiveError::Connect("connection refused".to_string()));
        }

        let (outgoing, from_client) = mpsc::unbounded_channel();
        let (to_client, incoming) = mpsc::unbounded_channel();
        *self.server.lock().unwrap() = Some(ServerEnd {
            to_client,
            from_client,
        });

        Ok(PushLink { outgoing, incoming })
    }
}

/// A [`SocialDash`] over a scripted transport and push connector.
pub struct TestDash {
    pub app: SocialDash,
    pub transport: Arc<MockTransport>,
    pub connector: Arc<MockPushConnector>,
    pub tracker: Arc<RouteTracker>,
}

impl TestDash {
    /// Default settings, in-memory storage, no session.
    pub fn new() -> Self {
        let transport = Arc::new(MockTransport::new());
        let connector = Arc::new(MockPushConnector::new());
        let (auth, tracker) = context(transport.clone(), "/dashboard");
        let app = SocialDash::new(auth, connector.clone(), Settings::default());

        Self {
            app,
            transport,
            connector,
            tracker,
        }
    }

    /// Like [`TestDash::new`] with a stored session using `token`.
    pub fn signed_in(token: &str) -> Self {
        let dash = Self::new();
        seed_session(&dash.app.auth.store, token);
        dash
    }

    pub fn assert_calls(&self, path: &str, expected: usize) {
        assert_eq!(
            self.transport.count(path),
            expected,
            "unexpected number of calls to {}",
            path
        );
    }
}

impl Default for TestDash {
    fn default() -> Self {
        Self::new()
    }
}
