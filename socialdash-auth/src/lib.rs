// Session state shared with the application layer
pub mod common;

// Client library: storage, pipeline, session lifecycle
mod client;
mod error;

pub use client::{
    bootstrap, classifier, escalation, token_inspector, token_storage, AuthContext,
    AuthErrorClassifier, Escalation, FileStorage, MemoryStorage, Navigator, ReconnectSettings,
    RefreshCoordinator, Reply, RequestPipeline, RetryToken, RouteTracker, SessionHandle,
    SessionManager, Settings, StorageBackend, TokenInspector, TokenStore,
};
pub use client::outcome::{ActionError, FailureKind, Outcome};
pub use common::{Credential, Identity, Session, SessionStatus};
pub use error::AuthError;

// Always expose testing module (downstream integration tests need it)
pub mod testing;
