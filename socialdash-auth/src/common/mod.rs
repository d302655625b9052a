mod models;

pub use models::{Credential, Identity, Session, SessionStatus};
