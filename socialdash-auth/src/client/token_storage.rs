use crate::error::AuthError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use socialdash_api::endpoints::auth::UserProfile;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const USER_DATA: &str = "user_data";
pub const USER_ID: &str = "user_id";
pub const USER_EMAIL: &str = "user_email";
pub const USER_ROLE: &str = "user_role";

/// Every key that belongs to a session. Cleared together on logout.
pub const SESSION_KEYS: [&str; 6] = [
    ACCESS_TOKEN,
    REFRESH_TOKEN,
    USER_DATA,
    USER_ID,
    USER_EMAIL,
    USER_ROLE,
];

/// Raw string key/value persistence.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError>;

    fn set_items(&self, items: &[(&str, String)]) -> Result<(), AuthError> {
        for (key, value) in items {
            self.set_item(key, value)?;
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError>;

    fn remove_items(&self, keys: &[&str]) -> Result<(), AuthError> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }
}

/// In-process storage. `set_unavailable(true)` makes every call fail, which
/// is how a full or disabled store behaves.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AuthError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::TokenStorage("storage unavailable".to_string()));
        }
        Ok(())
    }

    fn poisoned() -> AuthError {
        AuthError::TokenStorage("storage lock poisoned".to_string())
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.check()?;
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_items(&self, batch: &[(&str, String)]) -> Result<(), AuthError> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        for (key, value) in batch {
            items.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.remove(key);
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), AuthError> {
        self.check()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}

/// A single JSON object on disk, readable by the owner only.
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AuthError::TokenStorage(format!("Failed to create storage directory: {}", e))
                })?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// `<cache_dir>/socialdash/session.json`
    pub fn default_path() -> Result<PathBuf, AuthError> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| {
            AuthError::TokenStorage("No cache directory on this platform".to_string())
        })?;
        Ok(cache_dir.join("socialdash").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, AuthError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::TokenStorage(format!("Failed to read storage: {}", e)))?;
        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }

        Ok(serde_json::from_str(&json)?)
    }

    fn write_all(&self, items: &HashMap<String, String>) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(items)?;

        fs::write(&self.path, json)
            .map_err(|e| AuthError::TokenStorage(format!("Failed to write storage: {}", e)))?;

        // Set permissions to 0600 (read/write for owner only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path)
                .map_err(|e| {
                    AuthError::TokenStorage(format!("Failed to get file permissions: {}", e))
                })?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(|e| {
                AuthError::TokenStorage(format!("Failed to set file permissions: {}", e))
            })?;
        }

        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), AuthError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuthError::TokenStorage("storage lock poisoned".to_string()))?;
        let mut items = self.read_all()?;
        apply(&mut items);
        self.write_all(&items)
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn set_items(&self, batch: &[(&str, String)]) -> Result<(), AuthError> {
        self.update(|items| {
            for (key, value) in batch {
                items.insert((*key).to_string(), value.clone());
            }
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), AuthError> {
        self.update(|items| {
            for key in keys {
                items.remove(*key);
            }
        })
    }
}

/// Typed access to session values.
///
/// Values are stored as JSON when they serialize to anything but a plain
/// string. Reads fall back to the raw text when it isn't JSON. Backend
/// failures are logged and reported as absent/`false`, never raised.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn StorageBackend>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(FileStorage::new(path)?)))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self.backend.get_item(key) {
            Ok(Some(raw)) => {
                Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read {} from storage: {}", key, e);
                None
            }
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Null => None,
            Value::String(value) => Some(value),
            other => Some(other.to_string()),
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!("Stored {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn set<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> bool {
        let Some(encoded) = encode(key, value) else {
            return false;
        };
        match self.backend.set_item(key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {} to storage: {}", key, e);
                false
            }
        }
    }

    /// Writes several keys in one backend call.
    pub fn set_many(&self, items: &[(&str, Value)]) -> bool {
        let mut encoded = Vec::with_capacity(items.len());
        for (key, value) in items {
            match encode(key, value) {
                Some(raw) => encoded.push((*key, raw)),
                None => return false,
            }
        }
        match self.backend.set_items(&encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write session batch to storage: {}", e);
                false
            }
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove {} from storage: {}", key, e);
                false
            }
        }
    }

    /// Removes every session key in one backend call.
    pub fn clear_all(&self) -> bool {
        match self.backend.remove_items(&SESSION_KEYS) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear session from storage: {}", e);
                false
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get_string(ACCESS_TOKEN).filter(|token| !token.is_empty())
    }

    pub fn set_access_token(&self, token: &str) -> bool {
        self.set(ACCESS_TOKEN, token)
    }

    pub fn user_id(&self) -> Option<String> {
        self.get_string(USER_ID).filter(|id| !id.is_empty())
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.get_as(USER_DATA)
    }

    /// Persists everything a fresh login produces.
    pub fn persist_login(&self, user: &UserProfile, token: &str) -> bool {
        let profile = match serde_json::to_value(user) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Failed to encode user profile: {}", e);
                return false;
            }
        };
        self.set_many(&[
            (ACCESS_TOKEN, Value::String(token.to_string())),
            (USER_DATA, profile),
            (USER_ID, Value::String(user.id.clone())),
            (USER_EMAIL, Value::String(user.email.clone())),
            (USER_ROLE, Value::String(user.role.clone())),
        ])
    }
}

fn encode<V: Serialize + ?Sized>(key: &str, value: &V) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(Value::String(raw)) => Some(raw),
        Ok(other) => Some(other.to_string()),
        Err(e) => {
            warn!("Failed to encode {} for storage: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            email: "ana@example.com".into(),
            name: "Ana".into(),
            role: "user".into(),
        }
    }

    #[test]
    fn strings_are_stored_verbatim() {
        let backend = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(backend.clone());

        assert!(store.set_access_token("abc.def.ghi"));
        assert_eq!(
            backend.get_item(ACCESS_TOKEN).unwrap().as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(store.access_token().as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn structured_values_round_trip_through_json() {
        let store = TokenStore::in_memory();
        assert!(store.set(USER_DATA, &profile()));
        assert_eq!(store.user_profile(), Some(profile()));
    }

    #[test]
    fn non_json_raw_values_read_back_as_strings() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set_item(USER_ID, "{not json").unwrap();
        let store = TokenStore::new(backend);
        assert_eq!(store.user_id().as_deref(), Some("{not json"));
    }

    #[test]
    fn numeric_user_id_reads_back_as_string() {
        let store = TokenStore::in_memory();
        store.set(USER_ID, &42);
        assert_eq!(store.user_id().as_deref(), Some("42"));
    }

    #[test]
    fn unavailable_backend_degrades_to_absent() {
        let backend = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(backend.clone());
        store.set_access_token("token");

        backend.set_unavailable(true);
        assert_eq!(store.access_token(), None);
        assert!(!store.set_access_token("other"));
        assert!(!store.clear_all());

        backend.set_unavailable(false);
        assert_eq!(store.access_token().as_deref(), Some("token"));
    }

    #[test]
    fn clear_all_removes_every_session_key() {
        let store = TokenStore::in_memory();
        store.persist_login(&profile(), "token");
        store.set(REFRESH_TOKEN, "refresh");

        assert!(store.clear_all());
        for key in SESSION_KEYS {
            assert_eq!(store.get(key), None, "{} should be cleared", key);
        }
    }

    /// Counts backend calls on top of [`MemoryStorage`].
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        removals: std::sync::atomic::AtomicUsize,
        batch_removals: std::sync::atomic::AtomicUsize,
    }

    impl StorageBackend for CountingStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), AuthError> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_item(key)
        }

        fn remove_items(&self, keys: &[&str]) -> Result<(), AuthError> {
            self.batch_removals.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_items(keys)
        }
    }

    #[test]
    fn clear_all_is_a_single_backend_call() {
        let backend = Arc::new(CountingStorage::default());
        let store = TokenStore::new(backend.clone());
        store.persist_login(&profile(), "token");

        assert!(store.clear_all());

        assert_eq!(backend.batch_removals.load(Ordering::SeqCst), 1);
        assert_eq!(backend.removals.load(Ordering::SeqCst), 0);
        assert_eq!(store.access_token(), None);
        assert_eq!(store.user_profile(), None);
    }

    #[test]
    fn file_storage_clears_session_keys_only() {
        let dir = std::env::temp_dir().join(format!("socialdash-clear-{}", uuid::Uuid::new_v4()));
        let path = dir.join("session.json");
        let store = TokenStore::file(&path).unwrap();
        store.persist_login(&profile(), "token");
        store.set("theme", "dark");

        assert!(store.clear_all());

        let reopened = TokenStore::file(&path).unwrap();
        for key in SESSION_KEYS {
            assert_eq!(reopened.get(key), None, "{} should be cleared", key);
        }
        assert_eq!(reopened.get_string("theme").as_deref(), Some("dark"));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn file_storage_persists_between_instances() {
        let dir = std::env::temp_dir().join(format!("socialdash-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("session.json");

        let store = TokenStore::file(&path).unwrap();
        store.persist_login(&profile(), "token");

        let reopened = TokenStore::file(&path).unwrap();
        assert_eq!(reopened.access_token().as_deref(), Some("token"));
        assert_eq!(reopened.user_profile(), Some(profile()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        fs::remove_dir_all(dir).ok();
    }
}
