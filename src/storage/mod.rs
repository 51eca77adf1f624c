//! Two-tier persistence for committed theme settings.
//!
//! The local cache is synchronous and always present. The remote per-user
//! store is optional and only consulted while a store is attached, a user
//! session exists, and the store reports itself reachable. Remote writes run
//! on a background thread and are never awaited by the caller.

mod local;
mod remote;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde_json::Value;
use thiserror::Error;

use crate::theme::ThemeSettings;
use crate::validation::{validate_settings, DefaultsResolver, ValidationErrors};

pub use local::{FileLocalCache, MemoryLocalCache};
pub use remote::{DirectoryRemoteStore, MemoryRemoteStore};

const REMOTE_WRITER_THREAD: &str = "palette-remote-write";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode or decode theme document")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Rejected(#[from] ValidationErrors),
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
    #[error("remote store unreachable")]
    Unreachable,
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Identity of the signed-in user owning a remote theme document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Ids double as file names in [`DirectoryRemoteStore`], so separators are refused.
    pub fn new(raw: impl Into<String>) -> StorageResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            return Err(StorageError::InvalidUserId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device/session scoped cache. Always available, no authentication.
pub trait LocalCache {
    fn read(&self) -> StorageResult<Option<String>>;
    fn write(&self, payload: &str) -> StorageResult<()>;
    fn clear(&self) -> StorageResult<()>;
}

/// Durable per-user document store.
pub trait RemoteStore: Send + Sync {
    fn get(&self, user: &UserId) -> StorageResult<Option<Value>>;
    fn put(&self, user: &UserId, document: &Value) -> StorageResult<()>;

    fn is_reachable(&self) -> bool {
        true
    }
}

pub struct PersistenceAdapter {
    local: Box<dyn LocalCache>,
    remote: Option<Arc<dyn RemoteStore>>,
    user: Option<UserId>,
    write_sequences: Arc<Mutex<HashMap<UserId, u64>>>,
    pending_writes: RefCell<Vec<JoinHandle<()>>>,
}

impl PersistenceAdapter {
    pub fn new(local: impl LocalCache + 'static) -> Self {
        Self {
            local: Box::new(local),
            remote: None,
            user: None,
            write_sequences: Arc::new(Mutex::new(HashMap::new())),
            pending_writes: RefCell::new(Vec::new()),
        }
    }

    /// Cache-only adapter backed by memory, for sessions without a writable disk.
    pub fn ephemeral() -> Self {
        Self::new(MemoryLocalCache::default())
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Called by the connection bootstrap once a backend is known to exist.
    pub fn attach_remote(&mut self, remote: Arc<dyn RemoteStore>) {
        self.remote = Some(remote);
    }

    pub fn detach_remote(&mut self) {
        self.remote = None;
    }

    /// Called by the authentication layer on sign-in (`Some`) and sign-out (`None`).
    pub fn set_user(&mut self, user: Option<UserId>) {
        tracing::debug!(user = ?user.as_ref().map(UserId::as_str), "theme persistence session changed");
        self.user = user;
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn is_remote_available(&self) -> bool {
        self.reachable_remote().is_some()
    }

    /// Write-through: local synchronously, remote in the background.
    ///
    /// The returned result reflects validation and the local write only.
    pub fn save(&self, settings: &ThemeSettings) -> StorageResult<()> {
        let document = settings.to_json();
        let normalized = validate_settings(&document, &DefaultsResolver::new())?;
        let payload = serde_json::to_string(&normalized)?;

        let local_result = self.local.write(&payload);
        if let Err(err) = &local_result {
            tracing::warn!(?err, "failed to write theme to local cache");
        }

        self.spawn_remote_write(normalized.to_json());
        local_result
    }

    /// Remote wins when reachable and valid, and is written back into the
    /// local cache. Invalid data in either tier counts as absent.
    pub fn load(&self, resolver: &DefaultsResolver) -> Option<ThemeSettings> {
        let local = self.load_local(resolver);

        let Some((remote, user)) = self.reachable_remote() else {
            return local;
        };

        match remote.get(user) {
            Ok(Some(document)) => match resolver.validate(&document) {
                Ok(settings) => {
                    if local.as_ref() != Some(&settings) {
                        tracing::debug!(user = %user, "refreshing local theme cache from remote");
                        self.write_local(&settings);
                    }
                    Some(settings)
                }
                Err(err) => {
                    tracing::warn!(%err, user = %user, "ignoring invalid remote theme document");
                    local
                }
            },
            Ok(None) => {
                if let Some(settings) = &local {
                    tracing::debug!(user = %user, "remote has no theme yet; seeding from local cache");
                    self.spawn_remote_write(settings.to_json());
                }
                local
            }
            Err(err) => {
                tracing::warn!(?err, user = %user, "failed to read remote theme; using local cache");
                local
            }
        }
    }

    pub fn clear_local(&self) -> StorageResult<()> {
        self.local.clear()
    }

    /// Join every outstanding background write.
    pub fn wait_for_remote_writes(&self) {
        let handles: Vec<_> = self.pending_writes.borrow_mut().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("remote theme writer panicked");
            }
        }
    }

    fn load_local(&self, resolver: &DefaultsResolver) -> Option<ThemeSettings> {
        let payload = match self.local.read() {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(?err, "failed to read local theme cache");
                return None;
            }
        };

        let document: Value = match serde_json::from_str(&payload) {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!(?err, "local theme cache is not valid JSON; ignoring");
                return None;
            }
        };

        resolver
            .validate(&document)
            .inspect_err(|err| tracing::warn!(%err, "ignoring invalid local theme cache"))
            .ok()
    }

    fn write_local(&self, settings: &ThemeSettings) {
        let result = serde_json::to_string(settings)
            .map_err(StorageError::from)
            .and_then(|payload| self.local.write(&payload));
        if let Err(err) = result {
            tracing::warn!(?err, "failed to refresh local theme cache");
        }
    }

    fn reachable_remote(&self) -> Option<(&Arc<dyn RemoteStore>, &UserId)> {
        let remote = self.remote.as_ref()?;
        let Some(user) = self.user.as_ref() else {
            tracing::debug!("no signed-in user; remote theme store skipped");
            return None;
        };
        if !remote.is_reachable() {
            tracing::warn!(user = %user, "remote theme store unreachable; using local cache only");
            return None;
        }
        Some((remote, user))
    }

    fn spawn_remote_write(&self, document: Value) {
        let Some((remote, user)) = self.reachable_remote() else {
            return;
        };

        let sequence = {
            let mut sequences = self
                .write_sequences
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let latest = sequences.entry(user.clone()).or_insert(0);
            *latest += 1;
            *latest
        };
        let sequences = Arc::clone(&self.write_sequences);
        let remote = Arc::clone(remote);
        let user = user.clone();

        let spawned = thread::Builder::new()
            .name(REMOTE_WRITER_THREAD.to_string())
            .spawn(move || {
                // Held across the put so an older write never lands after a newer one.
                let sequences = sequences.lock().unwrap_or_else(PoisonError::into_inner);
                if sequences.get(&user) != Some(&sequence) {
                    tracing::debug!(user = %user, sequence, "skipping superseded remote theme write");
                    return;
                }
                match remote.put(&user, &document) {
                    Ok(()) => tracing::debug!(user = %user, sequence, "remote theme saved"),
                    Err(err) => {
                        tracing::warn!(?err, user = %user, "remote theme write failed; local copy kept")
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                let mut pending = self.pending_writes.borrow_mut();
                pending.retain(|handle| !handle.is_finished());
                pending.push(handle);
            }
            Err(err) => tracing::warn!(?err, "failed to spawn remote theme writer"),
        }
    }
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("remote_attached", &self.remote.is_some())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{builtin_settings, ThemeMode};
    use serde_json::json;

    struct FailingRemote;

    impl RemoteStore for FailingRemote {
        fn get(&self, _user: &UserId) -> StorageResult<Option<Value>> {
            Err(StorageError::Unreachable)
        }

        fn put(&self, _user: &UserId, _document: &Value) -> StorageResult<()> {
            Err(StorageError::Unreachable)
        }
    }

    fn user() -> UserId {
        UserId::new("user-42").unwrap()
    }

    fn dark_settings() -> ThemeSettings {
        ThemeSettings {
            mode: ThemeMode::Dark,
            background_opacity: 0.8,
            ..builtin_settings()
        }
    }

    #[test]
    fn user_id_rejects_empty_and_path_like_values() {
        assert!(UserId::new("  ").is_err());
        assert!(UserId::new("../etc").is_err());
        assert!(UserId::new("..").is_err());
        assert_eq!(UserId::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn save_then_load_uses_local_cache_without_remote() {
        let cache = MemoryLocalCache::default();
        let adapter = PersistenceAdapter::new(cache.clone());

        adapter.save(&dark_settings()).unwrap();
        assert!(cache.contents().is_some());
        assert_eq!(
            adapter.load(&DefaultsResolver::new()),
            Some(dark_settings())
        );
    }

    #[test]
    fn load_returns_none_when_both_tiers_are_empty() {
        let adapter = PersistenceAdapter::ephemeral()
            .with_remote(Arc::new(MemoryRemoteStore::default()))
            .with_user(user());
        assert_eq!(adapter.load(&DefaultsResolver::new()), None);
    }

    #[test]
    fn remote_value_wins_and_is_written_back_to_local() {
        let cache = MemoryLocalCache::default();
        let remote = MemoryRemoteStore::default();
        remote.insert(user(), dark_settings().to_json());

        let adapter = PersistenceAdapter::new(cache.clone())
            .with_remote(Arc::new(remote))
            .with_user(user());
        cache.write(&builtin_settings().to_json().to_string()).unwrap();

        let loaded = adapter.load(&DefaultsResolver::new());
        assert_eq!(loaded, Some(dark_settings()));

        let cached: Value = serde_json::from_str(&cache.contents().unwrap()).unwrap();
        assert_eq!(cached["mode"], "dark");
    }

    #[test]
    fn remote_is_ignored_without_signed_in_user() {
        let remote = MemoryRemoteStore::default();
        remote.insert(user(), dark_settings().to_json());
        let cache = MemoryLocalCache::default();
        cache.write(&builtin_settings().to_json().to_string()).unwrap();

        let mut adapter = PersistenceAdapter::new(cache).with_remote(Arc::new(remote.clone()));
        assert!(!adapter.is_remote_available());
        assert_eq!(
            adapter.load(&DefaultsResolver::new()),
            Some(builtin_settings())
        );

        adapter.set_user(Some(user()));
        assert!(adapter.is_remote_available());
        assert_eq!(adapter.load(&DefaultsResolver::new()), Some(dark_settings()));

        remote.set_reachable(false);
        assert!(!adapter.is_remote_available());
    }

    #[test]
    fn save_writes_remote_in_background() {
        let remote = MemoryRemoteStore::default();
        let adapter = PersistenceAdapter::ephemeral()
            .with_remote(Arc::new(remote.clone()))
            .with_user(user());

        adapter.save(&dark_settings()).unwrap();
        adapter.wait_for_remote_writes();

        let stored = remote.document(&user()).expect("remote should hold a copy");
        assert_eq!(stored["mode"], "dark");
        assert_eq!(stored["backgroundOpacity"], json!(0.8));
    }

    #[test]
    fn remote_failures_do_not_fail_local_save_or_load() {
        let cache = MemoryLocalCache::default();
        let adapter = PersistenceAdapter::new(cache.clone())
            .with_remote(Arc::new(FailingRemote))
            .with_user(user());

        adapter.save(&dark_settings()).unwrap();
        adapter.wait_for_remote_writes();
        assert_eq!(
            adapter.load(&DefaultsResolver::new()),
            Some(dark_settings())
        );
    }

    #[test]
    fn invalid_local_and_remote_documents_are_treated_as_absent() {
        let cache = MemoryLocalCache::default();
        cache.write("{ not json").unwrap();
        let remote = MemoryRemoteStore::default();
        remote.insert(user(), json!({ "mode": "plaid" }));

        let adapter = PersistenceAdapter::new(cache.clone())
            .with_remote(Arc::new(remote))
            .with_user(user());
        assert_eq!(adapter.load(&DefaultsResolver::new()), None);

        cache.write(&json!({ "lightTheme": 7 }).to_string()).unwrap();
        assert_eq!(adapter.load(&DefaultsResolver::new()), None);
    }

    #[test]
    fn save_rejects_invalid_palette_without_touching_cache() {
        let cache = MemoryLocalCache::default();
        let adapter = PersistenceAdapter::new(cache.clone());
        let mut settings = builtin_settings();
        settings.light_theme.primary_color = "blue".to_string();

        let err = adapter.save(&settings).unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
        assert!(cache.contents().is_none());
    }

    #[test]
    fn switching_users_does_not_drop_the_previous_users_write() {
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();
        let remote = MemoryRemoteStore::default();
        let mut adapter = PersistenceAdapter::ephemeral()
            .with_remote(Arc::new(remote.clone()))
            .with_user(alice.clone());

        adapter.save(&dark_settings()).unwrap();
        adapter.set_user(Some(bob.clone()));
        adapter.save(&builtin_settings()).unwrap();
        adapter.wait_for_remote_writes();

        let alice_doc = remote.document(&alice).expect("alice keeps her theme");
        assert_eq!(alice_doc["mode"], "dark");
        assert_eq!(remote.document(&bob).unwrap()["mode"], "light");
    }

    #[test]
    fn latest_save_for_a_user_is_the_one_that_lands() {
        let remote = MemoryRemoteStore::default();
        let adapter = PersistenceAdapter::ephemeral()
            .with_remote(Arc::new(remote.clone()))
            .with_user(user());

        for opacity in [0.1, 0.2, 0.3, 0.4] {
            let settings = ThemeSettings {
                background_opacity: opacity,
                ..builtin_settings()
            };
            adapter.save(&settings).unwrap();
        }
        adapter.wait_for_remote_writes();

        let stored = remote.document(&user()).unwrap();
        assert_eq!(stored["backgroundOpacity"], json!(0.4));
    }

    #[test]
    fn empty_remote_is_seeded_from_local_cache() {
        let cache = MemoryLocalCache::default();
        cache.write(&dark_settings().to_json().to_string()).unwrap();
        let remote = MemoryRemoteStore::default();
        let adapter = PersistenceAdapter::new(cache)
            .with_remote(Arc::new(remote.clone()))
            .with_user(user());

        assert_eq!(adapter.load(&DefaultsResolver::new()), Some(dark_settings()));
        adapter.wait_for_remote_writes();
        assert_eq!(remote.document(&user()).unwrap()["mode"], "dark");
    }
}
