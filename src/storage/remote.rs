use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::{RemoteStore, StorageError, StorageResult, UserId};

const DOCUMENT_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// One `<user>.json` document per user under a shared directory, e.g. a
/// synced profile mount. Reachable while the directory exists.
#[derive(Debug, Clone)]
pub struct DirectoryRemoteStore {
    root: PathBuf,
}

impl DirectoryRemoteStore {
    pub const fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Write {
            path: root.clone(),
            source,
        })?;
        Ok(Self::with_root(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, user: &UserId) -> PathBuf {
        let mut path = self.root.clone();
        path.push(format!("{}.{DOCUMENT_EXTENSION}", user.as_str()));
        path
    }
}

impl RemoteStore for DirectoryRemoteStore {
    fn get(&self, user: &UserId) -> StorageResult<Option<Value>> {
        let path = self.document_path(user);
        let serialized = match fs::read_to_string(&path) {
            Ok(serialized) => serialized,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        Ok(Some(serde_json::from_str(&serialized)?))
    }

    /// Same temp-then-rename as the local cache, so readers never see a torn document.
    fn put(&self, user: &UserId, document: &Value) -> StorageResult<()> {
        let path = self.document_path(user);
        let serialized = serde_json::to_string_pretty(document)?;
        let temp_path = path.with_extension(TEMP_EXTENSION);
        let write_error = |source| StorageError::Write {
            path: path.clone(),
            source,
        };

        fs::write(&temp_path, serialized).map_err(write_error)?;
        fs::rename(&temp_path, &path).map_err(write_error)
    }

    fn is_reachable(&self) -> bool {
        self.root.is_dir()
    }
}

/// In-process store. Clones share documents and reachability.
#[derive(Debug, Clone)]
pub struct MemoryRemoteStore {
    documents: Arc<Mutex<HashMap<UserId, Value>>>,
    reachable: Arc<AtomicBool>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self {
            documents: Arc::default(),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MemoryRemoteStore {
    pub fn insert(&self, user: UserId, document: Value) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, document);
    }

    pub fn document(&self, user: &UserId) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn get(&self, user: &UserId) -> StorageResult<Option<Value>> {
        if !self.is_reachable() {
            return Err(StorageError::Unreachable);
        }
        Ok(self.document(user))
    }

    fn put(&self, user: &UserId, document: &Value) -> StorageResult<()> {
        if !self.is_reachable() {
            return Err(StorageError::Unreachable);
        }
        self.insert(user.clone(), document.clone());
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
