use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{LocalCache, StorageError, StorageResult};

const TEMP_SUFFIX: &str = "tmp";

/// Single JSON file on disk. A missing file reads as an empty cache.
#[derive(Debug, Clone)]
pub struct FileLocalCache {
    path: PathBuf,
}

impl FileLocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCache for FileLocalCache {
    fn read(&self) -> StorageResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Writes a sibling temp file and renames it so a crash never leaves half a document.
    fn write(&self, payload: &str) -> StorageResult<()> {
        let write_error = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let temp_path = self.path.with_extension(TEMP_SUFFIX);
        fs::write(&temp_path, payload).map_err(write_error)?;
        fs::rename(&temp_path, &self.path).map_err(write_error)
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-process cache. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalCache {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemoryLocalCache {
    pub fn contents(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

impl LocalCache for MemoryLocalCache {
    fn read(&self) -> StorageResult<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, payload: &str) -> StorageResult<()> {
        *self.slot.borrow_mut() = Some(payload.to_string());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.slot.borrow_mut().take();
        Ok(())
    }
}
