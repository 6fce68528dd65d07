//! Credential storage: byte blobs addressed by path, with explicit
//! not-found and already-exists semantics.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

/// Kind of artifact being written. Decides file permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// World-readable, 0644.
    Certificate,
    /// Owner-only, 0600.
    PrivateKey,
}

impl FileMode {
    pub fn unix_mode(self) -> u32 {
        match self {
            Self::Certificate => 0o644,
            Self::PrivateKey => 0o600,
        }
    }
}

/// What a write may do to an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Fail with `AlreadyExists` if the path is occupied.
    CreateNew,
    /// Replace an existing file; fail with `NotFound` if there is none.
    Replace,
}

/// Storage backend for PEM material.
pub trait CredentialStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    fn store(
        &self,
        path: &Path,
        contents: &[u8],
        mode: FileMode,
        policy: WritePolicy,
    ) -> Result<(), StoreError>;

    fn exists(&self, path: &Path) -> Result<bool, StoreError>;

    /// Create `dir` and its parents if missing.
    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError>;
}

/// Local filesystem store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCredentialStore;

impl CredentialStore for FsCredentialStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(|e| StoreError::from_io(path, e))
    }

    fn store(
        &self,
        path: &Path,
        contents: &[u8],
        mode: FileMode,
        policy: WritePolicy,
    ) -> Result<(), StoreError> {
        let mut options = OpenOptions::new();
        options.write(true);
        match policy {
            WritePolicy::CreateNew => options.create_new(true),
            WritePolicy::Replace => options.truncate(true),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode.unix_mode());
        }

        let mut file = options.open(path).map_err(|e| StoreError::from_io(path, e))?;

        // An existing file keeps the permissions it was created with.
        #[cfg(unix)]
        if policy == WritePolicy::Replace {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(mode.unix_mode()))
                .map_err(|e| StoreError::from_io(path, e))?;
        }

        file.write_all(contents).map_err(|e| StoreError::from_io(path, e))?;
        file.sync_all().map_err(|e| StoreError::from_io(path, e))
    }

    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        path.try_exists().map_err(|e| StoreError::from_io(path, e))
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(dir).map_err(|e| StoreError::from_io(dir, e))
    }
}

/// A file held by [`MemoryCredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub contents: Vec<u8>,
    pub mode: FileMode,
}

/// In-memory store that counts successful writes and can inject read
/// failures. Single-threaded.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    files: RefCell<BTreeMap<PathBuf, StoredFile>>,
    dirs: RefCell<Vec<PathBuf>>,
    read_failures: RefCell<BTreeMap<PathBuf, io::ErrorKind>>,
    writes: Cell<usize>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file without counting it as a write.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>, mode: FileMode) {
        self.files
            .borrow_mut()
            .insert(path.into(), StoredFile { contents: contents.into(), mode });
    }

    pub fn remove(&self, path: &Path) -> Option<StoredFile> {
        self.files.borrow_mut().remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).map(|file| file.contents.clone())
    }

    pub fn mode(&self, path: &Path) -> Option<FileMode> {
        self.files.borrow().get(path).map(|file| file.mode)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.borrow().keys().cloned().collect()
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.borrow().clone()
    }

    /// Number of successful `store` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Make every subsequent `load` of `path` fail with `kind`.
    pub fn fail_reads(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.read_failures.borrow_mut().insert(path.into(), kind);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        if let Some(kind) = self.read_failures.borrow().get(path) {
            return Err(StoreError::from_io(path, io::Error::from(*kind)));
        }
        self.get(path).ok_or_else(|| StoreError::NotFound { path: path.to_path_buf() })
    }

    fn store(
        &self,
        path: &Path,
        contents: &[u8],
        mode: FileMode,
        policy: WritePolicy,
    ) -> Result<(), StoreError> {
        let mut files = self.files.borrow_mut();
        let occupied = files.contains_key(path);
        match policy {
            WritePolicy::CreateNew if occupied => {
                return Err(StoreError::AlreadyExists { path: path.to_path_buf() })
            }
            WritePolicy::Replace if !occupied => {
                return Err(StoreError::NotFound { path: path.to_path_buf() })
            }
            _ => {}
        }
        files.insert(path.to_path_buf(), StoredFile { contents: contents.to_vec(), mode });
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.files.borrow().contains_key(path))
    }

    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        let mut dirs = self.dirs.borrow_mut();
        if !dirs.iter().any(|known| known == dir) {
            dirs.push(dir.to_path_buf());
        }
        Ok(())
    }
}
