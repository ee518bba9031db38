//! # Strata FS
//!
//! The file capability consumed by the resolution engine: existence
//! checks, text read/write, and change watching. Production code uses
//! [`LocalFiles`] plus the notify-backed [`watcher::NotifyWatch`];
//! tests use the in-memory [`memory::MemoryFiles`] which implements
//! both sides deterministically.

pub mod memory;
pub mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use memory::MemoryFiles;
pub use watcher::NotifyWatch;

/// File capability error
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The resource does not exist. Callers treat this as "empty
    /// snapshot", never as a failure.
    #[error("not found: {0}")]
    NotFound(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watch error on {path}: {message}")]
    Watch { path: PathBuf, message: String },
}

/// Text file access
pub trait Files: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<String, FsError>;
    fn write(&self, path: &Path, text: &str) -> Result<(), FsError>;
}

/// What happened to a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Added,
    Updated,
    Deleted,
}

/// One file change notification
#[derive(Debug, Clone)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// Listener receiving batched file events
pub type FileListener = Arc<dyn Fn(&[FileEvent]) + Send + Sync>;

/// File change watching
///
/// `watch` registers a listener for changes to one path and returns a
/// handle; dropping the handle unsubscribes. Listeners may be invoked
/// from a watcher thread.
pub trait FileWatch: Send + Sync {
    fn watch(&self, path: &Path, listener: FileListener) -> Result<WatchHandle, FsError>;
}

/// Identifier of one watch registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(uuid::Uuid);

impl WatchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for an active watch; unsubscribes on drop
pub struct WatchHandle {
    id: WatchId,
    path: PathBuf,
    unwatch: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    pub fn new(id: WatchId, path: PathBuf, unwatch: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            path,
            unwatch: Some(Box::new(unwatch)),
        }
    }

    pub fn id(&self) -> WatchId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(unwatch) = self.unwatch.take() {
            unwatch();
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

/// File access backed by the real file system
#[derive(Debug, Clone, Default)]
pub struct LocalFiles;

impl LocalFiles {
    pub fn new() -> Self {
        Self
    }

    fn map_err(path: &Path, err: std::io::Error) -> FsError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FsError::NotFound(path.to_path_buf())
        } else {
            FsError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}

impl Files for LocalFiles {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<String, FsError> {
        std::fs::read_to_string(path).map_err(|e| Self::map_err(path, e))
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), FsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::map_err(path, e))?;
        }
        std::fs::write(path, text).map_err(|e| Self::map_err(path, e))
    }
}
