//! In-memory file capability for tests
//!
//! Implements both [`Files`] and [`FileWatch`]; writes and removals
//! synchronously notify matching watchers, so reconciliation tests are
//! fully deterministic without touching the real file system.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    FileEvent, FileEventKind, FileListener, FileWatch, Files, FsError, WatchHandle, WatchId,
};

struct Registration {
    path: PathBuf,
    listener: FileListener,
}

#[derive(Default)]
struct State {
    files: HashMap<PathBuf, String>,
    watchers: HashMap<WatchId, Registration>,
}

/// In-memory file store with synchronous change notification
#[derive(Clone, Default)]
pub struct MemoryFiles {
    state: Arc<RwLock<State>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a file, notifying watchers with a `Deleted` event
    pub fn remove(&self, path: &Path) {
        let removed = self.state.write().files.remove(path).is_some();
        if removed {
            self.notify(path, FileEventKind::Deleted);
        }
    }

    /// Deliver an arbitrary event batch to watchers of `path`
    ///
    /// Lets tests exercise watcher edge cases (e.g. spurious events for
    /// unchanged content) directly.
    pub fn emit(&self, path: &Path, kind: FileEventKind) {
        self.notify(path, kind);
    }

    fn notify(&self, path: &Path, kind: FileEventKind) {
        let listeners: Vec<FileListener> = {
            let state = self.state.read();
            state
                .watchers
                .values()
                .filter(|r| r.path == path)
                .map(|r| Arc::clone(&r.listener))
                .collect()
        };

        let batch = [FileEvent {
            path: path.to_path_buf(),
            kind,
        }];
        for listener in listeners {
            listener(&batch);
        }
    }
}

impl Files for MemoryFiles {
    fn exists(&self, path: &Path) -> bool {
        self.state.read().files.contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<String, FsError> {
        self.state
            .read()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), FsError> {
        let existed = self
            .state
            .write()
            .files
            .insert(path.to_path_buf(), text.to_string())
            .is_some();

        let kind = if existed {
            FileEventKind::Updated
        } else {
            FileEventKind::Added
        };
        self.notify(path, kind);
        Ok(())
    }
}

impl FileWatch for MemoryFiles {
    fn watch(&self, path: &Path, listener: FileListener) -> Result<WatchHandle, FsError> {
        let id = WatchId::new();
        self.state.write().watchers.insert(
            id,
            Registration {
                path: path.to_path_buf(),
                listener,
            },
        );

        let state = Arc::clone(&self.state);
        Ok(WatchHandle::new(id, path.to_path_buf(), move || {
            state.write().watchers.remove(&id);
        }))
    }
}
