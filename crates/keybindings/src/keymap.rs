//! Keymap document watching
//!
//! The keymap is a single editable JSONC array of
//! `{command, keybinding, context?, args?}` records. A [`KeymapWatcher`]
//! keeps the registry's override layer in sync with it: entries are
//! validated individually, a missing document clears the overrides,
//! and a document-level syntax error keeps the previous overrides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use fs::{FileListener, FileWatch, Files, FsError, WatchHandle};

use crate::{KeybindingRegistry, RawKeybinding};

/// Default user keymap document
pub fn keymap_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("strata").join("keymap.json"))
}

struct WatcherState {
    disposed: bool,
    watch_handle: Option<WatchHandle>,
}

struct Inner {
    path: PathBuf,
    files: Arc<dyn Files>,
    registry: Arc<KeybindingRegistry>,
    state: Mutex<WatcherState>,
}

impl Inner {
    fn reload(self: &Arc<Self>) {
        let Some(entries) = self.read_entries() else {
            return;
        };

        if self.state.lock().disposed {
            return;
        }
        self.registry.set_override_map(&entries);
    }

    /// Read and validate the keymap document
    ///
    /// Missing file => empty keymap. Read or document-level parse
    /// failure => `None` (previous overrides kept). Individually
    /// malformed entries are skipped.
    fn read_entries(&self) -> Option<Vec<RawKeybinding>> {
        if !self.files.exists(&self.path) {
            return Some(Vec::new());
        }

        let text = match self.files.read(&self.path) {
            Ok(text) => text,
            Err(FsError::NotFound(_)) => return Some(Vec::new()),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read keymap");
                return None;
            }
        };

        let outcome = jsonc::parse(&text);
        for error in &outcome.errors {
            tracing::warn!(
                path = %self.path.display(),
                offset = error.offset,
                message = %error.message,
                "keymap document has syntax errors"
            );
        }

        let items = match outcome.value {
            Some(Value::Array(items)) => items,
            Some(_) => {
                tracing::warn!(path = %self.path.display(), "keymap document is not an array");
                return None;
            }
            None => return None,
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<RawKeybinding>(item) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), error = %err, "ignoring malformed keymap entry");
                }
            }
        }
        Some(entries)
    }
}

/// Keeps a registry's override layer in sync with a keymap document
pub struct KeymapWatcher {
    inner: Arc<Inner>,
    watch: Arc<dyn FileWatch>,
}

impl KeymapWatcher {
    pub fn new(
        path: impl Into<PathBuf>,
        registry: Arc<KeybindingRegistry>,
        files: Arc<dyn Files>,
        watch: Arc<dyn FileWatch>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                files,
                registry,
                state: Mutex::new(WatcherState {
                    disposed: false,
                    watch_handle: None,
                }),
            }),
            watch,
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Start watching and apply the current document
    pub fn init(&self) {
        let weak = Arc::downgrade(&self.inner);
        let listener: FileListener = Arc::new(move |events| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if events.iter().any(|e| e.path == inner.path) {
                inner.reload();
            }
        });

        match self.watch.watch(&self.inner.path, listener) {
            Ok(handle) => {
                self.inner.state.lock().watch_handle = Some(handle);
            }
            Err(err) => {
                tracing::warn!(path = %self.inner.path.display(), error = %err, "failed to watch keymap");
            }
        }

        self.inner.reload();
    }

    pub fn dispose(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            state.disposed = true;
            state.watch_handle.take()
        };
        drop(handle);
    }
}
