//! Document reconciliation
//!
//! A [`DocumentReconciler`] keeps one layer's snapshot in sync with a
//! watched JSONC document: on every change event for its path it
//! re-reads, strips comments, parses, and publishes the new snapshot to
//! its owner. A momentarily-invalid edit never corrupts state - parse
//! errors are logged and the previous good snapshot is retained.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use fs::{FileListener, FileWatch, Files, FsError, WatchHandle};
use layers::{LayerPriority, Snapshot};

/// One prioritized snapshot source composed by the preference service
pub trait PreferenceProvider: Send + Sync {
    fn priority(&self) -> LayerPriority;

    /// Start watching and perform the first read
    fn init(&self);

    /// The current snapshot; empty until the first successful read
    fn snapshot(&self) -> Snapshot;

    /// Has the first read completed? Soft signal - the service does not
    /// gate its initial recompute on it.
    fn ready(&self) -> bool;

    /// Wire the "I have new data" trigger back to the owner
    fn set_notify(&self, notify: Arc<dyn Fn() + Send + Sync>);

    /// Persist one value into the backing document, if writable
    fn set(&self, _name: &str, _value: Value) -> anyhow::Result<()> {
        anyhow::bail!("provider is read-only")
    }

    /// Release the watch; late events and reads are discarded
    fn dispose(&self);
}

struct ReconcilerState {
    snapshot: Snapshot,
    ready: bool,
    disposed: bool,
    watch_handle: Option<WatchHandle>,
}

struct Inner {
    path: PathBuf,
    priority: LayerPriority,
    files: Arc<dyn Files>,
    state: Mutex<ReconcilerState>,
    notify: RwLock<Option<Arc<dyn Fn() + Send + Sync>>>,
}

impl Inner {
    /// Re-read and publish. Returns quietly on any failure that should
    /// retain previous good state.
    fn reconcile(self: &Arc<Self>) {
        let parsed = self.read_snapshot();

        let Some(snapshot) = parsed else {
            return;
        };

        {
            let mut state = self.state.lock();
            // An in-flight read may complete after disposal.
            if state.disposed {
                return;
            }
            state.snapshot = snapshot;
        }

        let notify = self.notify.read().clone();
        if let Some(notify) = notify {
            notify();
        }
    }

    /// Read and parse the document
    ///
    /// Missing file => empty snapshot. Read or parse failure => `None`
    /// (previous state kept).
    fn read_snapshot(&self) -> Option<Snapshot> {
        if !self.files.exists(&self.path) {
            return Some(Snapshot::new());
        }

        let text = match self.files.read(&self.path) {
            Ok(text) => text,
            // Deleted between the exists check and the read.
            Err(FsError::NotFound(_)) => return Some(Snapshot::new()),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read preferences");
                return None;
            }
        };

        let outcome = jsonc::parse(&text);
        for error in &outcome.errors {
            tracing::warn!(
                path = %self.path.display(),
                offset = error.offset,
                message = %error.message,
                "preference document has syntax errors"
            );
        }

        match outcome.value {
            Some(Value::Object(map)) => Some(map.into_iter().collect()),
            Some(_) => {
                tracing::warn!(path = %self.path.display(), "preference document is not an object");
                None
            }
            None => None,
        }
    }
}

/// Watches one JSONC document and maintains its snapshot layer
pub struct DocumentReconciler {
    inner: Arc<Inner>,
    watch: Arc<dyn FileWatch>,
}

impl DocumentReconciler {
    pub fn new(
        path: impl Into<PathBuf>,
        priority: LayerPriority,
        files: Arc<dyn Files>,
        watch: Arc<dyn FileWatch>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                priority,
                files,
                state: Mutex::new(ReconcilerState {
                    snapshot: Snapshot::new(),
                    ready: false,
                    disposed: false,
                    watch_handle: None,
                }),
                notify: RwLock::new(None),
            }),
            watch,
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Write the full snapshot back to the document, pretty-printed
    pub fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        // Stable key order for a human-edited file.
        let ordered: BTreeMap<&String, &Value> = snapshot.iter().collect();
        let text = serde_json::to_string_pretty(&ordered)?;
        self.inner.files.write(&self.inner.path, &text)?;
        Ok(())
    }
}

impl PreferenceProvider for DocumentReconciler {
    fn priority(&self) -> LayerPriority {
        self.inner.priority
    }

    fn init(&self) {
        let weak = Arc::downgrade(&self.inner);
        let listener: FileListener = Arc::new(move |events| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if events.iter().any(|e| e.path == inner.path) {
                inner.reconcile();
            }
        });

        match self.watch.watch(&self.inner.path, listener) {
            Ok(handle) => {
                self.inner.state.lock().watch_handle = Some(handle);
            }
            Err(err) => {
                // The layer still works, it just won't refresh.
                tracing::warn!(path = %self.inner.path.display(), error = %err, "failed to watch preferences");
            }
        }

        self.inner.reconcile();
        self.inner.state.lock().ready = true;
    }

    fn snapshot(&self) -> Snapshot {
        self.inner.state.lock().snapshot.clone()
    }

    fn ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    fn set_notify(&self, notify: Arc<dyn Fn() + Send + Sync>) {
        *self.inner.notify.write() = Some(notify);
    }

    fn set(&self, name: &str, value: Value) -> anyhow::Result<()> {
        let mut snapshot = self.inner.state.lock().snapshot.clone();
        if value.is_null() {
            snapshot.remove(name);
        } else {
            snapshot.insert(name.to_string(), value);
        }
        // The watcher picks the write up and reconciles it back in.
        self.save(&snapshot)
    }

    fn dispose(&self) {
        let handle = {
            let mut state = self.inner.state.lock();
            state.disposed = true;
            state.watch_handle.take()
        };
        drop(handle);
        *self.inner.notify.write() = None;
    }
}
