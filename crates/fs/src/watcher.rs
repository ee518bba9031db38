//! Notify-backed file watching

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;

use crate::{FileEvent, FileEventKind, FileListener, FileWatch, FsError, WatchHandle, WatchId};

/// File watcher backed by the `notify` crate
///
/// Watches the parent directory of each registered path non-recursively
/// and filters events down to the exact path, so a document that does
/// not exist yet can still be watched for creation.
pub struct NotifyWatch {
    watchers: Arc<Mutex<HashMap<WatchId, RecommendedWatcher>>>,
}

impl NotifyWatch {
    pub fn new() -> Self {
        Self {
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for NotifyWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatch for NotifyWatch {
    fn watch(&self, path: &Path, listener: FileListener) -> Result<WatchHandle, FsError> {
        let target = path.to_path_buf();
        let watch_root = target.parent().unwrap_or(&target).to_path_buf();

        let filter_path = target.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "file watch error");
                        return;
                    }
                };

                let kind = match event.kind {
                    notify::EventKind::Create(_) => FileEventKind::Added,
                    notify::EventKind::Modify(_) => FileEventKind::Updated,
                    notify::EventKind::Remove(_) => FileEventKind::Deleted,
                    _ => return,
                };

                let batch: Vec<FileEvent> = event
                    .paths
                    .iter()
                    .filter(|p| p.as_path() == filter_path)
                    .map(|p| FileEvent {
                        path: p.clone(),
                        kind,
                    })
                    .collect();

                if !batch.is_empty() {
                    listener(&batch);
                }
            })
            .map_err(|e| FsError::Watch {
                path: target.clone(),
                message: e.to_string(),
            })?;

        watcher
            .watch(&watch_root, RecursiveMode::NonRecursive)
            .map_err(|e| FsError::Watch {
                path: target.clone(),
                message: e.to_string(),
            })?;

        let id = WatchId::new();
        self.watchers.lock().insert(id, watcher);

        let watchers = Arc::clone(&self.watchers);
        Ok(WatchHandle::new(id, target, move || {
            watchers.lock().remove(&id);
        }))
    }
}
