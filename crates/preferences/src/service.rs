//! Preference resolution service
//!
//! Composes prioritized providers into one merged view. Every provider
//! trigger causes a full recompute of the layer store; the resulting
//! diff is published as a single batched notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use layers::{Change, Layer, LayerPriority, LayerStore};
use strata_core::{Emitter, Subscription};

use crate::reconciler::PreferenceProvider;

struct ServiceInner {
    /// Sorted ascending by priority at construction; iteration order is
    /// the deterministic override order.
    providers: Vec<Arc<dyn PreferenceProvider>>,
    store: RwLock<LayerStore>,
    /// Serializes read-snapshots -> diff -> publish so batches are
    /// never interleaved.
    recompute_lock: Mutex<()>,
    changed: Emitter<Vec<Change>>,
    started: AtomicBool,
    disposed: AtomicBool,
}

impl ServiceInner {
    fn recompute_and_emit(&self) {
        if self.disposed.load(Ordering::SeqCst) || !self.started.load(Ordering::SeqCst) {
            return;
        }

        let guard = self.recompute_lock.lock();
        let current: Vec<Layer> = self
            .providers
            .iter()
            .map(|p| Layer::new(p.priority(), p.snapshot()))
            .collect();
        let changes = self.store.write().recompute(&current);

        if !changes.is_empty() {
            tracing::debug!(count = changes.len(), "preferences changed");
            self.changed.emit(&changes);
        }
        drop(guard);
    }
}

/// Live merged view over prioritized preference providers
pub struct PreferenceService {
    inner: Arc<ServiceInner>,
}

impl PreferenceService {
    /// Providers are sorted ascending by declared priority; ties keep
    /// registration order.
    pub fn new(mut providers: Vec<Arc<dyn PreferenceProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());

        let inner = Arc::new(ServiceInner {
            providers,
            store: RwLock::new(LayerStore::new()),
            recompute_lock: Mutex::new(()),
            changed: Emitter::new(),
            started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });

        for provider in &inner.providers {
            let weak: Weak<ServiceInner> = Arc::downgrade(&inner);
            provider.set_notify(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.recompute_and_emit();
                }
            }));
        }

        Self { inner }
    }

    /// Init every provider, then publish one initial batch
    ///
    /// Readiness is a soft signal: the initial recompute is not gated
    /// on every provider having finished its first read. A provider
    /// delivering late simply triggers another recompute whose diff is
    /// exactly the late keys.
    pub fn initialize(&self) {
        for provider in &self.inner.providers {
            provider.init();
        }
        self.inner.started.store(true, Ordering::SeqCst);
        self.inner.recompute_and_emit();
    }

    /// All providers have completed their first read
    pub fn ready(&self) -> bool {
        self.inner.providers.iter().all(|p| p.ready())
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.store.read().get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.store.read().get(name).cloned()
    }

    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.get(name).unwrap_or(default)
    }

    /// Boolean view of a merged value: truthiness for non-boolean types
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Null => None,
            Value::Bool(b) => Some(b),
            Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Some(!s.is_empty()),
            Value::Array(_) | Value::Object(_) => Some(true),
        }
    }

    pub fn get_boolean_or(&self, name: &str, default: bool) -> bool {
        self.get_boolean(name).unwrap_or(default)
    }

    /// String view of a merged value; non-strings stringify
    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn get_string_or(&self, name: &str, default: &str) -> String {
        self.get_string(name).unwrap_or_else(|| default.to_string())
    }

    /// Numeric view of a merged value; numeric strings parse, booleans
    /// coerce to 0/1
    pub fn get_number(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn get_number_or(&self, name: &str, default: f64) -> f64 {
        self.get_number(name).unwrap_or(default)
    }

    /// Subscribe to batched change notifications
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Vec<Change>) + Send + Sync + 'static,
    {
        self.inner.changed.subscribe(listener)
    }

    /// Persist one value through the user-scope provider's document
    pub fn set_user(&self, name: &str, value: Value) -> anyhow::Result<()> {
        let provider = self
            .inner
            .providers
            .iter()
            .find(|p| p.priority() == LayerPriority::User)
            .ok_or_else(|| anyhow::anyhow!("no user-scope preference provider"))?;
        provider.set(name, value)
    }

    /// Release providers and stop publishing
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        for provider in &self.inner.providers {
            provider.dispose();
        }
    }
}

impl Drop for PreferenceService {
    fn drop(&mut self) {
        if !self.inner.disposed.load(Ordering::SeqCst) {
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::DocumentReconciler;
    use fs::{FileEventKind, Files, MemoryFiles};
    use serde_json::json;
    use std::path::Path;

    fn provider(files: &MemoryFiles, path: &str, priority: LayerPriority) -> Arc<DocumentReconciler> {
        Arc::new(DocumentReconciler::new(
            path,
            priority,
            Arc::new(files.clone()),
            Arc::new(files.clone()),
        ))
    }

    fn service(files: &MemoryFiles) -> PreferenceService {
        PreferenceService::new(vec![
            provider(files, "/user/settings.json", LayerPriority::User),
            provider(files, "/ws/.strata/settings.json", LayerPriority::Workspace),
        ])
    }

    #[test]
    fn test_workspace_overrides_user() {
        let files = MemoryFiles::new();
        files
            .write(
                Path::new("/user/settings.json"),
                r#"{"x": "user", "y": "user"}"#,
            )
            .unwrap();
        files
            .write(Path::new("/ws/.strata/settings.json"), r#"{"x": "ws"}"#)
            .unwrap();

        let service = service(&files);
        service.initialize();

        assert_eq!(service.get_string("x").as_deref(), Some("ws"));
        assert_eq!(service.get_string("y").as_deref(), Some("user"));
    }

    #[test]
    fn test_watched_edit_yields_one_minimal_batch() {
        let files = MemoryFiles::new();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1}"#)
            .unwrap();

        let service = service(&files);
        service.initialize();

        let batches: Arc<Mutex<Vec<Vec<Change>>>> = Arc::new(Mutex::new(Vec::new()));
        let batches_clone = Arc::clone(&batches);
        let _sub = service.on_change(move |changes| {
            batches_clone.lock().push(changes.clone());
        });

        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1, "b": 2}"#)
            .unwrap();

        let batches = batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].name, "b");
        assert!(batches[0][0].is_added());
        assert_eq!(batches[0][0].new_value, Some(json!(2)));
    }

    #[test]
    fn test_initialize_publishes_initial_adds() {
        let files = MemoryFiles::new();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1}"#)
            .unwrap();

        let service = service(&files);
        let batches: Arc<Mutex<Vec<Vec<Change>>>> = Arc::new(Mutex::new(Vec::new()));
        let batches_clone = Arc::clone(&batches);
        let _sub = service.on_change(move |changes| {
            batches_clone.lock().push(changes.clone());
        });

        service.initialize();

        let batches = batches.lock();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].iter().all(|c| c.is_added()));
        assert!(service.ready());
    }

    #[test]
    fn test_spurious_event_publishes_no_batch() {
        let files = MemoryFiles::new();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1}"#)
            .unwrap();

        let service = service(&files);
        service.initialize();

        let batches: Arc<Mutex<Vec<Vec<Change>>>> = Arc::new(Mutex::new(Vec::new()));
        let batches_clone = Arc::clone(&batches);
        let _sub = service.on_change(move |changes| {
            batches_clone.lock().push(changes.clone());
        });

        // A change event for unchanged content re-reads the document
        // but the diff comes up empty.
        files.emit(Path::new("/user/settings.json"), FileEventKind::Updated);
        assert!(batches.lock().is_empty());
        assert_eq!(service.get("a"), Some(json!(1)));
    }

    #[test]
    fn test_invalid_edit_retains_merged_state() {
        let files = MemoryFiles::new();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1}"#)
            .unwrap();

        let service = service(&files);
        service.initialize();

        files
            .write(Path::new("/user/settings.json"), r#"{"a": "#)
            .unwrap();
        assert_eq!(service.get("a"), Some(json!(1)));
    }

    #[test]
    fn test_typed_accessors_coerce() {
        let files = MemoryFiles::new();
        files
            .write(
                Path::new("/user/settings.json"),
                r#"{"size": 14, "label": 42, "flag": "yes", "off": 0, "port": "8080"}"#,
            )
            .unwrap();

        let service = service(&files);
        service.initialize();

        assert_eq!(service.get_number("size"), Some(14.0));
        assert_eq!(service.get_number("port"), Some(8080.0));
        assert_eq!(service.get_string("label").as_deref(), Some("42"));
        assert_eq!(service.get_boolean("flag"), Some(true));
        assert_eq!(service.get_boolean("off"), Some(false));
        assert_eq!(service.get_boolean_or("missing", true), true);
        assert_eq!(service.get_number_or("missing", 7.5), 7.5);
        assert_eq!(service.get_string_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_set_user_round_trips() {
        let files = MemoryFiles::new();
        let service = service(&files);
        service.initialize();

        service.set_user("editor.tabSize", json!(2)).unwrap();
        assert_eq!(service.get_number("editor.tabSize"), Some(2.0));
    }

    #[test]
    fn test_disposed_service_stops_publishing() {
        let files = MemoryFiles::new();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 1}"#)
            .unwrap();

        let service = service(&files);
        service.initialize();

        let batches: Arc<Mutex<Vec<Vec<Change>>>> = Arc::new(Mutex::new(Vec::new()));
        let batches_clone = Arc::clone(&batches);
        let _sub = service.on_change(move |changes| {
            batches_clone.lock().push(changes.clone());
        });

        service.dispose();
        files
            .write(Path::new("/user/settings.json"), r#"{"a": 2}"#)
            .unwrap();

        assert!(batches.lock().is_empty());
    }
}
