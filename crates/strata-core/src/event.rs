//! Typed event emitter with unsubscribable listeners
//!
//! Every change stream in the engine (preference batches, binding
//! batches, file events) is a concretely typed `Emitter<T>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EmitterInner<T> {
    listeners: RwLock<HashMap<u64, Listener<T>>>,
    next_id: AtomicU64,
}

/// Typed event emitter
///
/// Listeners are invoked synchronously, in no particular order, on the
/// thread that calls [`Emitter::emit`]. The listener map lock is not
/// held while listeners run.
pub struct Emitter<T> {
    inner: Arc<EmitterInner<T>>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to events
    ///
    /// The listener stays registered until the returned [`Subscription`]
    /// is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        T: 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().insert(id, Arc::new(listener));

        let weak: Weak<EmitterInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.write().remove(&id);
            }
        })
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: &T) {
        let listeners: Vec<Listener<T>> = self.inner.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for an event subscription
///
/// Unsubscribes on drop. Call [`Subscription::detach`] to keep the
/// listener registered for the emitter's lifetime instead.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }

    /// Leave the listener registered forever
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}
