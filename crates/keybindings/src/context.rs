//! Keybinding contexts
//!
//! A context is a named enablement predicate consulted at dispatch
//! time. Ids form a flat namespace; registering the same id twice is a
//! configuration error and fails hard.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Binding;

/// Named enablement predicate
///
/// `is_enabled` must be pure: no side effects, safe to call during
/// dispatch.
pub trait KeybindingContext: Send + Sync {
    fn id(&self) -> &str;
    fn is_enabled(&self, binding: Option<&Binding>) -> bool;
}

/// Context registration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("keybinding context already registered: {0}")]
    Duplicate(String),
}

/// Sentinel context that always allows its bindings
pub struct AlwaysEnabled;

impl AlwaysEnabled {
    pub const ID: &'static str = "context.always";
}

impl KeybindingContext for AlwaysEnabled {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_enabled(&self, _binding: Option<&Binding>) -> bool {
        true
    }
}

/// Sentinel context that never allows its bindings
pub struct AlwaysDisabled;

impl AlwaysDisabled {
    pub const ID: &'static str = "context.never";
}

impl KeybindingContext for AlwaysDisabled {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_enabled(&self, _binding: Option<&Binding>) -> bool {
        false
    }
}

/// Flat registry of keybinding contexts
pub struct ContextRegistry {
    contexts: RwLock<HashMap<String, Arc<dyn KeybindingContext>>>,
}

impl ContextRegistry {
    /// A fresh registry with the two sentinel contexts pre-registered
    pub fn new() -> Self {
        let registry = Self {
            contexts: RwLock::new(HashMap::new()),
        };
        registry
            .register(Arc::new(AlwaysEnabled))
            .and_then(|_| registry.register(Arc::new(AlwaysDisabled)))
            .unwrap_or_else(|_| unreachable!("sentinel ids are unique"));
        registry
    }

    pub fn register(&self, context: Arc<dyn KeybindingContext>) -> Result<(), ContextError> {
        let id = context.id().to_string();
        let mut contexts = self.contexts.write();
        if contexts.contains_key(&id) {
            return Err(ContextError::Duplicate(id));
        }
        contexts.insert(id, context);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<dyn KeybindingContext>> {
        self.contexts.read().get(id).cloned()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}
