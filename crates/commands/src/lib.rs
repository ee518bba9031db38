//! # Strata Commands
//!
//! The command capability consumed by the keybinding registry: named
//! commands with executable handlers, queried for availability at
//! dispatch time. Instance-owned - callers inject the registry they
//! construct, there is no process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

/// Command execution error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("command disabled: {0}")]
    Disabled(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// Command definition
#[derive(Debug, Clone)]
pub struct Command {
    /// Unique command ID
    pub id: String,
    /// Display label
    pub label: Option<String>,
    /// Is command enabled
    pub enabled: bool,
}

impl Command {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            label: None,
            enabled: true,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Command handler function type
type HandlerFn = Arc<dyn Fn(Option<Value>) -> Result<(), CommandError> + Send + Sync>;

/// Command registry
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Command>>,
    handlers: RwLock<HashMap<String, HandlerFn>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a command without a handler
    ///
    /// The command is resolvable (e.g. for accelerator labels) but not
    /// active until [`CommandRegistry::register_handler`] supplies one.
    pub fn register(&self, command: Command) {
        let id = command.id.clone();
        if self.commands.write().insert(id.clone(), command).is_some() {
            tracing::debug!(command = %id, "command re-registered, replacing definition");
        }
    }

    /// Attach an executable handler to a registered command
    pub fn register_handler<F>(&self, id: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(id.to_string(), Arc::new(handler));
    }

    /// Is there a live, enabled handler for this command?
    pub fn has_active_handler(&self, id: &str) -> bool {
        let enabled = self
            .commands
            .read()
            .get(id)
            .map(|c| c.enabled)
            .unwrap_or(false);
        enabled && self.handlers.read().contains_key(id)
    }

    /// Execute a command by ID
    pub fn execute(&self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let command = self.commands.read().get(id).cloned();
        match command {
            None => Err(CommandError::NotFound(id.to_string())),
            Some(cmd) if !cmd.enabled => Err(CommandError::Disabled(id.to_string())),
            Some(_) => {
                let handler = self.handlers.read().get(id).cloned();
                match handler {
                    Some(h) => h(args),
                    None => Err(CommandError::NotFound(id.to_string())),
                }
            }
        }
    }

    /// Get command by ID
    pub fn get(&self, id: &str) -> Option<Command> {
        self.commands.read().get(id).cloned()
    }

    /// Set command enabled state
    pub fn set_enabled(&self, id: &str, enabled: bool) {
        if let Some(cmd) = self.commands.write().get_mut(id) {
            cmd.enabled = enabled;
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
