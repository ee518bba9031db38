//! # Strata Keybindings
//!
//! Keystroke-to-command resolution: a default binding table overridden
//! by a live-edited keymap document. Overrides replace the default
//! entries per command rather than merging into them, and invalid
//! entries fall back to the defaults instead of producing a partial
//! binding. Instance-owned - callers construct the registry and inject
//! it, there is no process-wide singleton.

pub mod chord;
pub mod context;
pub mod keymap;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use commands::CommandRegistry;
use layers::{diff_maps, Change, Snapshot};
use strata_core::{Emitter, Subscription};

pub use chord::{Key, KeyChord, KeystrokeError, Modifiers};
pub use context::{AlwaysDisabled, AlwaysEnabled, ContextError, ContextRegistry, KeybindingContext};
pub use keymap::KeymapWatcher;

/// An immutable keystroke-to-command binding
///
/// The registry owns collections of bindings; commands and contexts
/// are referenced by id, never owned.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub command: String,
    pub keystroke: KeyChord,
    /// Enablement context id, looked up at dispatch time
    pub context: Option<String>,
    pub args: Option<Value>,
    /// Display form for menu accelerator labels
    pub accelerator: Option<String>,
}

impl Binding {
    pub fn new(command: &str, keystroke: KeyChord) -> Self {
        Self {
            command: command.to_string(),
            keystroke,
            context: None,
            args: None,
            accelerator: None,
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_accelerator(mut self, accelerator: &str) -> Self {
        self.accelerator = Some(accelerator.to_string());
        self
    }
}

/// One raw keymap document entry, not yet validated
#[derive(Debug, Clone, Deserialize)]
pub struct RawKeybinding {
    pub command: String,
    pub keybinding: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

#[derive(Default)]
struct Tables {
    defaults: Vec<Binding>,
    /// Command id -> indices into `defaults`, in registration order
    default_index: HashMap<String, Vec<usize>>,
    /// Command id -> replacement bindings; presence replaces the
    /// default list entirely
    overrides: HashMap<String, Vec<Binding>>,
    /// Document order of overridden commands
    override_order: Vec<String>,
}

impl Tables {
    fn effective_for(&self, command: &str) -> Vec<Binding> {
        if let Some(bindings) = self.overrides.get(command) {
            return bindings.clone();
        }
        self.default_index
            .get(command)
            .map(|indices| indices.iter().map(|&i| self.defaults[i].clone()).collect())
            .unwrap_or_default()
    }

    /// All effective bindings: overrides in document order, then
    /// non-overridden defaults in registration order
    fn effective_ordered(&self) -> Vec<Binding> {
        let mut result = Vec::new();
        for command in &self.override_order {
            if let Some(bindings) = self.overrides.get(command) {
                result.extend(bindings.iter().cloned());
            }
        }
        for binding in &self.defaults {
            if !self.overrides.contains_key(&binding.command) {
                result.push(binding.clone());
            }
        }
        result
    }

    /// Command -> canonical keystroke list, the view the change stream
    /// is diffed over
    fn effective_view(&self) -> Snapshot {
        let mut view = Snapshot::new();
        for command in self.default_index.keys().chain(self.overrides.keys()) {
            if view.contains_key(command) {
                continue;
            }
            let keystrokes: Vec<Value> = self
                .effective_for(command)
                .iter()
                .map(|b| Value::String(b.keystroke.canonical()))
                .collect();
            view.insert(command.clone(), Value::Array(keystrokes));
        }
        view
    }
}

/// Default bindings plus a replaceable override layer
pub struct KeybindingRegistry {
    tables: RwLock<Tables>,
    contexts: ContextRegistry,
    commands: Arc<CommandRegistry>,
    changed: Emitter<Vec<Change>>,
}

impl KeybindingRegistry {
    pub fn new(commands: Arc<CommandRegistry>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            contexts: ContextRegistry::new(),
            commands,
            changed: Emitter::new(),
        }
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    /// Append a default binding
    ///
    /// Keystroke collisions are legal - two bindings may share a chord
    /// and disambiguation happens at dispatch time by context and
    /// command availability. Collisions are logged for diagnosis only.
    pub fn register_default(&self, binding: Binding) {
        let mut tables = self.tables.write();
        if tables
            .defaults
            .iter()
            .any(|b| b.keystroke == binding.keystroke)
        {
            tracing::debug!(
                command = %binding.command,
                keystroke = %binding.keystroke,
                "keystroke already bound, keeping both"
            );
        }
        let idx = tables.defaults.len();
        tables
            .default_index
            .entry(binding.command.clone())
            .or_default()
            .push(idx);
        tables.defaults.push(binding);
    }

    /// Replace the whole override layer with a new keymap
    ///
    /// Each raw entry is validated independently: entries whose
    /// keystroke fails to parse are skipped with a warning, and a
    /// command left without any valid entry reverts to its defaults.
    /// Publishes one batch describing every command whose effective
    /// bindings changed.
    pub fn set_override_map(&self, raw: &[RawKeybinding]) -> Vec<Change> {
        let mut overrides: HashMap<String, Vec<Binding>> = HashMap::new();
        let mut override_order = Vec::new();

        for entry in raw {
            let keystroke = match KeyChord::parse(&entry.keybinding) {
                Ok(chord) => chord,
                Err(err) => {
                    tracing::warn!(
                        command = %entry.command,
                        keybinding = %entry.keybinding,
                        error = %err,
                        "ignoring keymap entry"
                    );
                    continue;
                }
            };

            let mut binding = Binding::new(&entry.command, keystroke);
            binding.context = entry.context.clone();
            binding.args = entry.args.clone();

            if !overrides.contains_key(&entry.command) {
                override_order.push(entry.command.clone());
            }
            overrides.entry(entry.command.clone()).or_default().push(binding);
        }

        let changes = {
            let mut tables = self.tables.write();
            let old_view = tables.effective_view();
            tables.overrides = overrides;
            tables.override_order = override_order;
            diff_maps(&old_view, &tables.effective_view())
        };

        if !changes.is_empty() {
            self.changed.emit(&changes);
        }
        changes
    }

    /// The effective binding for a command
    ///
    /// With `check_active` false the first binding is returned
    /// regardless of whether the command can run yet, which lets
    /// callers render accelerator labels ahead of handler
    /// registration. With it true, only bindings whose command has a
    /// live enabled handler qualify.
    pub fn resolve_for_command(&self, command: &str, check_active: bool) -> Option<Binding> {
        let bindings = self.tables.read().effective_for(command);
        bindings
            .into_iter()
            .find(|b| !check_active || self.commands.has_active_handler(&b.command))
    }

    /// The effective binding for a keystroke
    pub fn resolve_for_keystroke(&self, chord: KeyChord, check_active: bool) -> Option<Binding> {
        let candidates = self.tables.read().effective_ordered();
        candidates
            .into_iter()
            .filter(|b| b.keystroke == chord)
            .find(|b| !check_active || self.commands.has_active_handler(&b.command))
    }

    /// Execute the first enabled, available binding for a chord
    ///
    /// A binding naming a context id absent from the registry is
    /// treated as unconditionally enabled. Returns `Ok(false)` when no
    /// binding ran.
    pub fn dispatch(&self, chord: KeyChord) -> Result<bool, commands::CommandError> {
        let candidates: Vec<Binding> = self
            .tables
            .read()
            .effective_ordered()
            .into_iter()
            .filter(|b| b.keystroke == chord)
            .collect();

        for binding in candidates {
            let enabled = match &binding.context {
                None => true,
                Some(id) => match self.contexts.lookup(id) {
                    Some(context) => context.is_enabled(Some(&binding)),
                    None => true,
                },
            };
            if !enabled {
                continue;
            }
            if !self.commands.has_active_handler(&binding.command) {
                continue;
            }
            self.commands.execute(&binding.command, binding.args.clone())?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Subscribe to batched effective-binding changes
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Vec<Change>) + Send + Sync + 'static,
    {
        self.changed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::Command;
    use parking_lot::Mutex;

    fn chord(s: &str) -> KeyChord {
        KeyChord::parse(s).unwrap()
    }

    fn raw(command: &str, keybinding: &str) -> RawKeybinding {
        RawKeybinding {
            command: command.to_string(),
            keybinding: keybinding.to_string(),
            context: None,
            args: None,
        }
    }

    fn registry_with_default() -> KeybindingRegistry {
        let registry = KeybindingRegistry::new(Arc::new(CommandRegistry::new()));
        registry.register_default(Binding::new("cmd.a", chord("ctrl+c")));
        registry
    }

    #[test]
    fn test_override_replaces_default_binding() {
        let registry = registry_with_default();
        registry.set_override_map(&[raw("cmd.a", "ctrl+shift+c")]);

        let binding = registry.resolve_for_command("cmd.a", false).unwrap();
        assert_eq!(binding.keystroke, chord("ControlLeft+ShiftLeft+KeyC"));
    }

    #[test]
    fn test_invalid_override_falls_back_to_default() {
        let registry = registry_with_default();
        registry.set_override_map(&[raw("cmd.a", "bogus+nonsense")]);

        let binding = registry.resolve_for_command("cmd.a", false).unwrap();
        assert_eq!(binding.keystroke, chord("ctrl+c"));
    }

    #[test]
    fn test_new_map_replaces_old_map_entirely() {
        let registry = registry_with_default();
        registry.register_default(Binding::new("cmd.b", chord("ctrl+b")));

        registry.set_override_map(&[raw("cmd.a", "ctrl+shift+c")]);
        registry.set_override_map(&[raw("cmd.b", "ctrl+shift+b")]);

        // cmd.a is no longer mentioned and reverts to its default.
        let a = registry.resolve_for_command("cmd.a", false).unwrap();
        assert_eq!(a.keystroke, chord("ctrl+c"));
        let b = registry.resolve_for_command("cmd.b", false).unwrap();
        assert_eq!(b.keystroke, chord("ctrl+shift+b"));
    }

    #[test]
    fn test_accelerator_label_survives_resolution() {
        let registry = KeybindingRegistry::new(Arc::new(CommandRegistry::new()));
        registry.register_default(
            Binding::new("cmd.a", chord("ctrl+shift+p")).with_accelerator("Ctrl+Shift+P"),
        );

        let binding = registry.resolve_for_command("cmd.a", false).unwrap();
        assert_eq!(binding.accelerator.as_deref(), Some("Ctrl+Shift+P"));

        let by_chord = registry
            .resolve_for_keystroke(chord("ctrl+shift+p"), false)
            .unwrap();
        assert_eq!(by_chord.accelerator.as_deref(), Some("Ctrl+Shift+P"));
    }

    #[test]
    fn test_resolve_for_keystroke() {
        let registry = registry_with_default();
        let binding = registry
            .resolve_for_keystroke(chord("ControlLeft+KeyC"), false)
            .unwrap();
        assert_eq!(binding.command, "cmd.a");
        assert!(registry.resolve_for_keystroke(chord("ctrl+x"), false).is_none());
    }

    #[test]
    fn test_check_active_requires_live_handler() {
        let commands = Arc::new(CommandRegistry::new());
        commands.register(Command::new("cmd.inert"));
        commands.register(Command::new("cmd.live"));
        commands.register_handler("cmd.live", |_| Ok(()));

        let registry = KeybindingRegistry::new(Arc::clone(&commands));
        registry.register_default(Binding::new("cmd.inert", chord("ctrl+k")));
        registry.register_default(Binding::new("cmd.live", chord("ctrl+k")));

        let first = registry.resolve_for_keystroke(chord("ctrl+k"), false).unwrap();
        assert_eq!(first.command, "cmd.inert");

        let active = registry.resolve_for_keystroke(chord("ctrl+k"), true).unwrap();
        assert_eq!(active.command, "cmd.live");
        assert!(registry.resolve_for_command("cmd.inert", true).is_none());
    }

    #[test]
    fn test_dispatch_executes_first_available_binding() {
        let commands = Arc::new(CommandRegistry::new());
        commands.register(Command::new("cmd.a"));
        let executed = Arc::new(Mutex::new(Vec::new()));
        let executed_clone = Arc::clone(&executed);
        commands.register_handler("cmd.a", move |args| {
            executed_clone.lock().push(args);
            Ok(())
        });

        let registry = KeybindingRegistry::new(commands);
        registry.register_default(Binding::new("cmd.a", chord("ctrl+c")));

        assert!(registry.dispatch(chord("ctrl+c")).unwrap());
        assert_eq!(executed.lock().len(), 1);
        assert!(!registry.dispatch(chord("ctrl+q")).unwrap());
    }

    #[test]
    fn test_dispatch_with_unknown_context_runs() {
        let commands = Arc::new(CommandRegistry::new());
        commands.register(Command::new("cmd.a"));
        commands.register_handler("cmd.a", |_| Ok(()));

        let registry = KeybindingRegistry::new(commands);
        registry.register_default(
            Binding::new("cmd.a", chord("ctrl+c")).with_context("no.such.context"),
        );

        // An unregistered context id does not gate the binding.
        assert!(registry.dispatch(chord("ctrl+c")).unwrap());
    }

    #[test]
    fn test_dispatch_respects_disabled_context() {
        let commands = Arc::new(CommandRegistry::new());
        commands.register(Command::new("cmd.a"));
        commands.register_handler("cmd.a", |_| Ok(()));

        let registry = KeybindingRegistry::new(commands);
        registry.register_default(
            Binding::new("cmd.a", chord("ctrl+c")).with_context(AlwaysDisabled::ID),
        );

        assert!(!registry.dispatch(chord("ctrl+c")).unwrap());
    }

    #[test]
    fn test_override_map_emits_one_batch() {
        let registry = registry_with_default();
        let batches: Arc<Mutex<Vec<Vec<Change>>>> = Arc::new(Mutex::new(Vec::new()));
        let batches_clone = Arc::clone(&batches);
        let _sub = registry.on_change(move |changes| {
            batches_clone.lock().push(changes.clone());
        });

        registry.set_override_map(&[raw("cmd.a", "ctrl+shift+c")]);
        {
            let batches = batches.lock();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].len(), 1);
            assert_eq!(batches[0][0].name, "cmd.a");
            assert!(batches[0][0].is_updated());
        }

        // Same map again, no effective change, no batch.
        registry.set_override_map(&[raw("cmd.a", "ctrl+shift+c")]);
        assert_eq!(batches.lock().len(), 1);
    }
}
