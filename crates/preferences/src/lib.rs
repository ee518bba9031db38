//! # Strata Preferences
//!
//! User and workspace preference resolution: each scope is a watched
//! JSONC document reconciled into a snapshot layer, and the service
//! merges the layers by priority into one live view with batched
//! change notifications.

pub mod reconciler;
pub mod service;

use std::path::{Path, PathBuf};

pub use reconciler::{DocumentReconciler, PreferenceProvider};
pub use service::PreferenceService;

/// Default user-scope settings document
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("strata").join("settings.json"))
}

/// Workspace-scope settings document under a workspace root
pub fn workspace_settings_path(root: &Path) -> PathBuf {
    root.join(".strata").join("settings.json")
}
