//! Process-wide singleton handles (§2a, §9): one `Engine` and one
//! `SettingsStore` per loaded native module, lazily initialized on first
//! access from the napi bindings.

use crate::engine::Engine;
use crate::settings::{app_support_dir, SettingsStore};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static SETTINGS: OnceCell<Arc<SettingsStore>> = OnceCell::new();
static ENGINE: OnceCell<Arc<Engine>> = OnceCell::new();

pub fn settings_store() -> Arc<SettingsStore> {
  SETTINGS
    .get_or_init(|| {
      let dir = app_support_dir().unwrap_or_else(|e| {
        tracing::error!(error = %e, "falling back to current directory for settings storage");
        std::path::PathBuf::from(".")
      });
      Arc::new(SettingsStore::load(dir))
    })
    .clone()
}

/// Builds the engine singleton on first access. `default_output_uid` is only
/// used the very first time this is called; later calls ignore it and
/// return the existing instance.
pub fn engine(default_output_uid: &str) -> Arc<Engine> {
  ENGINE
    .get_or_init(|| Arc::new(Engine::new(settings_store(), default_output_uid.to_string())))
    .clone()
}
