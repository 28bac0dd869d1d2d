//! Versioned settings document and its debounced, atomic-write store (§4.7).

mod document;
mod store;

pub use document::{
  AppWidePreferences, DeviceSelectionMode, MenuBarIconStyle, PinnedAppInfo, SettingsDocument, StartupRoutingPolicy, CURRENT_SCHEMA_VERSION,
};
pub use store::{app_support_dir, SettingsStore};
