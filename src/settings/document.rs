//! On-disk settings schema (§4.7, §6 key table).
//!
//! Every field defaults via `#[serde(default)]` so a document encoded by an
//! older schema version still decodes: missing keys fall back to the
//! documented default rather than failing, the idiom this pack's settings
//! documents use for the same reason (`sootmix`'s `MixerChannel` defaults).

use crate::constants::MAX_GAIN;
use crate::eq::{CustomPreset, EqSettings};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn default_max_volume_boost() -> f32 {
  MAX_GAIN
}

fn default_default_new_app_volume() -> f32 {
  1.0
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceSelectionMode {
  Single,
  Multi,
}

impl Default for DeviceSelectionMode {
  fn default() -> Self {
    DeviceSelectionMode::Single
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartupRoutingPolicy {
  PreserveExplicitRouting,
  FollowSystemDefault,
}

impl Default for StartupRoutingPolicy {
  fn default() -> Self {
    StartupRoutingPolicy::PreserveExplicitRouting
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuBarIconStyle {
  Filled,
  Outline,
  Monochrome,
}

impl Default for MenuBarIconStyle {
  fn default() -> Self {
    MenuBarIconStyle::Filled
  }
}

/// `appSettings` block: app-wide preferences independent of any one app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppWidePreferences {
  pub launch_at_login: bool,
  pub menu_bar_icon_style: MenuBarIconStyle,
  #[serde(default = "default_default_new_app_volume")]
  pub default_new_app_volume: f32,
  #[serde(default = "default_max_volume_boost")]
  pub max_volume_boost: f32,
  pub lock_input_device: bool,
  #[serde(default = "default_true")]
  pub remember_volume_mute: bool,
  #[serde(default = "default_true")]
  pub remember_eq: bool,
  pub startup_routing_policy: StartupRoutingPolicy,
  #[serde(default = "default_true")]
  pub show_device_disconnect_alerts: bool,
  pub onboarding_completed: bool,
}

impl Default for AppWidePreferences {
  fn default() -> Self {
    Self {
      launch_at_login: false,
      menu_bar_icon_style: MenuBarIconStyle::default(),
      default_new_app_volume: default_default_new_app_volume(),
      max_volume_boost: default_max_volume_boost(),
      lock_input_device: false,
      remember_volume_mute: true,
      remember_eq: true,
      startup_routing_policy: StartupRoutingPolicy::default(),
      show_device_disconnect_alerts: true,
      onboarding_completed: false,
    }
  }
}

/// `pinnedAppInfo` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedAppInfo {
  pub display_name: String,
  pub bundle_id: Option<String>,
}

/// The full versioned settings document persisted at
/// `<app-support>/FineTune/settings.json` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDocument {
  pub version: u32,
  pub app_volumes: HashMap<String, f32>,
  pub app_device_routing: HashMap<String, String>,
  pub app_mutes: HashMap<String, bool>,
  pub app_eq_settings: HashMap<String, EqSettings>,
  pub custom_eq_presets: Vec<CustomPreset>,
  pub app_device_selection_mode: HashMap<String, DeviceSelectionMode>,
  pub app_selected_device_uids: HashMap<String, Vec<String>>,
  pub pinned_apps: HashSet<String>,
  pub pinned_app_info: HashMap<String, PinnedAppInfo>,
  pub locked_input_device_uid: Option<String>,
  #[serde(default = "default_true")]
  pub system_sounds_follows_default: bool,
  pub app_settings: AppWidePreferences,
}

impl Default for SettingsDocument {
  fn default() -> Self {
    Self {
      version: CURRENT_SCHEMA_VERSION,
      app_volumes: HashMap::new(),
      app_device_routing: HashMap::new(),
      app_mutes: HashMap::new(),
      app_eq_settings: HashMap::new(),
      custom_eq_presets: Vec::new(),
      app_device_selection_mode: HashMap::new(),
      app_selected_device_uids: HashMap::new(),
      pinned_apps: HashSet::new(),
      pinned_app_info: HashMap::new(),
      locked_input_device_uid: None,
      system_sounds_follows_default: true,
      app_settings: AppWidePreferences::default(),
    }
  }
}

impl SettingsDocument {
  /// True if `persistence_id` has any customization at all — drives the
  /// "skip uncustomized apps" rule in `applyPersistedSettings` (§4.4).
  pub fn has_custom_state(&self, persistence_id: &str) -> bool {
    self.app_volumes.contains_key(persistence_id)
      || self.app_mutes.contains_key(persistence_id)
      || self.app_eq_settings.contains_key(persistence_id)
      || self.app_device_routing.contains_key(persistence_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_document_round_trips() {
    let doc = SettingsDocument::default();
    let encoded = serde_json::to_string(&doc).unwrap();
    let decoded: SettingsDocument = serde_json::from_str(&encoded).unwrap();
    assert_eq!(doc, decoded);
  }

  #[test]
  fn missing_keys_decode_to_defaults() {
    let decoded: SettingsDocument = serde_json::from_str("{}").unwrap();
    assert_eq!(decoded, SettingsDocument::default());
  }

  #[test]
  fn uncustomized_app_has_no_custom_state() {
    let doc = SettingsDocument::default();
    assert!(!doc.has_custom_state("com.example.app"));
  }

  #[test]
  fn volume_only_customization_counts_as_custom_state() {
    let mut doc = SettingsDocument::default();
    doc.app_volumes.insert("com.example.app".to_string(), 0.7);
    assert!(doc.has_custom_state("com.example.app"));
  }

  #[test]
  fn unknown_keys_are_ignored_not_fatal() {
    let decoded: Result<SettingsDocument, _> = serde_json::from_str(r#"{"totallyUnknownField": 42}"#);
    assert!(decoded.is_ok());
  }
}
