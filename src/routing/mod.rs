//! In-memory routing map and display-device resolution (§3 "Routing state",
//! §4.4 "Display resolution").

use crate::identity::{Device, PersistenceId};
use std::collections::HashMap;

/// Runtime-PID → target-device-UID map. Distinct from the persisted routing
/// held in the settings document; the two may transiently diverge during a
/// switch and are reconciled per §4.4's per-app switch protocol.
#[derive(Debug, Clone, Default)]
pub struct RoutingMap {
  entries: HashMap<PersistenceId, String>,
}

impl RoutingMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, app: &PersistenceId) -> Option<&str> {
    self.entries.get(app).map(String::as_str)
  }

  pub fn set(&mut self, app: PersistenceId, device_uid: String) {
    self.entries.insert(app, device_uid);
  }

  pub fn remove(&mut self, app: &PersistenceId) -> Option<String> {
    self.entries.remove(app)
  }

  pub fn contains(&self, app: &PersistenceId, device_uid: &str) -> bool {
    self.entries.get(app).map(|v| v == device_uid).unwrap_or(false)
  }
}

/// §4.4 `resolveDisplayDevice`: the device UID the UI row should display,
/// in priority order. Preserves the visible device name across a brief
/// disappearance instead of flipping to the default device and back.
pub fn resolve_display_device(in_memory_routing: Option<&str>, persisted_routing: Option<&str>, available_devices: &[Device], default_uid: &str) -> String {
  let is_available = |uid: &str| available_devices.iter().any(|d| d.uid == uid);

  if let Some(uid) = in_memory_routing {
    if is_available(uid) {
      return uid.to_string();
    }
  }
  if let Some(uid) = persisted_routing {
    if is_available(uid) {
      return uid.to_string();
    }
  }
  if let Some(uid) = in_memory_routing {
    return uid.to_string();
  }
  if let Some(uid) = persisted_routing {
    return uid.to_string();
  }
  if is_available(default_uid) {
    return default_uid.to_string();
  }
  available_devices.first().map(|d| d.uid.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::DeviceKind;

  fn device(uid: &str) -> Device {
    Device { uid: uid.to_string(), transient_id: 0, name: uid.to_string(), kind: DeviceKind::Real }
  }

  #[test]
  fn prefers_in_memory_routing_when_available() {
    let available = vec![device("a"), device("b")];
    let result = resolve_display_device(Some("a"), Some("b"), &available, "b");
    assert_eq!(result, "a");
  }

  #[test]
  fn falls_back_to_persisted_when_in_memory_unavailable() {
    let available = vec![device("b")];
    let result = resolve_display_device(Some("a"), Some("b"), &available, "b");
    assert_eq!(result, "b");
  }

  #[test]
  fn display_fallback_keeps_disappeared_in_memory_device() {
    // Scenario 5: "airpods" routed but temporarily unavailable, and no
    // persisted routing to fall back to.
    let available = vec![device("built_in_speakers")];
    let result = resolve_display_device(Some("airpods"), None, &available, "built_in_speakers");
    assert_eq!(result, "airpods");
  }

  #[test]
  fn falls_back_to_default_when_nothing_routed() {
    let available = vec![device("built_in_speakers")];
    let result = resolve_display_device(None, None, &available, "built_in_speakers");
    assert_eq!(result, "built_in_speakers");
  }

  #[test]
  fn falls_back_to_first_available_when_default_unavailable() {
    let available = vec![device("only_device")];
    let result = resolve_display_device(None, None, &available, "missing_default");
    assert_eq!(result, "only_device");
  }

  #[test]
  fn empty_available_list_returns_empty_string() {
    let result = resolve_display_device(None, None, &[], "missing");
    assert_eq!(result, "");
  }

  #[test]
  fn display_survives_brief_device_disappearance() {
    // A Bluetooth headset briefly drops out of enumeration. The display row
    // should keep showing it rather than flash over to the system default
    // and back.
    let available_with_headset = vec![device("airpods"), device("built_in_speakers")];
    let shown = resolve_display_device(Some("airpods"), None, &available_with_headset, "built_in_speakers");
    assert_eq!(shown, "airpods");

    let available_without_headset = vec![device("built_in_speakers")];
    let shown_during_dropout = resolve_display_device(Some("airpods"), None, &available_without_headset, "built_in_speakers");
    assert_eq!(shown_during_dropout, "airpods", "display must not flip to default while the routed device is merely absent from this enumeration");
  }

  #[test]
  fn routing_map_contains_checks_current_mapping() {
    let mut map = RoutingMap::new();
    let app = PersistenceId("com.example.app".to_string());
    map.set(app.clone(), "device_a".to_string());
    assert!(map.contains(&app, "device_a"));
    assert!(!map.contains(&app, "device_b"));
  }
}
