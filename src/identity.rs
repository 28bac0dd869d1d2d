//! Process and device identity (§3 "Process identity", "Device").

use serde::{Deserialize, Serialize};

/// Runtime identity: OS PID plus a CoreAudio-style object ID. Changes across
/// a process restart even when the durable identity does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeIdentity {
  pub pid: u32,
  pub object_id: u32,
}

/// Durable identity keying all persisted per-app state — typically a bundle
/// identifier, falling back to an OS-provided persistent ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistenceId(pub String);

impl std::fmt::Display for PersistenceId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One entry from process enumeration (§6 "Process enumeration").
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
  pub runtime: RuntimeIdentity,
  pub display_name: String,
  pub bundle_id: Option<String>,
  pub persistence_id: PersistenceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceKind {
  Real,
  Virtual,
  Aggregate,
}

/// One entry from device enumeration (§3 "Device", §6 "Device enumeration").
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
  pub uid: String,
  pub transient_id: u32,
  pub name: String,
  pub kind: DeviceKind,
}

impl Device {
  pub fn is_real(&self) -> bool {
    self.kind == DeviceKind::Real
  }
}
