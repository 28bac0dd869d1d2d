//! Core error kinds (§7).
//!
//! Internal module code returns `Result<T, CoreError>`. The FFI boundary
//! (`napi_bindings`) maps `CoreError` to `napi::Error` exactly once, the same
//! way the teacher crate's decoder and recorder modules map their own
//! library errors with `Error::from_reason(err.to_string())`.

use thiserror::Error;

/// Error kinds raised by the core. Variants marked "internal" are recovered
/// internally (destructive-switch fallback, cancellation) and must never
/// reach the UI; see the propagation policy in §7.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
  #[error("device '{0}' is not in the current device enumeration")]
  DeviceUnavailable(String),

  #[error("failed to create capture primitive: {0}")]
  CaptureCreationFailed(String),

  #[error("failed to create output aggregate: {0}")]
  AggregateCreationFailed(String),

  #[error("failed to install or start the IO callback: {0}")]
  IoRegistrationFailed(String),

  /// Internal: superseded by a newer switch. Never surfaced to the user.
  #[error("switch cancelled")]
  SwitchCancelled,

  /// Internal: warmup did not complete within its ceiling, triggers the
  /// destructive-switch fallback. Never surfaced to the user.
  #[error("switch warmup timed out")]
  SwitchWarmupTimeout,

  #[error("capture produced an unsupported format")]
  FormatIncompatible,

  #[error("settings file could not be decoded: {0}")]
  SettingsDecodeFailed(String),

  #[error("preset error: {0}")]
  CustomPreset(#[from] PresetErrorKind),

  #[error("no tap controller exists for this app")]
  NoSuchTap,

  #[error("io error: {0}")]
  Io(String),
}

impl CoreError {
  /// True for errors that are recovered internally and must not be surfaced
  /// to the user or trigger a routing revert (§7 propagation policy).
  pub fn is_internal_only(&self) -> bool {
    matches!(self, CoreError::SwitchCancelled | CoreError::SwitchWarmupTimeout)
  }
}

/// Kind-tagged custom EQ preset CRUD errors (§4.6).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PresetErrorKind {
  #[error("a name is required")]
  NameRequired,
  #[error("name exceeds 32 characters")]
  NameTooLong,
  #[error("a preset with this name already exists")]
  DuplicateName,
  #[error("maximum number of custom presets reached")]
  LimitReached,
  #[error("preset not found")]
  NotFound,
}

pub type CoreResult<T> = Result<T, CoreError>;
