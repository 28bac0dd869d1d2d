//! JS-facing surface (§6 external interfaces). `CoreError` is mapped to
//! `napi::Error` exactly once, at this boundary, via
//! `Error::from_reason(err.to_string())` — the same convention the teacher
//! crate's decoder and recorder modules use for their own library errors.

use crate::eq::{self as eq_mod, BuiltinPreset, CustomPreset, EqSettings, PresetCategory};
use crate::error::CoreError;
use crate::identity::PersistenceId;
use crate::singletons;
use napi::bindgen_prelude::*;
use napi_derive::napi;

fn map_err(err: CoreError) -> Error {
  Error::from_reason(err.to_string())
}

#[napi(object)]
pub struct EqSettingsDto {
  pub band_gains_db: Vec<f64>,
  pub is_enabled: bool,
}

impl From<&EqSettings> for EqSettingsDto {
  fn from(s: &EqSettings) -> Self {
    Self {
      band_gains_db: s.band_gains_db.iter().map(|&g| g as f64).collect(),
      is_enabled: s.is_enabled,
    }
  }
}

fn dto_to_eq_settings(dto: &EqSettingsDto) -> Result<EqSettings> {
  if dto.band_gains_db.len() != crate::constants::EQ_BAND_COUNT {
    return Err(Error::from_reason(format!("expected {} band gains, got {}", crate::constants::EQ_BAND_COUNT, dto.band_gains_db.len())));
  }
  let mut gains = [0.0f32; crate::constants::EQ_BAND_COUNT];
  for (slot, g) in gains.iter_mut().zip(dto.band_gains_db.iter()) {
    *slot = *g as f32;
  }
  Ok(EqSettings::from_gains(gains, dto.is_enabled))
}

#[napi(object)]
pub struct BuiltinPresetDto {
  pub id: String,
  pub display_name: String,
  pub category: String,
  pub band_gains_db: Vec<f64>,
}

fn category_name(category: PresetCategory) -> &'static str {
  match category {
    PresetCategory::Utility => "utility",
    PresetCategory::Speech => "speech",
    PresetCategory::Listening => "listening",
    PresetCategory::Music => "music",
    PresetCategory::Media => "media",
    PresetCategory::Headphone => "headphone",
  }
}

impl From<&BuiltinPreset> for BuiltinPresetDto {
  fn from(p: &BuiltinPreset) -> Self {
    Self {
      id: p.id.0.to_string(),
      display_name: p.display_name.to_string(),
      category: category_name(p.category).to_string(),
      band_gains_db: p.band_gains_db.iter().map(|&g| g as f64).collect(),
    }
  }
}

#[napi(object)]
pub struct CustomPresetDto {
  pub id: String,
  pub name: String,
  pub band_gains_db: Vec<f64>,
  pub updated_at_unix_ms: f64,
}

impl From<&CustomPreset> for CustomPresetDto {
  fn from(p: &CustomPreset) -> Self {
    Self {
      id: p.id.to_string(),
      name: p.name.clone(),
      band_gains_db: p.band_gains_db.iter().map(|&g| g as f64).collect(),
      updated_at_unix_ms: p.updated_at_unix_ms as f64,
    }
  }
}

#[napi]
pub fn list_builtin_eq_presets() -> Vec<BuiltinPresetDto> {
  eq_mod::builtin_presets().iter().map(BuiltinPresetDto::from).collect()
}

#[napi]
pub fn list_custom_eq_presets() -> Vec<CustomPresetDto> {
  singletons::settings_store().snapshot().custom_eq_presets.iter().map(CustomPresetDto::from).collect()
}

#[napi]
pub fn save_custom_eq_preset(name: String, band_gains_db: Vec<f64>, now_unix_ms: f64) -> Result<String> {
  if band_gains_db.len() != crate::constants::EQ_BAND_COUNT {
    return Err(Error::from_reason("wrong number of band gains".to_string()));
  }
  let mut gains = [0.0f32; crate::constants::EQ_BAND_COUNT];
  for (slot, g) in gains.iter_mut().zip(band_gains_db.iter()) {
    *slot = *g as f32;
  }

  let store = singletons::settings_store();
  let mut result = Ok(String::new());
  store.update(|doc| {
    let mut presets = crate::eq::CustomPresetStore::from_presets(doc.custom_eq_presets.clone());
    match presets.save(&name, gains, now_unix_ms as i64) {
      Ok(id) => {
        result = Ok(id.to_string());
        doc.custom_eq_presets = presets.into_presets();
      }
      Err(e) => result = Err(CoreError::CustomPreset(e)),
    }
  });
  result.map_err(map_err)
}

/// Devices currently available to this host (§6 "Device enumeration").
#[napi(object)]
pub struct AudioDeviceInfo {
  pub name: String,
  pub max_input_channels: u32,
  pub max_output_channels: u32,
  pub default_sample_rate: Option<f64>,
}

#[napi]
pub fn list_audio_devices() -> Result<Vec<AudioDeviceInfo>> {
  use cpal::traits::{DeviceTrait, HostTrait};
  let host = cpal::default_host();
  let mut devices = Vec::new();
  for device in host.devices().map_err(|e| Error::from_reason(e.to_string()))? {
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let max_input_channels = device
      .supported_input_configs()
      .ok()
      .and_then(|configs| configs.max_by_key(|cfg| cfg.channels()).map(|cfg| cfg.channels()))
      .unwrap_or(0);
    let max_output_channels = device
      .supported_output_configs()
      .ok()
      .and_then(|configs| configs.max_by_key(|cfg| cfg.channels()).map(|cfg| cfg.channels()))
      .unwrap_or(0);
    let default_sample_rate = device.default_output_config().map(|cfg| cfg.sample_rate().0 as f64).ok();

    devices.push(AudioDeviceInfo {
      name,
      max_input_channels: max_input_channels as u32,
      max_output_channels: max_output_channels as u32,
      default_sample_rate,
    });
  }
  Ok(devices)
}

/// Returns the crate version so JS can verify the native module loaded.
#[napi]
pub fn addon_version() -> String {
  env!("CARGO_PKG_VERSION").to_string()
}

#[napi]
pub async fn set_app_device(persistence_id: String, device_uid: String, is_wireless: bool) -> Result<bool> {
  let engine = singletons::engine(&device_uid);
  let outcome = engine.set_device(PersistenceId(persistence_id), &device_uid, is_wireless).await.map_err(map_err)?;
  Ok(outcome == crate::tap::SwitchOutcome::Switched)
}

#[napi]
pub fn set_app_volume(persistence_id: String, device_uid_hint: String, linear_gain: f64) {
  let engine = singletons::engine(&device_uid_hint);
  engine.set_volume(&PersistenceId(persistence_id), linear_gain as f32);
}

#[napi]
pub fn set_app_mute(persistence_id: String, device_uid_hint: String, muted: bool) {
  let engine = singletons::engine(&device_uid_hint);
  engine.set_mute(&PersistenceId(persistence_id), muted);
}

#[napi]
pub fn set_app_eq(persistence_id: String, device_uid_hint: String, settings: EqSettingsDto) -> Result<()> {
  let settings = dto_to_eq_settings(&settings)?;
  let engine = singletons::engine(&device_uid_hint);
  engine.set_eq(&PersistenceId(persistence_id), settings);
  Ok(())
}

#[napi]
pub fn flush_settings() {
  singletons::settings_store().flush_sync();
}

#[napi]
pub fn slider_to_gain(slider: f64) -> f64 {
  crate::volume::slider_to_gain(slider as f32) as f64
}

#[napi]
pub fn gain_to_slider(gain: f64) -> f64 {
  crate::volume::gain_to_slider(gain as f32) as f64
}
