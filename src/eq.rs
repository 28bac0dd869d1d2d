//! EQ settings, built-in preset catalog, and custom preset CRUD (§4.6).
//!
//! Coefficient math lives in [`crate::dsp::biquad`]; this module owns the
//! user-facing model: per-app EQ state, the fixed built-in curves, and the
//! validated custom-preset store, in the spirit of the teacher's
//! `eq_processor.rs` band model but generalized from 3 fixed DJ bands to a
//! 10-band graphic EQ with named presets.

use crate::constants::{EQ_BAND_COUNT, EQ_BAND_GAIN_MAX_DB, EQ_BAND_GAIN_MIN_DB, MAX_CUSTOM_PRESETS, PRESET_NAME_MAX_LEN, PRESET_NAME_MIN_LEN};
use crate::error::PresetErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-app EQ state: 10 band gains in dB plus an enabled flag (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
  pub band_gains_db: [f32; EQ_BAND_COUNT],
  pub is_enabled: bool,
}

impl Default for EqSettings {
  fn default() -> Self {
    Self {
      band_gains_db: [0.0; EQ_BAND_COUNT],
      is_enabled: false,
    }
  }
}

impl EqSettings {
  pub fn flat(is_enabled: bool) -> Self {
    Self {
      band_gains_db: [0.0; EQ_BAND_COUNT],
      is_enabled,
    }
  }

  pub fn from_gains(band_gains_db: [f32; EQ_BAND_COUNT], is_enabled: bool) -> Self {
    let mut clamped = band_gains_db;
    for g in clamped.iter_mut() {
      *g = g.clamp(EQ_BAND_GAIN_MIN_DB, EQ_BAND_GAIN_MAX_DB);
    }
    Self {
      band_gains_db: clamped,
      is_enabled,
    }
  }
}

/// A built-in, non-editable EQ curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinPresetId(pub &'static str);

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinPreset {
  pub id: BuiltinPresetId,
  pub display_name: &'static str,
  pub category: PresetCategory,
  pub band_gains_db: [f32; EQ_BAND_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetCategory {
  Utility,
  Speech,
  Listening,
  Music,
  Media,
  Headphone,
}

macro_rules! preset {
  ($id:literal, $name:literal, $cat:expr, [$($g:expr),* $(,)?]) => {
    BuiltinPreset {
      id: BuiltinPresetId($id),
      display_name: $name,
      category: $cat,
      band_gains_db: [$($g),*],
    }
  };
}

/// The fixed catalog of 20 built-in curves plus the 3 headphone A/B
/// profiles, in category order. Band order matches
/// `crate::constants::EQ_BAND_FREQUENCIES`.
pub fn builtin_presets() -> &'static [BuiltinPreset] {
  use PresetCategory::*;
  static PRESETS: once_cell::sync::Lazy<Vec<BuiltinPreset>> = once_cell::sync::Lazy::new(|| {
    vec![
      preset!("flat", "Flat", Utility, [0.0; 10]),
      preset!("loudness", "Loudness", Utility, [6.0, 5.0, 3.0, 1.0, 0.0, 0.0, 1.0, 3.0, 5.0, 6.0]),
      preset!("night_mode", "Night Mode", Utility, [-4.0, -3.0, -2.0, -1.0, 0.0, 0.0, -1.0, -2.0, -3.0, -4.0]),
      preset!("treble_boost", "Treble Boost", Utility, [0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 7.0, 8.0]),
      preset!("bass_boost", "Bass Boost", Utility, [8.0, 7.0, 6.0, 3.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
      preset!("voice_clarity", "Voice Clarity", Speech, [-3.0, -3.0, -2.0, 0.0, 3.0, 5.0, 4.0, 2.0, 0.0, -2.0]),
      preset!("podcast", "Podcast", Speech, [-2.0, -2.0, 0.0, 2.0, 4.0, 4.0, 3.0, 1.0, 0.0, -1.0]),
      preset!("phone_call", "Phone Call", Speech, [-6.0, -4.0, -1.0, 2.0, 4.0, 4.0, 2.0, 0.0, -2.0, -4.0]),
      preset!("audiobook", "Audiobook", Speech, [-1.0, -1.0, 0.0, 1.0, 3.0, 3.0, 2.0, 0.0, -1.0, -2.0]),
      preset!("late_night_listening", "Late Night Listening", Listening, [-5.0, -4.0, -2.0, -1.0, 0.0, 0.0, -1.0, -2.0, -3.0, -4.0]),
      preset!("small_speakers", "Small Speakers", Listening, [6.0, 5.0, 3.0, 0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 1.0]),
      preset!("laptop_speakers", "Laptop Speakers", Listening, [7.0, 6.0, 4.0, 1.0, 0.0, 0.0, 1.0, 3.0, 3.0, 2.0]),
      preset!("outdoor", "Outdoor", Listening, [4.0, 3.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0]),
      preset!("acoustic", "Acoustic", Music, [2.0, 2.0, 1.0, 0.0, 0.0, 1.0, 2.0, 2.0, 3.0, 3.0]),
      preset!("electronic", "Electronic", Music, [6.0, 5.0, 2.0, 0.0, -1.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
      preset!("hip_hop", "Hip-Hop", Music, [7.0, 6.0, 3.0, 0.0, -1.0, 0.0, 1.0, 2.0, 2.0, 1.0]),
      preset!("classical", "Classical", Music, [3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]),
      preset!("jazz", "Jazz", Music, [3.0, 2.0, 1.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0]),
      preset!("movie", "Movie", Media, [5.0, 4.0, 2.0, 0.0, 1.0, 2.0, 2.0, 1.0, 2.0, 4.0]),
      preset!("video_call", "Video Call", Media, [-3.0, -2.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -3.0]),
      preset!("headphone_clarity", "Clarity", Headphone, [2.0, 1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0]),
      preset!("headphone_reference", "Reference", Headphone, [0.0; 10]),
      preset!("headphone_vocal_focus", "Vocal Focus", Headphone, [-2.0, -1.0, 0.0, 1.0, 3.0, 4.0, 4.0, 3.0, 1.0, 0.0]),
    ]
  });
  &PRESETS
}

pub fn find_builtin_preset(id: &str) -> Option<&'static BuiltinPreset> {
  builtin_presets().iter().find(|p| p.id.0 == id)
}

/// A user-saved custom EQ preset (§3, §6 `customEQPresets`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPreset {
  pub id: Uuid,
  pub name: String,
  pub band_gains_db: [f32; EQ_BAND_COUNT],
  pub updated_at_unix_ms: i64,
}

/// Strips a Latin-1 accented letter down to its base form, leaving all
/// other characters untouched.
fn strip_diacritic(c: char) -> char {
  match c {
    'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
    'è' | 'é' | 'ê' | 'ë' => 'e',
    'ì' | 'í' | 'î' | 'ï' => 'i',
    'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
    'ù' | 'ú' | 'û' | 'ü' => 'u',
    'ý' | 'ÿ' => 'y',
    'ñ' => 'n',
    'ç' => 'c',
    other => other,
  }
}

/// Case- and diacritic-insensitive comparison key for preset names (§4.6,
/// §8), so "Café" and "cafe" collide.
fn name_fold_key(name: &str) -> String {
  name.chars().flat_map(char::to_lowercase).map(strip_diacritic).collect()
}

/// Validates and trims a candidate preset name; does not check uniqueness.
fn validate_name(raw: &str) -> Result<String, PresetErrorKind> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(PresetErrorKind::NameRequired);
  }
  if trimmed.chars().count() > PRESET_NAME_MAX_LEN || trimmed.chars().count() < PRESET_NAME_MIN_LEN {
    return Err(PresetErrorKind::NameTooLong);
  }
  Ok(trimmed.to_string())
}

/// In-memory custom-preset collection backing `customEQPresets`. Pure state;
/// persistence is handled by the settings module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomPresetStore {
  presets: Vec<CustomPreset>,
}

impl CustomPresetStore {
  pub fn from_presets(presets: Vec<CustomPreset>) -> Self {
    Self { presets }
  }

  pub fn presets(&self) -> &[CustomPreset] {
    &self.presets
  }

  pub fn into_presets(self) -> Vec<CustomPreset> {
    self.presets
  }

  fn find_duplicate(&self, name_key: &str, excluding_id: Option<Uuid>) -> bool {
    self
      .presets
      .iter()
      .any(|p| Some(p.id) != excluding_id && name_fold_key(&p.name) == name_key)
  }

  /// Save a new custom preset. `now_unix_ms` is supplied by the caller so
  /// this module stays free of wall-clock access.
  pub fn save(
    &mut self,
    name: &str,
    band_gains_db: [f32; EQ_BAND_COUNT],
    now_unix_ms: i64,
  ) -> Result<Uuid, PresetErrorKind> {
    let trimmed = validate_name(name)?;
    let key = name_fold_key(&trimmed);
    if self.find_duplicate(&key, None) {
      return Err(PresetErrorKind::DuplicateName);
    }
    if self.presets.len() >= MAX_CUSTOM_PRESETS {
      return Err(PresetErrorKind::LimitReached);
    }
    let id = Uuid::new_v4();
    let mut gains = band_gains_db;
    for g in gains.iter_mut() {
      *g = g.clamp(EQ_BAND_GAIN_MIN_DB, EQ_BAND_GAIN_MAX_DB);
    }
    self.presets.push(CustomPreset {
      id,
      name: trimmed,
      band_gains_db: gains,
      updated_at_unix_ms: now_unix_ms,
    });
    Ok(id)
  }

  /// Overwrite an existing preset's gains, keeping its name and id.
  pub fn overwrite(
    &mut self,
    id: Uuid,
    band_gains_db: [f32; EQ_BAND_COUNT],
    now_unix_ms: i64,
  ) -> Result<(), PresetErrorKind> {
    let preset = self.presets.iter_mut().find(|p| p.id == id).ok_or(PresetErrorKind::NotFound)?;
    let mut gains = band_gains_db;
    for g in gains.iter_mut() {
      *g = g.clamp(EQ_BAND_GAIN_MIN_DB, EQ_BAND_GAIN_MAX_DB);
    }
    preset.band_gains_db = gains;
    preset.updated_at_unix_ms = now_unix_ms;
    Ok(())
  }

  pub fn rename(&mut self, id: Uuid, new_name: &str, now_unix_ms: i64) -> Result<(), PresetErrorKind> {
    let trimmed = validate_name(new_name)?;
    let key = name_fold_key(&trimmed);
    if self.find_duplicate(&key, Some(id)) {
      return Err(PresetErrorKind::DuplicateName);
    }
    let preset = self.presets.iter_mut().find(|p| p.id == id).ok_or(PresetErrorKind::NotFound)?;
    preset.name = trimmed;
    preset.updated_at_unix_ms = now_unix_ms;
    Ok(())
  }

  pub fn delete(&mut self, id: Uuid) -> Result<(), PresetErrorKind> {
    let before = self.presets.len();
    self.presets.retain(|p| p.id != id);
    if self.presets.len() == before {
      return Err(PresetErrorKind::NotFound);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_has_twenty_plus_three_headphone_profiles() {
    let presets = builtin_presets();
    let headphone_count = presets.iter().filter(|p| p.category == PresetCategory::Headphone).count();
    assert_eq!(headphone_count, 3);
    assert_eq!(presets.len(), 23);
  }

  #[test]
  fn builtin_gains_within_clamp() {
    for p in builtin_presets() {
      for g in p.band_gains_db {
        assert!((EQ_BAND_GAIN_MIN_DB..=EQ_BAND_GAIN_MAX_DB).contains(&g), "{}: {g}", p.display_name);
      }
    }
  }

  #[test]
  fn headphone_progression_is_monotonic() {
    let clarity = find_builtin_preset("headphone_clarity").unwrap();
    let reference = find_builtin_preset("headphone_reference").unwrap();
    let vocal = find_builtin_preset("headphone_vocal_focus").unwrap();
    // Bass = band 0, presence = band 7 (4 kHz).
    assert!(clarity.band_gains_db[0] > reference.band_gains_db[0]);
    assert!(reference.band_gains_db[0] > vocal.band_gains_db[0]);
    assert!(clarity.band_gains_db[7] < reference.band_gains_db[7]);
    assert!(reference.band_gains_db[7] < vocal.band_gains_db[7]);
  }

  #[test]
  fn save_rejects_blank_name() {
    let mut store = CustomPresetStore::default();
    let err = store.save("   ", [0.0; 10], 0).unwrap_err();
    assert_eq!(err, PresetErrorKind::NameRequired);
  }

  #[test]
  fn save_trims_and_dedups_case_insensitively() {
    let mut store = CustomPresetStore::default();
    store.save("My Preset", [1.0; 10], 0).unwrap();
    let err = store.save("  my preset  ", [2.0; 10], 1).unwrap_err();
    assert_eq!(err, PresetErrorKind::DuplicateName);
  }

  #[test]
  fn save_enforces_limit() {
    let mut store = CustomPresetStore::default();
    for i in 0..MAX_CUSTOM_PRESETS {
      store.save(&format!("Preset {i}"), [0.0; 10], 0).unwrap();
    }
    let err = store.save("One More", [0.0; 10], 0).unwrap_err();
    assert_eq!(err, PresetErrorKind::LimitReached);
  }

  #[test]
  fn rename_allows_self_but_rejects_other_duplicate() {
    let mut store = CustomPresetStore::default();
    let a = store.save("Alpha", [0.0; 10], 0).unwrap();
    store.save("Beta", [0.0; 10], 0).unwrap();
    assert!(store.rename(a, "alpha", 1).is_ok());
    assert_eq!(store.rename(a, "beta", 1).unwrap_err(), PresetErrorKind::DuplicateName);
  }

  #[test]
  fn delete_missing_reports_not_found() {
    let mut store = CustomPresetStore::default();
    assert_eq!(store.delete(Uuid::new_v4()).unwrap_err(), PresetErrorKind::NotFound);
  }

  #[test]
  fn overwrite_clamps_gains() {
    let mut store = CustomPresetStore::default();
    let id = store.save("Clamped", [0.0; 10], 0).unwrap();
    store.overwrite(id, [100.0; 10], 1).unwrap();
    assert_eq!(store.presets()[0].band_gains_db[0], EQ_BAND_GAIN_MAX_DB);
  }
}
