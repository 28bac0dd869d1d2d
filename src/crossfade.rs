//! Crossfade state machine (§4.2).
//!
//! A pure, value-semantic struct: no I/O, no allocation. Mirrors the shape
//! of the teacher crate's own `CrossfadeState` (deck-to-deck auto crossfade
//! in `audio_engine.rs`), generalized to the two-phase warmup/crossfade
//! protocol this system needs for gapless device migration.

use crate::constants::{CROSSFADE_DURATION, WARMUP_COMPLETE_SAMPLES};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeStage {
  Idle,
  WarmingUp,
  Crossfading,
}

/// Crossfade progress and phase, owned by a tap controller and read on its
/// RT thread (see §3 Ownership).
#[derive(Debug, Clone, Copy)]
pub struct CrossfadeState {
  stage: CrossfadeStage,
  progress: f32,
  secondary_samples_observed: u64,
  total_samples_for_crossfade: u64,
}

impl Default for CrossfadeState {
  fn default() -> Self {
    Self {
      stage: CrossfadeStage::Idle,
      progress: 0.0,
      secondary_samples_observed: 0,
      total_samples_for_crossfade: 0,
    }
  }
}

impl CrossfadeState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stage(&self) -> CrossfadeStage {
    self.stage
  }

  pub fn is_active(&self) -> bool {
    !matches!(self.stage, CrossfadeStage::Idle)
  }

  pub fn progress(&self) -> f32 {
    self.progress
  }

  /// Begin a fresh migration: transitions to `WarmingUp`, resetting
  /// progress, the samples-observed counter, and the crossfade duration
  /// derived from `sample_rate` (§4.2 `begin`).
  pub fn begin(&mut self, sample_rate: u32) {
    self.stage = CrossfadeStage::WarmingUp;
    self.progress = 0.0;
    self.secondary_samples_observed = 0;
    self.total_samples_for_crossfade =
      (sample_rate as f64 * CROSSFADE_DURATION.as_secs_f64()).ceil() as u64;
  }

  /// `WarmingUp -> Crossfading`; resets progress and the samples-observed
  /// counter so the crossfade timeline starts at zero the instant both
  /// streams are audible (§4.2 `beginCrossfading`).
  pub fn begin_crossfading(&mut self) {
    self.stage = CrossfadeStage::Crossfading;
    self.progress = 0.0;
    self.secondary_samples_observed = 0;
  }

  /// Advance the samples-observed counter. While `Crossfading`, also
  /// advances progress toward 1.0. Returns the (possibly unchanged)
  /// progress (§4.2 `updateProgress`).
  pub fn update_progress(&mut self, samples: u64) -> f32 {
    match self.stage {
      CrossfadeStage::WarmingUp => {
        self.secondary_samples_observed += samples;
      }
      CrossfadeStage::Crossfading => {
        self.secondary_samples_observed += samples;
        if self.total_samples_for_crossfade > 0 {
          self.progress = (self.secondary_samples_observed as f32
            / self.total_samples_for_crossfade as f32)
            .clamp(0.0, 1.0);
        } else {
          self.progress = 1.0;
        }
      }
      CrossfadeStage::Idle => {}
    }
    self.progress
  }

  /// Reset to `Idle`. Clears progress, samples-observed, and the crossfade
  /// duration (§4.2 `complete`).
  pub fn complete(&mut self) {
    self.stage = CrossfadeStage::Idle;
    self.progress = 0.0;
    self.secondary_samples_observed = 0;
    self.total_samples_for_crossfade = 0;
  }

  pub fn is_warmup_complete(&self) -> bool {
    self.secondary_samples_observed >= WARMUP_COMPLETE_SAMPLES
  }

  pub fn is_crossfade_complete(&self) -> bool {
    self.progress >= 1.0
  }

  /// Derive (primary_multiplier, secondary_multiplier) from the current
  /// stage and progress (§3 "Crossfade state"). At full `Crossfading`
  /// progress this already evaluates to (0.0, 1.0) via the equal-power
  /// curve, so no separate post-completion state is needed before
  /// `complete()` promotes the secondary and resets to steady Idle.
  pub fn multipliers(&self) -> (f32, f32) {
    match self.stage {
      CrossfadeStage::Idle => (1.0, 1.0),
      CrossfadeStage::WarmingUp => (1.0, 0.0),
      CrossfadeStage::Crossfading => {
        let theta = self.progress * PI / 2.0;
        (theta.cos(), theta.sin())
      }
    }
  }

  pub fn total_samples_for_crossfade(&self) -> u64 {
    self.total_samples_for_crossfade
  }

  pub fn secondary_samples_observed(&self) -> u64 {
    self.secondary_samples_observed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn idle_starts_at_full_gain() {
    let s = CrossfadeState::new();
    assert_eq!(s.multipliers(), (1.0, 1.0));
    assert!(!s.is_active());
  }

  #[test]
  fn warming_up_keeps_primary_full_secondary_silent() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    assert_eq!(s.stage(), CrossfadeStage::WarmingUp);
    assert_eq!(s.multipliers(), (1.0, 0.0));
  }

  #[test]
  fn progress_does_not_advance_while_warming_up() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    let p = s.update_progress(10_000);
    assert_eq!(p, 0.0);
    assert_eq!(s.progress(), 0.0);
    assert!(s.secondary_samples_observed() >= 10_000);
  }

  #[test]
  fn warmup_complete_threshold() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    assert!(!s.is_warmup_complete());
    s.update_progress(2047);
    assert!(!s.is_warmup_complete());
    s.update_progress(1);
    assert!(s.is_warmup_complete());
  }

  #[test]
  fn crossfade_is_equal_power_and_conserves_energy() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    s.begin_crossfading();
    let total = s.total_samples_for_crossfade();
    assert!(total > 0);

    let mut prev_progress = 0.0;
    for step in 0..=10 {
      let samples = total / 10;
      let p = s.update_progress(samples);
      assert!(p >= prev_progress);
      prev_progress = p;
      let (pm, sm) = s.multipliers();
      assert!(pm.is_finite() && pm >= 0.0);
      assert!(sm.is_finite() && sm >= 0.0);
      let energy = pm * pm + sm * sm;
      assert!((energy - 1.0).abs() < 1e-4, "step {step}: energy {energy}");
    }
    assert!(s.is_crossfade_complete());
  }

  #[test]
  fn full_progress_already_silences_primary_before_complete_runs() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    s.begin_crossfading();
    let total = s.total_samples_for_crossfade();
    s.update_progress(total);
    assert!(s.is_crossfade_complete());
    // Still `Crossfading` at this instant, but the equal-power curve has
    // already converged to (~0.0, 1.0) on its own.
    let (primary, secondary) = s.multipliers();
    assert!(primary.abs() < 1e-6, "primary {primary}");
    assert!((secondary - 1.0).abs() < 1e-6, "secondary {secondary}");
    s.complete();
    assert_eq!(s.stage(), CrossfadeStage::Idle);
    assert_eq!(s.multipliers(), (1.0, 1.0));
  }

  #[test]
  fn mid_crossfade_abort_then_restart_has_no_carry_over() {
    let mut s = CrossfadeState::new();
    s.begin(48_000);
    s.begin_crossfading();
    let total = s.total_samples_for_crossfade();
    s.update_progress(total / 2);
    assert!(s.progress() > 0.0 && s.progress() < 1.0);

    s.complete();
    assert_eq!(s.multipliers(), (1.0, 1.0));

    s.begin(48_000);
    s.begin_crossfading();
    let (_, secondary) = s.multipliers();
    assert_eq!(secondary, 0.0, "secondary multiplier must not carry over");
    assert_eq!(s.progress(), 0.0);
  }
}
