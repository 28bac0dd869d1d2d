//! State shared between the RT callback and the control domain for one tap
//! controller (§9 "Ownership in the tap controller ↔ engine relationship").
//!
//! Everything the RT thread reads is either a plain atomic scalar or an
//! `Arc` swapped under a `parking_lot::RwLock` — the same primitive the
//! teacher's own output callback already locks from inside `cpal`'s RT
//! thread (`audio_engine.rs`'s `state_for_audio.lock()`), so taking a read
//! lock here for the rarely-written EQ coefficient block follows established
//! precedent in this codebase rather than inventing a new RT-safety idiom.

use crate::dsp::biquad::BiquadCoefficients;
use crate::constants::EQ_BAND_COUNT;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub type CoeffBlock = [BiquadCoefficients; EQ_BAND_COUNT];

fn default_coeffs() -> Arc<CoeffBlock> {
  Arc::new([BiquadCoefficients::default(); EQ_BAND_COUNT])
}

/// Atomic f32 cell, bit-cast through an `AtomicU32` (the only lock-free
/// float representation stable Rust offers).
struct AtomicF32(AtomicU32);

impl AtomicF32 {
  fn new(v: f32) -> Self {
    Self(AtomicU32::new(v.to_bits()))
  }

  #[inline]
  fn load(&self, order: Ordering) -> f32 {
    f32::from_bits(self.0.load(order))
  }

  #[inline]
  fn store(&self, v: f32, order: Ordering) {
    self.0.store(v.to_bits(), order);
  }
}

/// Scalars the RT callback reads every call, and the control domain writes
/// whenever the user changes a setting or the switch state machine advances.
pub struct TapSharedState {
  target_volume: AtomicF32,
  muted: AtomicBool,
  eq_enabled: AtomicBool,
  forced_silence: AtomicBool,
  crossfade_active: AtomicBool,
  primary_multiplier: AtomicF32,
  secondary_multiplier: AtomicF32,
  eq_coeffs: RwLock<Arc<CoeffBlock>>,
}

impl TapSharedState {
  pub fn new(initial_volume: f32) -> Self {
    Self {
      target_volume: AtomicF32::new(initial_volume),
      muted: AtomicBool::new(false),
      eq_enabled: AtomicBool::new(false),
      forced_silence: AtomicBool::new(false),
      crossfade_active: AtomicBool::new(false),
      primary_multiplier: AtomicF32::new(1.0),
      secondary_multiplier: AtomicF32::new(0.0),
      eq_coeffs: RwLock::new(default_coeffs()),
    }
  }

  pub fn set_target_volume(&self, v: f32) {
    self.target_volume.store(v, Ordering::Relaxed);
  }

  pub fn target_volume(&self) -> f32 {
    self.target_volume.load(Ordering::Relaxed)
  }

  pub fn set_muted(&self, v: bool) {
    self.muted.store(v, Ordering::Relaxed);
  }

  pub fn is_muted(&self) -> bool {
    self.muted.load(Ordering::Relaxed)
  }

  pub fn set_eq_enabled(&self, v: bool) {
    self.eq_enabled.store(v, Ordering::Relaxed);
  }

  pub fn is_eq_enabled(&self) -> bool {
    self.eq_enabled.load(Ordering::Relaxed)
  }

  pub fn set_forced_silence(&self, v: bool) {
    self.forced_silence.store(v, Ordering::Relaxed);
  }

  pub fn is_forced_silence(&self) -> bool {
    self.forced_silence.load(Ordering::Relaxed)
  }

  pub fn set_crossfade_active(&self, v: bool) {
    self.crossfade_active.store(v, Ordering::Relaxed);
  }

  pub fn is_crossfade_active(&self) -> bool {
    self.crossfade_active.load(Ordering::Relaxed)
  }

  pub fn set_multipliers(&self, primary: f32, secondary: f32) {
    self.primary_multiplier.store(primary, Ordering::Relaxed);
    self.secondary_multiplier.store(secondary, Ordering::Relaxed);
  }

  pub fn multipliers(&self) -> (f32, f32) {
    (self.primary_multiplier.load(Ordering::Relaxed), self.secondary_multiplier.load(Ordering::Relaxed))
  }

  /// Swap in a freshly computed coefficient block. The RT thread keeps
  /// using whatever `Arc` it already holds until its next callback, at
  /// which point it re-reads the lock and gets the new block; the old
  /// block is reclaimed by `Arc`'s refcount once the RT thread drops its
  /// reference, satisfying the generation-reclaim note in §9.
  pub fn swap_eq_coefficients(&self, coeffs: CoeffBlock) {
    *self.eq_coeffs.write() = Arc::new(coeffs);
  }

  pub fn eq_coefficients(&self) -> Arc<CoeffBlock> {
    self.eq_coeffs.read().clone()
  }
}
