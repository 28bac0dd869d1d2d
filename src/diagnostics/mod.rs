//! RT-safe diagnostic counters and health classification (§4.3, §4.5).
//!
//! The RT callback only ever touches the atomics in [`TapCounters`], with
//! relaxed increments matching the counting style of the pack's Core Audio
//! tap callback (`callback_count.fetch_add(1, Ordering::Relaxed)`); a
//! [`DiagnosticsSnapshot`] is the only thing ever handed to the control
//! domain or the UI.

use crate::constants::{HEALTH_MIN_CALLBACKS, HEALTH_OUTPUT_PEAK_THRESHOLD, HEALTH_SILENT_VOLUME_THRESHOLD};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Bypass reasons counted when the EQ stage is skipped (§4.1 step 6).
#[derive(Debug, Clone, Copy, Default)]
pub struct EqBypassCounts {
  pub non_float: u64,
  pub channel_mismatch: u64,
  pub buffer_count_mismatch: u64,
  pub no_writable_output: u64,
  pub crossfade_active: u64,
}

/// Atomic RT counters owned by one tap controller. Every field is updated
/// only from the RT callback with relaxed ordering; reads for a snapshot use
/// acquire so the snapshot observes a consistent-enough view without ever
/// blocking the writer.
#[derive(Default)]
pub struct TapCounters {
  pub callback_count: AtomicU64,
  pub input_has_data: AtomicU64,
  pub output_written: AtomicU64,
  pub silenced_forced: AtomicU64,
  pub silenced_muted: AtomicU64,
  pub non_float_passthrough: AtomicU64,
  pub eq_applied: AtomicU64,
  pub eq_bypassed_non_float: AtomicU64,
  pub eq_bypassed_channel_mismatch: AtomicU64,
  pub eq_bypassed_buffer_count_mismatch: AtomicU64,
  pub eq_bypassed_no_writable_output: AtomicU64,
  pub eq_bypassed_crossfade_active: AtomicU64,
  /// Bit-cast `f32` of the last observed input peak.
  last_input_peak_bits: AtomicU32,
  /// Bit-cast `f32` of the last observed output peak.
  last_output_peak_bits: AtomicU32,
}

impl TapCounters {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn record_callback(&self) {
    self.callback_count.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_input_has_data(&self) {
    self.input_has_data.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_output_written(&self) {
    self.output_written.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_silenced_forced(&self) {
    self.silenced_forced.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_silenced_muted(&self) {
    self.silenced_muted.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_non_float_passthrough(&self) {
    self.non_float_passthrough.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_eq_applied(&self) {
    self.eq_applied.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_eq_bypassed(&self, reason: EqBypassReason) {
    let counter = match reason {
      EqBypassReason::NonFloat => &self.eq_bypassed_non_float,
      EqBypassReason::ChannelMismatch => &self.eq_bypassed_channel_mismatch,
      EqBypassReason::BufferCountMismatch => &self.eq_bypassed_buffer_count_mismatch,
      EqBypassReason::NoWritableOutput => &self.eq_bypassed_no_writable_output,
      EqBypassReason::CrossfadeActive => &self.eq_bypassed_crossfade_active,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub fn set_last_input_peak(&self, peak: f32) {
    self.last_input_peak_bits.store(peak.to_bits(), Ordering::Relaxed);
  }

  #[inline]
  pub fn set_last_output_peak(&self, peak: f32) {
    self.last_output_peak_bits.store(peak.to_bits(), Ordering::Relaxed);
  }

  /// Copy every counter into a plain snapshot. Never call from the RT
  /// thread; intended for the control domain or UI only.
  pub fn snapshot(&self, target_volume: f32, crossfade_active: bool) -> DiagnosticsSnapshot {
    DiagnosticsSnapshot {
      callback_count: self.callback_count.load(Ordering::Acquire),
      input_has_data: self.input_has_data.load(Ordering::Acquire),
      output_written: self.output_written.load(Ordering::Acquire),
      silenced_forced: self.silenced_forced.load(Ordering::Acquire),
      silenced_muted: self.silenced_muted.load(Ordering::Acquire),
      non_float_passthrough: self.non_float_passthrough.load(Ordering::Acquire),
      eq_applied: self.eq_applied.load(Ordering::Acquire),
      eq_bypassed: EqBypassCounts {
        non_float: self.eq_bypassed_non_float.load(Ordering::Acquire),
        channel_mismatch: self.eq_bypassed_channel_mismatch.load(Ordering::Acquire),
        buffer_count_mismatch: self.eq_bypassed_buffer_count_mismatch.load(Ordering::Acquire),
        no_writable_output: self.eq_bypassed_no_writable_output.load(Ordering::Acquire),
        crossfade_active: self.eq_bypassed_crossfade_active.load(Ordering::Acquire),
      },
      last_input_peak: f32::from_bits(self.last_input_peak_bits.load(Ordering::Acquire)),
      last_output_peak: f32::from_bits(self.last_output_peak_bits.load(Ordering::Acquire)),
      target_volume,
      crossfade_active,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub enum EqBypassReason {
  NonFloat,
  ChannelMismatch,
  BufferCountMismatch,
  NoWritableOutput,
  CrossfadeActive,
}

/// Plain-data copy of a controller's diagnostics, safe to hold past the
/// instant it was taken (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
  pub callback_count: u64,
  pub input_has_data: u64,
  pub output_written: u64,
  pub silenced_forced: u64,
  pub silenced_muted: u64,
  pub non_float_passthrough: u64,
  pub eq_applied: u64,
  pub eq_bypassed: EqBypassCounts,
  pub last_input_peak: f32,
  pub last_output_peak: f32,
  pub target_volume: f32,
  pub crossfade_active: bool,
}

impl DiagnosticsSnapshot {
  fn past_warmup(&self) -> bool {
    self.callback_count > HEALTH_MIN_CALLBACKS
  }

  /// §4.3 health classification.
  pub fn is_healthy(&self) -> bool {
    self.past_warmup()
      && self.output_written > 0
      && (self.input_has_data > 0 || self.last_input_peak > 0.0)
      && (self.target_volume <= HEALTH_SILENT_VOLUME_THRESHOLD || self.last_output_peak > HEALTH_OUTPUT_PEAK_THRESHOLD)
  }

  /// Bundle-mode failure signature: callbacks and writes are happening but
  /// nothing audible ever reaches the output.
  pub fn has_dead_output(&self) -> bool {
    self.past_warmup() && self.output_written > 0 && self.last_output_peak == 0.0
  }

  /// Per-process fallback failure signature: callbacks are happening but no
  /// input is ever observed.
  pub fn has_dead_input(&self) -> bool {
    self.past_warmup() && self.input_has_data == 0 && self.last_input_peak == 0.0
  }
}
