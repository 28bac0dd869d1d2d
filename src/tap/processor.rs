//! RT callback contract (§4.3 "RT callback contract"): the pure per-call
//! step sequence, independent of any particular capture/output backend so
//! it can be driven directly in tests.

use super::shared::TapSharedState;
use crate::diagnostics::{EqBypassReason, TapCounters};
use crate::dsp::biquad::BiquadCascade;
use crate::dsp::buffer::{AudioBufferView, AudioBufferViewMut};
use crate::dsp::{copy, peak, soft_limit, zero, GainRamp};
use std::sync::Arc;

/// Which side of a crossfade this processor's output represents. A
/// non-crossfading tap is always `Primary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeSide {
  Primary,
  Secondary,
}

/// Per-callback RT state a tap controller owns exclusively: the gain ramp
/// and biquad cascade are mutable filter state that must not be touched by
/// any other thread, so they live here rather than in `TapSharedState`.
pub struct TapRtProcessor {
  shared: Arc<TapSharedState>,
  counters: Arc<TapCounters>,
  ramp: GainRamp,
  cascade: BiquadCascade,
  side: CrossfadeSide,
}

impl TapRtProcessor {
  pub fn new(shared: Arc<TapSharedState>, counters: Arc<TapCounters>, channel_count: usize, sample_rate: u32, side: CrossfadeSide) -> Self {
    Self {
      ramp: GainRamp::new(shared.target_volume(), sample_rate),
      cascade: BiquadCascade::new(channel_count),
      shared,
      counters,
      side,
    }
  }

  /// Runs the 8-step RT contract for one callback. `input` may be absent
  /// when the format is known to be non-float upstream (step 4); when
  /// present it is assumed to already be float PCM (format negotiation
  /// happens at capture-open time, never per callback).
  pub fn process(&mut self, input: &AudioBufferView, output: &mut AudioBufferViewMut) {
    self.counters.record_callback();
    if peak(input) > 0.0 {
      self.counters.record_input_has_data();
    }

    if self.shared.is_forced_silence() {
      zero(output);
      self.counters.record_silenced_forced();
      return;
    }

    if self.shared.is_muted() {
      zero(output);
      self.counters.record_silenced_muted();
      return;
    }

    self.ramp.set_target(self.shared.target_volume());
    if self.ramp.target() <= 0.0 && self.ramp.current() < 1e-4 {
      zero(output);
      return;
    }

    let eq_enabled = self.shared.is_eq_enabled();
    let crossfade_active = self.shared.is_crossfade_active();
    let channels_match = input.channel_count() == output.channel_count() && input.channel_count() == self.cascade.channel_count();

    let mut scratch: Vec<f32> = Vec::new();
    let eq_ran = if eq_enabled {
      if input.is_empty() {
        self.counters.record_eq_bypassed(EqBypassReason::NoWritableOutput);
        false
      } else if crossfade_active {
        self.counters.record_eq_bypassed(EqBypassReason::CrossfadeActive);
        false
      } else if !channels_match {
        self.counters.record_eq_bypassed(EqBypassReason::ChannelMismatch);
        false
      } else {
        scratch = self.copy_to_scratch(input);
        let coeffs = self.shared.eq_coefficients();
        let frames = input.frame_count();
        let channel_count = input.channel_count();
        for frame in 0..frames {
          for ch in 0..channel_count {
            let idx = frame * channel_count + ch;
            scratch[idx] = self.cascade.process_sample(ch, scratch[idx], &coeffs);
          }
        }
        self.counters.record_eq_applied();
        true
      }
    } else {
      false
    };

    let (primary_mult, secondary_mult) = self.shared.multipliers();
    let crossfade_mult = match self.side {
      CrossfadeSide::Primary => primary_mult,
      CrossfadeSide::Secondary => secondary_mult,
    };

    let source: &[f32] = if eq_ran { &scratch } else { self.as_interleaved_slice(input) };
    let channel_count = output.channel_count();
    let frames = output.frame_count().min(if channel_count == 0 { 0 } else { source.len() / channel_count.max(1) });

    let limiter_active = self.ramp.target() > 1.0;
    for frame in 0..frames {
      let gain = self.ramp.next_gain() * crossfade_mult;
      for ch in 0..channel_count {
        let idx = frame * channel_count + ch;
        let sample = source.get(idx).copied().unwrap_or(0.0) * gain;
        output.set_sample(ch, frame, if limiter_active { soft_limit(sample) } else { sample });
      }
    }

    self.counters.set_last_input_peak(peak(input));
    let out_view = AudioBufferView::Interleaved {
      data: &self.output_snapshot(output),
      channels: output.channel_count(),
    };
    let out_peak = peak(&out_view);
    self.counters.set_last_output_peak(out_peak);
    if out_peak > 0.0 {
      self.counters.record_output_written();
    }
  }

  fn copy_to_scratch(&self, view: &AudioBufferView) -> Vec<f32> {
    let channels = view.channel_count();
    let frames = view.frame_count();
    let mut out = vec![0.0f32; channels * frames];
    {
      let mut dst = AudioBufferViewMut::Interleaved { data: &mut out, channels };
      copy(view, &mut dst);
    }
    out
  }

  /// Non-float-passthrough helper (§4.1 step 4): caller detected a
  /// non-float capture format and wants a straight copy with no gain/EQ.
  pub fn passthrough(&mut self, input: &AudioBufferView, output: &mut AudioBufferViewMut) {
    self.counters.record_callback();
    copy(input, output);
    self.counters.record_non_float_passthrough();
  }

  fn as_interleaved_slice<'a>(&self, view: &'a AudioBufferView<'a>) -> &'a [f32] {
    match view {
      AudioBufferView::Interleaved { data, .. } => data,
      AudioBufferView::Planar { .. } => &[],
    }
  }

  fn output_snapshot(&self, view: &AudioBufferViewMut) -> Vec<f32> {
    let channels = view.channel_count();
    let frames = view.frame_count();
    let mut out = Vec::with_capacity(channels * frames);
    for frame in 0..frames {
      for ch in 0..channels {
        out.push(view.sample(ch, frame));
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dsp::biquad::peaking_coefficients;

  fn processor(side: CrossfadeSide) -> (Arc<TapSharedState>, Arc<TapCounters>, TapRtProcessor) {
    let shared = Arc::new(TapSharedState::new(1.0));
    let counters = Arc::new(TapCounters::new());
    let proc = TapRtProcessor::new(shared.clone(), counters.clone(), 2, 44_100, side);
    (shared, counters, proc)
  }

  #[test]
  fn forced_silence_zeroes_output_and_counts() {
    let (shared, counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_forced_silence(true);
    let input = [0.5, 0.5, 0.5, 0.5];
    let mut output = [1.0, 1.0, 1.0, 1.0];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 2 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 2 };
    proc.process(&in_view, &mut out_view);
    assert_eq!(output, [0.0; 4]);
    assert_eq!(counters.silenced_forced.load(std::sync::atomic::Ordering::Relaxed), 1);
  }

  #[test]
  fn muted_zeroes_output() {
    let (shared, counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_muted(true);
    let input = [0.5, 0.5];
    let mut output = [1.0, 1.0];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 1 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 1 };
    proc.process(&in_view, &mut out_view);
    assert_eq!(output, [0.0, 0.0]);
    assert_eq!(counters.silenced_muted.load(std::sync::atomic::Ordering::Relaxed), 1);
  }

  #[test]
  fn unity_gain_passes_signal_through_when_eq_disabled() {
    let (_shared, _counters, mut proc) = processor(CrossfadeSide::Primary);
    let input = [0.1, -0.2, 0.3, -0.4];
    let mut output = [0.0; 4];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 2 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 2 };
    // Ramp starts already at 1.0 (initial target), so after settling it is
    // near-identity (allow for ramp warmup on the very first samples).
    for _ in 0..64 {
      proc.process(&in_view, &mut out_view);
    }
    for (a, b) in output.iter().zip(input.iter()) {
      assert!((a - b).abs() < 1e-3, "{a} vs {b}");
    }
  }

  #[test]
  fn secondary_side_uses_secondary_multiplier() {
    let (shared, _counters, mut proc) = processor(CrossfadeSide::Secondary);
    shared.set_multipliers(1.0, 0.0);
    let input = [0.5, 0.5];
    let mut output = [1.0, 1.0];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 1 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 1 };
    proc.process(&in_view, &mut out_view);
    assert_eq!(output, [0.0, 0.0]);
  }

  #[test]
  fn eq_runs_when_enabled_and_not_crossfading() {
    let (shared, counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_eq_enabled(true);
    let coeffs: [_; crate::constants::EQ_BAND_COUNT] = std::array::from_fn(|_| peaking_coefficients(1000.0, 6.0, 1.0, 44_100));
    shared.swap_eq_coefficients(coeffs);
    let input = [0.2, 0.2, 0.2, 0.2];
    let mut output = [0.0; 4];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 2 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 2 };
    proc.process(&in_view, &mut out_view);
    assert_eq!(counters.eq_applied.load(std::sync::atomic::Ordering::Relaxed), 1);
  }

  #[test]
  fn limiter_is_bypassed_at_unity_gain_even_near_threshold() {
    let (shared, _counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_target_volume(1.0);
    let input = [0.99, 0.99];
    let mut output = [0.0; 2];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 1 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 1 };
    for _ in 0..8 {
      proc.process(&in_view, &mut out_view);
    }
    assert!((output[0] - 0.99).abs() < 1e-3, "unity gain must pass through unshaped: {}", output[0]);
  }

  #[test]
  fn limiter_engages_once_target_gain_exceeds_unity() {
    let (shared, _counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_target_volume(2.0);
    let input = [0.99, 0.99];
    let mut output = [0.0; 2];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 1 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 1 };
    for _ in 0..64 {
      proc.process(&in_view, &mut out_view);
    }
    assert!(output[0] < 1.98, "boosted signal above the limiter threshold must be compressed: {}", output[0]);
    assert!(output[0] <= crate::constants::LIMITER_CEILING + 1e-3);
  }

  #[test]
  fn eq_bypassed_during_crossfade() {
    let (shared, counters, mut proc) = processor(CrossfadeSide::Primary);
    shared.set_eq_enabled(true);
    shared.set_crossfade_active(true);
    let input = [0.2, 0.2];
    let mut output = [0.0; 2];
    let in_view = AudioBufferView::Interleaved { data: &input, channels: 1 };
    let mut out_view = AudioBufferViewMut::Interleaved { data: &mut output, channels: 1 };
    proc.process(&in_view, &mut out_view);
    assert_eq!(counters.eq_applied.load(std::sync::atomic::Ordering::Relaxed), 0);
    assert_eq!(counters.eq_bypassed_crossfade_active.load(std::sync::atomic::Ordering::Relaxed), 1);
  }
}
