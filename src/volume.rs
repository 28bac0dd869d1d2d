//! Logarithmic slider ↔ linear-gain mapping (§4.8).
//!
//! Below unity the perceptually wide mute..0dB range is compressed into
//! `[0, 0.5]`; above unity a modest boost lives in `[0.5, 1.0]`. The two
//! halves are independent log curves that meet at (0.5, 1.0), mirroring how
//! the teacher crate's `set_deck_gain` applies a perceptual curve (`gain *
//! gain`) to a linear UI control, generalized here to a two-segment curve
//! with an exact unity pivot.

use crate::constants::MAX_GAIN;

/// Smallest gain considered distinguishable from mute, used to keep the
/// below-unity log curve well-defined at s → 0.
const MIN_AUDIBLE_GAIN: f32 = 0.0001;

/// Map a slider position in `[0, 1]` to a linear gain in `[0, MAX_GAIN]`.
pub fn slider_to_gain(slider: f32) -> f32 {
  let s = slider.clamp(0.0, 1.0);
  if s <= 0.0 {
    return 0.0;
  }
  if s == 0.5 {
    return 1.0;
  }
  if s < 0.5 {
    // Map [0, 0.5] -> [MIN_AUDIBLE_GAIN, 1.0] logarithmically.
    let t = s / 0.5;
    let log_min = MIN_AUDIBLE_GAIN.ln();
    (log_min * (1.0 - t)).exp()
  } else {
    // Map [0.5, 1.0] -> [1.0, MAX_GAIN] logarithmically.
    let t = (s - 0.5) / 0.5;
    let log_max = MAX_GAIN.ln();
    (log_max * t).exp()
  }
}

/// Map a linear gain in `[0, MAX_GAIN]` to a slider position in `[0, 1]`.
pub fn gain_to_slider(gain: f32) -> f32 {
  let g = gain.clamp(0.0, MAX_GAIN);
  if g <= 0.0 {
    return 0.0;
  }
  if (g - 1.0).abs() < f32::EPSILON {
    return 0.5;
  }
  if g < 1.0 {
    let g = g.max(MIN_AUDIBLE_GAIN);
    let log_min = MIN_AUDIBLE_GAIN.ln();
    let t = 1.0 - (g.ln() / log_min);
    (t * 0.5).clamp(0.0, 0.5)
  } else {
    let log_max = MAX_GAIN.ln();
    let t = g.ln() / log_max;
    (0.5 + t * 0.5).clamp(0.5, 1.0)
  }
}

/// Whether a linear gain should be treated as mute for display purposes.
pub fn is_effectively_muted(gain: f32) -> bool {
  gain <= 0.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mute_maps_to_zero() {
    assert_eq!(slider_to_gain(0.0), 0.0);
    assert_eq!(gain_to_slider(0.0), 0.0);
  }

  #[test]
  fn unity_pivot_is_exact() {
    assert_eq!(slider_to_gain(0.5), 1.0);
    assert_eq!(gain_to_slider(1.0), 0.5);
  }

  #[test]
  fn max_slider_reaches_max_gain() {
    let g = slider_to_gain(1.0);
    assert!((g - MAX_GAIN).abs() < 1e-4, "got {g}");
    let s = gain_to_slider(MAX_GAIN);
    assert!((s - 1.0).abs() < 1e-4, "got {s}");
  }

  #[test]
  fn monotonic_slider_to_gain() {
    let mut prev = -1.0;
    for i in 0..=100 {
      let s = i as f32 / 100.0;
      let g = slider_to_gain(s);
      assert!(g >= prev, "not monotonic at s={s}: {g} < {prev}");
      prev = g;
    }
  }

  #[test]
  fn round_trip_slider_within_tolerance() {
    for i in 0..=100 {
      let s = i as f32 / 100.0;
      let g = slider_to_gain(s);
      let s2 = gain_to_slider(g);
      assert!((s - s2).abs() < 0.02, "s={s} round-tripped to {s2}");
    }
  }

  #[test]
  fn round_trip_gain_within_tolerance() {
    for i in 1..=200 {
      let g = (i as f32 / 200.0) * MAX_GAIN;
      let s = gain_to_slider(g);
      let g2 = slider_to_gain(s);
      assert!((g - g2).abs() < 0.05, "g={g} round-tripped to {g2}");
    }
  }
}
