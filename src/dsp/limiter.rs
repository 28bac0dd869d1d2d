//! Soft limiter kernel (§4.1 `Soft limiter`).

use crate::constants::{LIMITER_CEILING, LIMITER_THRESHOLD};

/// Compress `(threshold, +inf)` onto `(threshold, ceiling)`; identity below
/// the threshold. Continuous and monotonic at the threshold, symmetric in
/// sign, asymptotic to `ceiling`.
#[inline]
pub fn soft_limit(x: f32) -> f32 {
  let mag = x.abs();
  if mag <= LIMITER_THRESHOLD {
    return x;
  }
  let over = mag - LIMITER_THRESHOLD;
  let span = LIMITER_CEILING - LIMITER_THRESHOLD;
  let compressed = LIMITER_THRESHOLD + span * over / (over + span);
  x.signum() * compressed
}
