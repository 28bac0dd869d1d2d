//! Copy and zero kernels (§4.1 `copy`, `zero`).

use super::buffer::{AudioBufferView, AudioBufferViewMut};

/// Sample-wise copy, channel-count-matched. On a size mismatch, copies the
/// minimum of the two sizes in both dimensions; any trailing output samples
/// are left unspecified (the caller zeroes first if a clean copy is
/// required).
pub fn copy(src: &AudioBufferView, dst: &mut AudioBufferViewMut) {
  let channels = src.channel_count().min(dst.channel_count());
  let frames = src.frame_count().min(dst.frame_count());
  for frame in 0..frames {
    for ch in 0..channels {
      dst.set_sample(ch, frame, src.sample(ch, frame));
    }
  }
}

/// Write zero to every sample in the view.
pub fn zero(view: &mut AudioBufferViewMut) {
  let channels = view.channel_count();
  let frames = view.frame_count();
  for frame in 0..frames {
    for ch in 0..channels {
      view.set_sample(ch, frame, 0.0);
    }
  }
}
