//! Audio buffer view abstraction shared by every DSP kernel (§4.1).
//!
//! A view is either interleaved (one contiguous array, N channels × F
//! frames) or planar (N separate per-channel arrays). Kernels index by
//! `(channel, frame)` through these views instead of committing to one
//! physical layout, so every kernel below works unmodified for both.

/// Read-only buffer view.
pub enum AudioBufferView<'a> {
  Interleaved { data: &'a [f32], channels: usize },
  Planar { channels: &'a [&'a [f32]] },
}

/// Mutable buffer view.
pub enum AudioBufferViewMut<'a> {
  Interleaved { data: &'a mut [f32], channels: usize },
  Planar { channels: &'a mut [&'a mut [f32]] },
}

impl<'a> AudioBufferView<'a> {
  pub fn channel_count(&self) -> usize {
    match self {
      AudioBufferView::Interleaved { channels, .. } => *channels,
      AudioBufferView::Planar { channels } => channels.len(),
    }
  }

  pub fn frame_count(&self) -> usize {
    match self {
      AudioBufferView::Interleaved { data, channels } => {
        if *channels == 0 {
          0
        } else {
          data.len() / channels
        }
      }
      AudioBufferView::Planar { channels } => channels.first().map(|c| c.len()).unwrap_or(0),
    }
  }

  #[inline]
  pub fn sample(&self, channel: usize, frame: usize) -> f32 {
    match self {
      AudioBufferView::Interleaved { data, channels } => {
        let idx = frame * channels + channel;
        data.get(idx).copied().unwrap_or(0.0)
      }
      AudioBufferView::Planar { channels } => channels
        .get(channel)
        .and_then(|c| c.get(frame))
        .copied()
        .unwrap_or(0.0),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.frame_count() == 0 || self.channel_count() == 0
  }
}

impl<'a> AudioBufferViewMut<'a> {
  pub fn channel_count(&self) -> usize {
    match self {
      AudioBufferViewMut::Interleaved { channels, .. } => *channels,
      AudioBufferViewMut::Planar { channels } => channels.len(),
    }
  }

  pub fn frame_count(&self) -> usize {
    match self {
      AudioBufferViewMut::Interleaved { data, channels } => {
        if *channels == 0 {
          0
        } else {
          data.len() / channels
        }
      }
      AudioBufferViewMut::Planar { channels } => channels.first().map(|c| c.len()).unwrap_or(0),
    }
  }

  #[inline]
  pub fn sample(&self, channel: usize, frame: usize) -> f32 {
    match self {
      AudioBufferViewMut::Interleaved { data, channels } => {
        let idx = frame * channels + channel;
        data.get(idx).copied().unwrap_or(0.0)
      }
      AudioBufferViewMut::Planar { channels } => channels
        .get(channel)
        .and_then(|c| c.get(frame))
        .copied()
        .unwrap_or(0.0),
    }
  }

  #[inline]
  pub fn set_sample(&mut self, channel: usize, frame: usize, value: f32) {
    match self {
      AudioBufferViewMut::Interleaved { data, channels } => {
        let idx = frame * *channels + channel;
        if let Some(slot) = data.get_mut(idx) {
          *slot = value;
        }
      }
      AudioBufferViewMut::Planar { channels } => {
        if let Some(slot) = channels.get_mut(channel).and_then(|c| c.get_mut(frame)) {
          *slot = value;
        }
      }
    }
  }

  pub fn is_empty(&self) -> bool {
    self.frame_count() == 0 || self.channel_count() == 0
  }
}
