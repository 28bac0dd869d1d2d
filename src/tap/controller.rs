//! Tap controller (§4.3): owns one process's capture primitives, runs its
//! DSP chain, and drives the cooperative-crossfade / destructive-switch
//! state machine for `switchDevice`.

use super::processor::{CrossfadeSide, TapRtProcessor};
use super::shared::TapSharedState;
use crate::capture::{CaptureFrame, CpalInputCapture, OutputAggregate};
use crate::constants::{
  CROSSFADE_COMPLETE_SLACK, DESTRUCTIVE_FADE_IN, DESTRUCTIVE_POST_SILENCE, DESTRUCTIVE_PRE_SILENCE, SWITCH_POLL_INTERVAL, WARMUP_TIMEOUT_WIRED,
  WARMUP_TIMEOUT_WIRELESS,
};
use crate::crossfade::CrossfadeState;
use crate::diagnostics::{DiagnosticsSnapshot, TapCounters};
use crate::dsp::{AudioBufferView, AudioBufferViewMut};
use crate::eq::EqSettings;
use crate::error::CoreResult;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Result of a `switchDevice` call. Cancellation is deliberately not an
/// `Err` variant: §7 states it is never surfaced as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
  Switched,
  Cancelled,
}

struct MixBuffer {
  queue: Mutex<VecDeque<f32>>,
}

impl MixBuffer {
  fn new() -> Self {
    Self { queue: Mutex::new(VecDeque::new()) }
  }

  /// Additively mixes `samples` into the buffer starting at its current
  /// write head, extending with silence as needed — the same "pull from a
  /// shared queue" idiom as the teacher's `output_queue: VecDeque<f32>`,
  /// generalized to support two RT producers (primary + secondary).
  fn mix_in(&self, samples: &[f32]) {
    let mut q = self.queue.lock();
    if q.len() < samples.len() {
      q.resize(samples.len(), 0.0);
    }
    for (slot, s) in q.iter_mut().zip(samples.iter()) {
      *slot += s;
    }
  }

  fn pull(&self, out: &mut [f32]) {
    let mut q = self.queue.lock();
    for slot in out.iter_mut() {
      *slot = q.pop_front().unwrap_or(0.0);
    }
  }
}

/// Clears forced-silence on drop regardless of which path a `switchDevice`
/// call exits through — the scoped-acquisition pattern §9 calls for so
/// every cleanup path (success, error, cancellation) clears the flag.
struct ForceSilenceGuard<'a> {
  shared: &'a TapSharedState,
}

impl<'a> ForceSilenceGuard<'a> {
  fn acquire(shared: &'a TapSharedState) -> Self {
    shared.set_forced_silence(true);
    Self { shared }
  }
}

impl Drop for ForceSilenceGuard<'_> {
  fn drop(&mut self) {
    self.shared.set_forced_silence(false);
  }
}

pub struct TapController {
  shared: Arc<TapSharedState>,
  primary_counters: Mutex<Arc<TapCounters>>,
  secondary_counters: Mutex<Arc<TapCounters>>,
  crossfade: Mutex<CrossfadeState>,
  mix: Arc<MixBuffer>,
  primary_capture: Mutex<Option<CpalInputCapture>>,
  secondary_capture: Mutex<Option<CpalInputCapture>>,
  output: Mutex<Option<OutputAggregate>>,
  sample_rate: u32,
  channel_count: usize,
  current_device_uid: Mutex<String>,
  /// Samples the secondary has observed since warmup began; advanced from
  /// the secondary's own RT callback, polled cooperatively by switchDevice.
  secondary_observed: Arc<AtomicU64>,
}

impl TapController {
  /// Opens a tap controller writing to `output_device_uid`, with no input
  /// capture primitive attached yet; call `open_primary` to attach one.
  pub fn new(output_device_uid: &str, initial_volume: f32, channel_count: usize, sample_rate: u32) -> CoreResult<Self> {
    let shared = Arc::new(TapSharedState::new(initial_volume));
    let mix = Arc::new(MixBuffer::new());
    let mix_for_output = mix.clone();
    let output = OutputAggregate::open(Some(output_device_uid), move |data: &mut [f32]| {
      mix_for_output.pull(data);
    })?;

    Ok(Self {
      shared,
      primary_counters: Mutex::new(Arc::new(TapCounters::new())),
      secondary_counters: Mutex::new(Arc::new(TapCounters::new())),
      crossfade: Mutex::new(CrossfadeState::new()),
      mix,
      primary_capture: Mutex::new(None),
      secondary_capture: Mutex::new(None),
      output: Mutex::new(Some(output)),
      sample_rate,
      channel_count,
      current_device_uid: Mutex::new(String::new()),
      secondary_observed: Arc::new(AtomicU64::new(0)),
    })
  }

  pub fn set_volume(&self, gain: f32) {
    self.shared.set_target_volume(gain);
  }

  pub fn set_mute(&self, muted: bool) {
    self.shared.set_muted(muted);
  }

  pub fn set_eq(&self, settings: &EqSettings) {
    self.shared.set_eq_enabled(settings.is_enabled);
    let coeffs = std::array::from_fn(|band| {
      let freq = crate::constants::EQ_BAND_FREQUENCIES[band];
      let gain_db = settings.band_gains_db[band];
      let q = crate::dsp::biquad::adaptive_q(gain_db);
      crate::dsp::biquad::peaking_coefficients(freq, gain_db, q, self.sample_rate)
    });
    self.shared.swap_eq_coefficients(coeffs);
  }

  pub fn diagnostics(&self) -> DiagnosticsSnapshot {
    self
      .primary_counters
      .lock()
      .snapshot(self.shared.target_volume(), self.shared.is_crossfade_active())
  }

  pub fn current_device_uid(&self) -> String {
    self.current_device_uid.lock().clone()
  }

  /// Opens the first-ever capture primitive for this controller — not a
  /// switch, since there is no previous primary to fade from.
  pub fn open_primary(&self, device_uid: &str) -> CoreResult<()> {
    let mix = self.mix.clone();
    let shared = self.shared.clone();
    let counters = self.primary_counters.lock().clone();
    let mut processor = TapRtProcessor::new(shared, counters, self.channel_count, self.sample_rate, CrossfadeSide::Primary);

    let capture = CpalInputCapture::open(
      Some(device_uid),
      Box::new(move |frame: CaptureFrame| {
        let mut out = vec![0.0f32; frame.data.len()];
        let in_view = AudioBufferView::Interleaved { data: frame.data, channels: frame.channels };
        let mut out_view = AudioBufferViewMut::Interleaved { data: &mut out, channels: frame.channels };
        if frame.is_float {
          processor.process(&in_view, &mut out_view);
        } else {
          processor.passthrough(&in_view, &mut out_view);
        }
        mix.mix_in(&out);
      }),
    )?;

    *self.primary_capture.lock() = Some(capture);
    *self.current_device_uid.lock() = device_uid.to_string();
    Ok(())
  }

  fn open_secondary(&self, device_uid: &str) -> CoreResult<()> {
    let mix = self.mix.clone();
    let shared = self.shared.clone();
    *self.secondary_counters.lock() = Arc::new(TapCounters::new());
    let counters = self.secondary_counters.lock().clone();
    let observed = self.secondary_observed.clone();
    let mut processor = TapRtProcessor::new(shared, counters, self.channel_count, self.sample_rate, CrossfadeSide::Secondary);

    let capture = CpalInputCapture::open(
      Some(device_uid),
      Box::new(move |frame: CaptureFrame| {
        let mut out = vec![0.0f32; frame.data.len()];
        let in_view = AudioBufferView::Interleaved { data: frame.data, channels: frame.channels };
        let mut out_view = AudioBufferViewMut::Interleaved { data: &mut out, channels: frame.channels };
        if frame.is_float {
          processor.process(&in_view, &mut out_view);
        } else {
          processor.passthrough(&in_view, &mut out_view);
        }
        mix.mix_in(&out);
        let frames = if frame.channels == 0 { 0 } else { frame.data.len() / frame.channels };
        observed.fetch_add(frames as u64, Ordering::Relaxed);
      }),
    )?;

    *self.secondary_capture.lock() = Some(capture);
    Ok(())
  }

  /// §4.3 "Switching devices (cooperative crossfade)".
  #[instrument(skip(self, token), fields(device = %new_device_uid))]
  pub async fn switch_device(&self, new_device_uid: &str, token: CancellationToken, is_wireless: bool) -> CoreResult<SwitchOutcome> {
    if self.current_device_uid() == new_device_uid {
      return Ok(SwitchOutcome::Switched);
    }

    self.secondary_observed.store(0, Ordering::Relaxed);
    if let Err(e) = self.open_secondary(new_device_uid) {
      warn!(error = %e, "failed to open secondary capture, switch aborted");
      return Err(e);
    }

    self.crossfade.lock().begin(self.sample_rate);
    self.shared.set_crossfade_active(true);

    let w_max = if is_wireless { WARMUP_TIMEOUT_WIRELESS } else { WARMUP_TIMEOUT_WIRED };
    let warmup_result = self
      .poll_until(w_max, &token, || {
        let observed = self.secondary_observed.load(Ordering::Relaxed);
        let mut cf = self.crossfade.lock();
        let delta = observed.saturating_sub(cf.secondary_samples_observed());
        cf.update_progress(delta);
        cf.is_warmup_complete()
      })
      .await;

    match warmup_result {
      Ok(true) => self.cooperative_crossfade(new_device_uid, token).await,
      Ok(false) => {
        self.abandon_secondary();
        self.destructive_switch(new_device_uid, token).await
      }
      Err(()) => {
        self.cancel_switch();
        Ok(SwitchOutcome::Cancelled)
      }
    }
  }

  async fn cooperative_crossfade(&self, new_device_uid: &str, token: CancellationToken) -> CoreResult<SwitchOutcome> {
    self.crossfade.lock().begin_crossfading();
    let total = self.crossfade.lock().total_samples_for_crossfade();
    let ceiling = Duration::from_secs_f64(total as f64 / self.sample_rate as f64) + CROSSFADE_COMPLETE_SLACK;

    let completed = self
      .poll_until(ceiling, &token, || {
        let observed = self.secondary_observed.load(Ordering::Relaxed);
        let mut cf = self.crossfade.lock();
        let delta = observed.saturating_sub(cf.secondary_samples_observed());
        let progress = cf.update_progress(delta);
        let (primary_mult, secondary_mult) = cf.multipliers();
        self.shared.set_multipliers(primary_mult, secondary_mult);
        progress >= 1.0
      })
      .await;

    match completed {
      Ok(true) => {
        self.promote_secondary_to_primary(new_device_uid);
        self.crossfade.lock().complete();
        self.shared.set_crossfade_active(false);
        self.shared.set_multipliers(1.0, 1.0);
        info!("crossfade complete, secondary promoted to primary");
        Ok(SwitchOutcome::Switched)
      }
      Ok(false) => {
        self.abandon_secondary();
        self.destructive_switch(new_device_uid, token).await
      }
      Err(()) => {
        self.cancel_switch();
        Ok(SwitchOutcome::Cancelled)
      }
    }
  }

  /// §4.3 step 8.
  async fn destructive_switch(&self, new_device_uid: &str, token: CancellationToken) -> CoreResult<SwitchOutcome> {
    let guard = ForceSilenceGuard::acquire(&self.shared);

    if token.is_cancelled() {
      self.cancel_switch();
      return Ok(SwitchOutcome::Cancelled);
    }
    sleep(DESTRUCTIVE_PRE_SILENCE).await;

    *self.primary_capture.lock() = None;

    if token.is_cancelled() {
      self.cancel_switch();
      return Ok(SwitchOutcome::Cancelled);
    }

    self.open_primary(new_device_uid)?;

    sleep(DESTRUCTIVE_POST_SILENCE).await;

    drop(guard);
    self.shared.set_crossfade_active(false);
    self.crossfade.lock().complete();
    self.shared.set_multipliers(1.0, 1.0);

    let target = self.shared.target_volume();
    sleep(DESTRUCTIVE_FADE_IN).await;
    self.shared.set_target_volume(target);

    info!("destructive switch complete");
    Ok(SwitchOutcome::Switched)
  }

  fn promote_secondary_to_primary(&self, new_device_uid: &str) {
    let secondary = self.secondary_capture.lock().take();
    *self.primary_capture.lock() = secondary;
    *self.current_device_uid.lock() = new_device_uid.to_string();
    let promoted = self.secondary_counters.lock().clone();
    *self.primary_counters.lock() = promoted;
  }

  fn abandon_secondary(&self) {
    *self.secondary_capture.lock() = None;
  }

  /// §5 cancellation: reset crossfade state, drop the secondary, clear
  /// forced-silence, leave the primary untouched.
  fn cancel_switch(&self) {
    self.crossfade.lock().complete();
    self.abandon_secondary();
    self.shared.set_crossfade_active(false);
    self.shared.set_forced_silence(false);
    self.shared.set_multipliers(1.0, 1.0);
  }

  /// Cooperative poll loop: calls `check` every `SWITCH_POLL_INTERVAL` until
  /// it returns true, `ceiling` elapses (-> `Ok(false)`), or `token` is
  /// observed cancelled (-> `Err(())`).
  async fn poll_until(&self, ceiling: Duration, token: &CancellationToken, mut check: impl FnMut() -> bool) -> Result<bool, ()> {
    let deadline = tokio::time::Instant::now() + ceiling;
    loop {
      if token.is_cancelled() {
        return Err(());
      }
      if check() {
        return Ok(true);
      }
      if tokio::time::Instant::now() >= deadline {
        return Ok(false);
      }
      sleep(SWITCH_POLL_INTERVAL).await;
    }
  }

  /// §5 "Teardown order for a tap controller": stop IO, destroy IO
  /// registration, destroy aggregate, destroy the process tap primitive —
  /// expressed here as drop order, since each wrapper's `Drop` stops then
  /// destroys its own `cpal::Stream`.
  pub fn teardown(&self) {
    *self.output.lock() = None;
    *self.primary_capture.lock() = None;
    *self.secondary_capture.lock() = None;
  }
}
