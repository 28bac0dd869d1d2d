//! Narrow capture interface the tap controller consumes (§1 "out of
//! scope... the core consumes those primitives through a narrow capture
//! interface").
//!
//! The host's actual process-tap / aggregate-device primitives are
//! platform-specific collaborators outside this core's scope. This module
//! defines the trait boundary the tap controller programs against, plus a
//! `cpal`-backed implementation for ordinary named input/output devices —
//! grounded in the teacher's own `cpal` device-by-name-with-fallback and
//! stream-building code in `audio_engine.rs`.

use crate::error::{CoreError, CoreResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use std::sync::Arc;
use tracing::{debug, warn};

/// One real-time delivery of captured input, handed to the tap controller's
/// RT callback. Sample data is always normalized to float here so every
/// downstream DSP kernel only ever sees `f32`; `is_float` records whether
/// that normalization was a no-op (native F32 host format) or a bit-depth
/// conversion from a narrower integer format, so the caller can decide
/// between running the DSP chain and taking the non-float passthrough path
/// (§4.1 step 4, §1 Non-goals: "a passthrough on non-float formats").
pub struct CaptureFrame<'a> {
  pub data: &'a [f32],
  pub channels: usize,
  pub is_float: bool,
}

/// RT callback signature invoked by a capture primitive. Must uphold the
/// same RT-safety constraints as the tap callback itself: no allocation, no
/// locking, no blocking.
pub type CaptureCallback = Box<dyn FnMut(CaptureFrame) + Send + 'static>;

/// A live capture primitive: an open connection from one audio source
/// (a device, or a per-process/per-bundle OS tap) into a running RT
/// callback. Dropping a handle tears down the underlying primitive.
pub trait CapturePrimitive: Send {
  fn channel_count(&self) -> usize;
  fn sample_rate(&self) -> u32;
}

/// Locates a device by stable name across the host's enumeration, falling
/// back to the host default when not found — mirrors the teacher's
/// `get_device_channels`/`build_output_stream` device-resolution logic.
fn resolve_input_device(host: &cpal::Host, device_uid: Option<&str>) -> CoreResult<cpal::Device> {
  if let Some(name) = device_uid {
    let found = host
      .input_devices()
      .map_err(|e| CoreError::CaptureCreationFailed(e.to_string()))?
      .find(|d| d.name().map(|n| n == name).unwrap_or(false));
    if let Some(device) = found {
      return Ok(device);
    }
    warn!(device_uid = name, "input device not found in enumeration, falling back to default");
  }
  host
    .default_input_device()
    .ok_or_else(|| CoreError::DeviceUnavailable(device_uid.unwrap_or("<default>").to_string()))
}

fn i16_to_f32(s: i16) -> f32 {
  s as f32 / i16::MAX as f32
}

fn u16_to_f32(s: u16) -> f32 {
  (s as f32 - 32_768.0) / 32_768.0
}

fn f32_to_i16(s: f32) -> i16 {
  (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn f32_to_u16(s: f32) -> u16 {
  ((s.clamp(-1.0, 1.0) * 32_767.0) + 32_768.0) as u16
}

fn resolve_output_device(host: &cpal::Host, device_uid: Option<&str>) -> CoreResult<cpal::Device> {
  if let Some(name) = device_uid {
    let found = host
      .output_devices()
      .map_err(|e| CoreError::AggregateCreationFailed(e.to_string()))?
      .find(|d| d.name().map(|n| n == name).unwrap_or(false));
    if let Some(device) = found {
      return Ok(device);
    }
    warn!(device_uid = name, "output device not found in enumeration, falling back to default");
  }
  host
    .default_output_device()
    .ok_or_else(|| CoreError::DeviceUnavailable(device_uid.unwrap_or("<default>").to_string()))
}

/// A `cpal` input stream standing in for a host process/bundle tap.
pub struct CpalInputCapture {
  stream: cpal::Stream,
  channels: usize,
  sample_rate: u32,
}

impl CpalInputCapture {
  /// Opens a capture primitive in the device's native format. A non-F32
  /// format is not rejected: samples are normalized to `f32` here (a
  /// bit-depth conversion, not a resample) and `CaptureFrame::is_float`
  /// reports the conversion happened, so the caller takes the passthrough
  /// path instead of running the DSP chain on it (§4.1 step 4).
  pub fn open(device_uid: Option<&str>, mut callback: CaptureCallback) -> CoreResult<Self> {
    let host = cpal::default_host();
    let device = resolve_input_device(&host, device_uid)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let config = device
      .default_input_config()
      .map_err(|e| CoreError::CaptureCreationFailed(format!("{device_name}: {e}")))?;

    let format = config.sample_format();
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    debug!(device = %device_name, channels, sample_rate, ?format, "opening capture primitive");

    let err_name = device_name.clone();
    let on_error = move |err: cpal::StreamError| warn!(device = %err_name, error = %err, "capture stream error");

    let stream = match format {
      SampleFormat::F32 => device.build_input_stream(
        &config.into(),
        move |data: &[f32], _| callback(CaptureFrame { data, channels, is_float: true }),
        on_error,
        None,
      ),
      SampleFormat::I16 => {
        let mut scratch = Vec::new();
        device.build_input_stream(
          &config.into(),
          move |data: &[i16], _| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| i16_to_f32(s)));
            callback(CaptureFrame { data: &scratch, channels, is_float: false });
          },
          on_error,
          None,
        )
      }
      SampleFormat::U16 => {
        let mut scratch = Vec::new();
        device.build_input_stream(
          &config.into(),
          move |data: &[u16], _| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| u16_to_f32(s)));
            callback(CaptureFrame { data: &scratch, channels, is_float: false });
          },
          on_error,
          None,
        )
      }
      other => return Err(unsupported_format_error(other)),
    }
    .map_err(|e| CoreError::CaptureCreationFailed(e.to_string()))?;

    stream.play().map_err(|e| CoreError::IoRegistrationFailed(e.to_string()))?;

    Ok(Self {
      stream,
      channels,
      sample_rate,
    })
  }
}

fn unsupported_format_error(format: SampleFormat) -> CoreError {
  warn!(?format, "capture device format has no f32 passthrough conversion, cannot virtualize");
  CoreError::FormatIncompatible
}

impl CapturePrimitive for CpalInputCapture {
  fn channel_count(&self) -> usize {
    self.channels
  }

  fn sample_rate(&self) -> u32 {
    self.sample_rate
  }
}

// SAFETY boundary note: `cpal::Stream` is not `Send` on some backends; this
// crate only ever owns one per tap controller and accesses it from the
// control domain, matching the teacher's `Arc<Mutex<Option<cpal::Stream>>>`
// pattern in `audio_engine.rs`.
unsafe impl Send for CpalInputCapture {}

/// The output side: a `cpal` output stream pulling rendered audio out of a
/// lock-free ring populated by the tap's RT callback. Mirrors the teacher's
/// `build_output_stream`.
pub struct OutputAggregate {
  stream: cpal::Stream,
  channels: usize,
  sample_rate: u32,
}

impl OutputAggregate {
  /// Opens the output side in the device's native format. `pull` always
  /// produces `f32` (the RT mix buffer is float throughout); a non-F32
  /// native format is converted at the write boundary rather than rejected.
  pub fn open(device_uid: Option<&str>, pull: impl FnMut(&mut [f32]) + Send + 'static) -> CoreResult<Self> {
    let host = cpal::default_host();
    let device = resolve_output_device(&host, device_uid)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let config = device
      .default_output_config()
      .map_err(|e| CoreError::AggregateCreationFailed(format!("{device_name}: {e}")))?;

    let format = config.sample_format();
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    let pull = Arc::new(parking_lot::Mutex::new(pull));
    let err_name = device_name.clone();
    let on_error = move |err: cpal::StreamError| warn!(device = %err_name, error = %err, "output stream error");

    let stream = match format {
      SampleFormat::F32 => device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| (pull.lock())(data),
        on_error,
        None,
      ),
      SampleFormat::I16 => {
        let mut scratch = Vec::new();
        device.build_output_stream(
          &config.into(),
          move |data: &mut [i16], _| {
            scratch.clear();
            scratch.resize(data.len(), 0.0);
            (pull.lock())(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
              *dst = f32_to_i16(*src);
            }
          },
          on_error,
          None,
        )
      }
      SampleFormat::U16 => {
        let mut scratch = Vec::new();
        device.build_output_stream(
          &config.into(),
          move |data: &mut [u16], _| {
            scratch.clear();
            scratch.resize(data.len(), 0.0);
            (pull.lock())(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
              *dst = f32_to_u16(*src);
            }
          },
          on_error,
          None,
        )
      }
      other => return Err(unsupported_format_error(other)),
    }
    .map_err(|e| CoreError::AggregateCreationFailed(e.to_string()))?;

    stream.play().map_err(|e| CoreError::IoRegistrationFailed(e.to_string()))?;

    Ok(Self {
      stream,
      channels,
      sample_rate,
    })
  }
}

impl CapturePrimitive for OutputAggregate {
  fn channel_count(&self) -> usize {
    self.channels
  }

  fn sample_rate(&self) -> u32 {
    self.sample_rate
  }
}

unsafe impl Send for OutputAggregate {}
