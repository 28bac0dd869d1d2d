//! Crossfade / ramp configuration constants (§2 "Crossfade / ramp configuration constants").

use std::time::Duration;

/// Upper bound on linear gain (+6 dB). See §4.8.
pub const MAX_GAIN: f32 = 1.995_262_3; // 10^(6/20)

/// Default volume ramp time constant (§4.1).
pub const DEFAULT_RAMP_TAU: Duration = Duration::from_millis(30);

/// Samples a secondary capture must produce before warmup is considered
/// complete (§4.2).
pub const WARMUP_COMPLETE_SAMPLES: u64 = 2048;

/// Crossfade duration used to derive `total_samples_for_crossfade` (§3).
pub const CROSSFADE_DURATION: Duration = Duration::from_millis(50);

/// Warmup ceiling for a wired output device (§4.3 step 5).
pub const WARMUP_TIMEOUT_WIRED: Duration = Duration::from_millis(50);

/// Warmup ceiling for a wireless output device (§4.3 step 5).
pub const WARMUP_TIMEOUT_WIRELESS: Duration = Duration::from_millis(500);

/// Cooperative poll interval while waiting on warmup or crossfade completion.
pub const SWITCH_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Extra slack added to the crossfade-completion ceiling (§4.3 step 6).
pub const CROSSFADE_COMPLETE_SLACK: Duration = Duration::from_millis(10);

/// Destructive switch: silence held before tearing down the old primary.
pub const DESTRUCTIVE_PRE_SILENCE: Duration = Duration::from_millis(100);

/// Destructive switch: silence held after the new primary is opened, before
/// forced-silence is cleared.
pub const DESTRUCTIVE_POST_SILENCE: Duration = Duration::from_millis(150);

/// Destructive switch: duration of the fade-in ramp back to target volume.
pub const DESTRUCTIVE_FADE_IN: Duration = Duration::from_millis(100);

/// Soft limiter threshold (§4.1).
pub const LIMITER_THRESHOLD: f32 = 0.95;

/// Soft limiter ceiling (§4.1).
pub const LIMITER_CEILING: f32 = 1.0;

/// Number of bands in the parametric EQ (§4.6).
pub const EQ_BAND_COUNT: usize = 10;

/// Fixed graphic-EQ band center frequencies, in Hz (§4.6).
pub const EQ_BAND_FREQUENCIES: [f32; EQ_BAND_COUNT] = [
  31.25, 62.5, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Per-band gain clamp, in dB (§3).
pub const EQ_BAND_GAIN_MIN_DB: f32 = -18.0;
pub const EQ_BAND_GAIN_MAX_DB: f32 = 18.0;

/// Maximum number of custom EQ presets a settings store may hold (§3).
pub const MAX_CUSTOM_PRESETS: usize = 5;

/// Custom preset display-name length bounds, after trimming (§3).
pub const PRESET_NAME_MIN_LEN: usize = 1;
pub const PRESET_NAME_MAX_LEN: usize = 32;

/// Settings writer debounce interval (§4.7).
pub const SETTINGS_DEBOUNCE: Duration = Duration::from_millis(500);

/// Callback-count floor before a controller's diagnostics are consulted for
/// health classification (§4.3).
pub const HEALTH_MIN_CALLBACKS: u64 = 10;

/// Target-volume threshold below which "silent on purpose" is assumed during
/// health classification (§4.3).
pub const HEALTH_SILENT_VOLUME_THRESHOLD: f32 = 0.01;

/// Output-peak threshold above which output is considered audible (§4.3).
pub const HEALTH_OUTPUT_PEAK_THRESHOLD: f32 = 0.0001;
