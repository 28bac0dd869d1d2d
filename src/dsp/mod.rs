//! Buffer-layout-agnostic audio DSP kernels (§4.1).

pub mod biquad;
pub mod buffer;
pub mod copy_zero;
pub mod gain;
pub mod limiter;
pub mod peak;

pub use biquad::{adaptive_q, peaking_coefficients, BiquadCascade, BiquadCoefficients};
pub use buffer::{AudioBufferView, AudioBufferViewMut};
pub use copy_zero::{copy, zero};
pub use gain::GainRamp;
pub use limiter::soft_limit;
pub use peak::peak;
