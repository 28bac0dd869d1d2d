//! Tap controller: capture primitive ownership, RT DSP chain, and the
//! cooperative-crossfade / destructive-switch state machine (§4.3).

mod controller;
mod processor;
mod shared;

pub use controller::{SwitchOutcome, TapController};
pub use processor::{CrossfadeSide, TapRtProcessor};
pub use shared::TapSharedState;
