//! Built-in audio nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Produce a batch every tick without waiting on upstream nodes:
//! - [`Injector`] - Constant output set from any thread through a [`ValueCell`](crate::ValueCell)
//! - [`Sine`] - Sine oscillator driven by a frequency input
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs → outputs), wrapped in [`Transform`](crate::Transform):
//! - [`Mixer`] - Sum several inputs together
//! - [`Gain`] - Signal times a gain input, optionally smoothed
//! - [`Filter`] - Low-pass or high-pass biquad with audio-rate controls
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no outputs:
//! - [`Ejector`] - Feed a [`Stream`](crate::Stream) read by the audio device
//!
//! Each of these is registered under a block name by
//! [`Bridge::with_builtin_blocks`](crate::Bridge::with_builtin_blocks).

pub mod source;
pub mod effect;
pub mod sink;

// Re-export common types at the top level for convenience
pub use source::{Injector, Sine};
pub use effect::{Filter, FilterKind, Gain, Mixer};
pub use sink::Ejector;
