//! Klotz - block-graph audio synthesis with a lock-free hand-off to the audio device
//!
//! A patch is a graph of blocks (oscillators, filters, mixers, ...) that is
//! advanced one batch of [`BATCH_SIZE`] samples at a time on a synthesis thread.
//! Output blocks hand their batches to a [`Stream`], which drains into a lock-free
//! ring buffer read by the hardware callback.
//!
//! # Overview
//!
//! - [`Engine`] owns the [`Graph`] and runs the synthesis loop
//! - [`Bridge`] spawns and connects blocks by name and sets injector values
//! - [`nodes`] holds the built-in blocks
//! - [`CpalDevice`] plays an output's ring buffer (requires `cpal_sink` feature)
//!
//! # Example
//!
//! ```
//! use klotz::{Engine, EngineConfig};
//!
//! let (mut engine, mut bridge) = Engine::new(EngineConfig::default().with_latency_batches(0));
//!
//! let freq = bridge.spawn("value").unwrap();
//! let sine = bridge.spawn("sine").unwrap();
//! let cutoff = bridge.spawn("value").unwrap();
//! let slope = bridge.spawn("value").unwrap();
//! let lp = bridge.spawn("low_pass").unwrap();
//! let out = bridge.spawn("output").unwrap();
//!
//! bridge.connect(freq, 0, sine, 0).unwrap();
//! bridge.connect(sine, 0, lp, 0).unwrap();
//! bridge.connect(cutoff, 0, lp, 1).unwrap();
//! bridge.connect(slope, 0, lp, 3).unwrap();
//! bridge.connect(lp, 0, out, 0).unwrap();
//!
//! bridge.set_value(freq, 220.0).unwrap();
//! bridge.set_value(cutoff, 1000.0).unwrap();
//! bridge.set_value(slope, 1.0).unwrap();
//!
//! let mut reader = bridge.take_output(out).unwrap();
//! engine.tick().unwrap();
//! assert_eq!(reader.size(), klotz::BATCH_SIZE);
//! ```
//!
//! # Custom Blocks
//!
//! Implement [`AudioNode`] and register a factory wrapping it in a [`Transform`]:
//!
//! ```
//! use klotz::{AudioNode, Batch, Engine, EngineConfig, Error, ProcessContext, Transform};
//!
//! struct Invert;
//!
//! impl AudioNode for Invert {
//!     fn process(&mut self, _ctx: &ProcessContext, inputs: &[Batch], outputs: &mut [Batch]) -> Result<(), Error> {
//!         for (out, x) in outputs[0].iter_mut().zip(inputs[0].iter()) {
//!             *out = -x;
//!         }
//!         Ok(())
//!     }
//!
//!     fn num_inputs(&self) -> usize { 1 }
//! }
//!
//! let (_engine, mut bridge) = Engine::new(EngineConfig::default());
//! bridge.register_factory("invert", |_| Transform::boxed(Invert));
//! let id = bridge.spawn("invert").unwrap();
//! assert_eq!(bridge.name(id), Some("invert#0"));
//! ```

mod batch;
mod biquad;
mod bridge;
mod config;
mod engine;
mod error;
mod graph;
mod node;
mod ring;
mod stream;
mod throttle;
mod value;

#[cfg(feature = "cpal_sink")]
mod device;

pub mod nodes;

pub use batch::{Batch, BATCH_DURATION, BATCH_SIZE, SAMPLE_RATE};
pub use biquad::{high_pass_filter, low_pass_filter, BiQuad, Coefficients, MIN_SLOPE};
pub use bridge::{Bridge, Factory};
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle};
pub use error::{Blocked, Error, Stall};
pub use graph::{Graph, Target};
pub use node::{AudioNode, FnNode, Inputs, Node, NodeId, ProcessContext, Transform};
pub use ring::{ring_buffer, RingReader, RingWriter};
pub use stream::Stream;
pub use value::ValueCell;

#[cfg(feature = "cpal_sink")]
pub use device::{CpalDevice, OutputStream};
