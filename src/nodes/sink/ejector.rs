//! Output sink - hands finished batches to the audio device through a [`Stream`]

use delegate::delegate;

use crate::batch::Batch;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::node::{Inputs, Node, ProcessContext};
use crate::ring::RingReader;
use crate::stream::Stream;
use crate::throttle::Throttle;

/// A sink that appends every completed input batch to its [`Stream`].
///
/// All input ports are summed into one mono batch, stamped with the tick's
/// simulated time. The stream keeps `latency_batches` batches queued so late
/// corrections can still be faded in, and drains the rest into the ring buffer
/// whose reader is handed out once through [`Node::take_reader`].
pub struct Ejector {
    inputs: Inputs,
    stream: Stream,
    reader: Option<RingReader>,
    latency: usize,
    mix: Batch,
    rejected_log: Throttle,
}

impl Ejector {
    /// Ejector with a single input port.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_inputs(config, 1)
    }

    /// Ejector summing `inputs` ports (at least one).
    ///
    /// The latency is capped one batch below the stream capacity; at or above it
    /// the stream would evict every batch before any was flushed.
    pub fn with_inputs(config: &EngineConfig, inputs: usize) -> Self {
        let (stream, reader) = Stream::new(config);
        let max_latency = config.stream_capacity.max(1) - 1;
        let latency = config.latency_batches.min(max_latency);
        if latency < config.latency_batches {
            tracing::warn!(
                requested = config.latency_batches,
                stream_capacity = config.stream_capacity,
                latency,
                "output latency exceeds stream capacity, clamping"
            );
        }

        Self {
            inputs: Inputs::new(inputs.max(1)),
            stream,
            reader: Some(reader),
            latency,
            mix: Batch::silence(),
            rejected_log: Throttle::new(config.log_interval),
        }
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Batches held back from the device.
    pub fn latency(&self) -> usize {
        self.latency
    }
}

impl Node for Ejector {
    delegate! {
        to self.inputs {
            fn num_inputs(&self) -> usize;
            fn add_input(&mut self, port: usize) -> Result<(), Error>;
            fn set_input(&mut self, port: usize, batch: &Batch) -> Result<(), Error>;
            fn remaining(&self) -> &[i32];
            fn reset(&mut self);
        }
    }

    fn num_outputs(&self) -> usize { 0 }

    fn get_output(&self, _port: usize) -> Option<&Batch> {
        None
    }

    fn invoke(&mut self, ctx: &ProcessContext) -> Result<bool, Error> {
        if !self.inputs.is_ready() {
            return Ok(false);
        }

        self.mix.clear();
        for batch in self.inputs.batches() {
            self.mix.add_assign(batch);
        }
        self.inputs.reset();

        // Too old to blend into anything still queued: the device has it already.
        if let Err(e) = self.stream.add_samples(ctx.timestamp, self.mix.clone()) {
            if let Some(suppressed) = self.rejected_log.check() {
                tracing::warn!(error = %e, suppressed, "dropping batch");
            }
        }

        let excess = self.stream.len().saturating_sub(self.latency);
        if excess > 0 {
            self.stream.flush_batches(excess);
        }
        Ok(true)
    }

    fn take_reader(&mut self) -> Option<RingReader> {
        self.reader.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BATCH_SIZE;

    fn drain(reader: &mut RingReader) -> Vec<f32> {
        core::iter::from_fn(|| reader.pop()).collect()
    }

    #[test]
    fn holds_back_latency_batches() {
        let config = EngineConfig::default().with_latency_batches(2);
        let mut node = Ejector::new(&config);
        let mut reader = node.take_reader().unwrap();
        assert!(node.take_reader().is_none());

        node.add_input(0).unwrap();
        for tick in 0..3 {
            node.set_input(0, &Batch::splat(tick as f32 + 1.0)).unwrap();
            assert!(node.invoke(&ProcessContext::at_tick(tick)).unwrap());
        }

        let out = drain(&mut reader);
        assert_eq!(out.len(), BATCH_SIZE);
        assert!(out.iter().all(|&v| v == 1.0));
        assert_eq!(node.stream().len(), 2);
    }

    #[test]
    fn sums_every_port() {
        let config = EngineConfig::default().with_latency_batches(0);
        let mut node = Ejector::with_inputs(&config, 2);
        let mut reader = node.take_reader().unwrap();
        node.add_input(0).unwrap();
        node.add_input(1).unwrap();

        node.set_input(0, &Batch::splat(0.25)).unwrap();
        assert!(!node.invoke(&ProcessContext::at_tick(0)).unwrap());
        node.set_input(1, &Batch::splat(0.5)).unwrap();
        assert!(node.invoke(&ProcessContext::at_tick(0)).unwrap());

        let out = drain(&mut reader);
        assert_eq!(out.len(), BATCH_SIZE);
        assert!(out.iter().all(|&v| v == 0.75));
    }

    #[test]
    fn latency_is_capped_below_stream_capacity() {
        let config = EngineConfig::default()
            .with_stream_capacity(4)
            .with_latency_batches(4);
        let mut node = Ejector::new(&config);
        assert_eq!(node.latency(), 3);

        let mut reader = node.take_reader().unwrap();
        node.add_input(0).unwrap();
        for tick in 0..10 {
            node.set_input(0, &Batch::splat(1.0)).unwrap();
            assert!(node.invoke(&ProcessContext::at_tick(tick)).unwrap());
        }

        let out = drain(&mut reader);
        assert_eq!(out.len(), 7 * BATCH_SIZE);
        assert!(out.iter().all(|&v| v == 1.0));
        assert_eq!(node.stream().len(), 3);
    }

    #[test]
    fn single_slot_stream_flushes_immediately() {
        let config = EngineConfig::default()
            .with_stream_capacity(1)
            .with_latency_batches(2);
        let node = Ejector::new(&config);
        assert_eq!(node.latency(), 0);
    }

    #[test]
    fn has_no_outputs() {
        let node = Ejector::new(&EngineConfig::default());
        assert_eq!(node.num_outputs(), 0);
        assert!(node.get_output(0).is_none());
    }
}
