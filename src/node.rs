//! Core node traits, readiness accounting and context types.

use delegate::delegate;

use crate::batch::{Batch, BATCH_DURATION, BATCH_SIZE, SAMPLE_RATE};
use crate::error::Error;
use crate::ring::RingReader;
use crate::value::ValueCell;

/// Information available while a node computes.
///
/// Passed to every [`Node::invoke`] and [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (always [`SAMPLE_RATE`])
    pub sample_rate: u32,
    /// Number of samples per batch (always [`BATCH_SIZE`])
    pub buffer_size: usize,
    /// Simulated time at the start of this tick, in seconds
    pub timestamp: f64,
}

impl ProcessContext {
    /// Context for the given tick number.
    pub fn at_tick(tick: u64) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: BATCH_SIZE,
            timestamp: tick as f64 * BATCH_DURATION,
        }
    }
}

/// Unique identifier for a node within a graph.
///
/// Ids are handed out densely from zero in the order nodes are added.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The per-batch computation of an ordinary node.
///
/// Implement this for custom blocks and wrap them in a [`Transform`], which takes
/// care of the readiness protocol:
///
/// ```
/// use klotz::{AudioNode, Batch, Error, ProcessContext, Transform};
///
/// /// Squares its input.
/// struct Square;
///
/// impl AudioNode for Square {
///     fn process(
///         &mut self,
///         _ctx: &ProcessContext,
///         inputs: &[Batch],
///         outputs: &mut [Batch],
///     ) -> Result<(), Error> {
///         for (out, x) in outputs[0].iter_mut().zip(inputs[0].iter()) {
///             *out = x * x;
///         }
///         Ok(())
///     }
///
///     fn num_inputs(&self) -> usize { 1 }
/// }
///
/// let node = Transform::new(Square);
/// # let _ = node;
/// ```
pub trait AudioNode: Send + 'static {
    /// Compute one batch.
    ///
    /// `inputs` holds one summed batch per input port (silence for ports with no
    /// edges). `outputs` holds one zeroed batch per output port.
    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error>;

    /// Number of input ports.
    fn num_inputs(&self) -> usize { 0 }

    /// Number of output ports.
    fn num_outputs(&self) -> usize { 1 }
}

/// A node as the scheduler sees it.
///
/// The graph calls [`add_input`](Self::add_input) once per edge while wiring,
/// then each tick delivers upstream batches with [`set_input`](Self::set_input)
/// and retries [`invoke`](Self::invoke) until it reports `true`.
pub trait Node: Send {
    fn num_inputs(&self) -> usize;

    fn num_outputs(&self) -> usize;

    /// Register one more edge terminating at `port`.
    fn add_input(&mut self, port: usize) -> Result<(), Error>;

    /// Deliver one upstream batch to `port`, summing it into whatever already arrived.
    fn set_input(&mut self, port: usize, batch: &Batch) -> Result<(), Error>;

    /// The most recently produced batch on `port`.
    fn get_output(&self, port: usize) -> Option<&Batch>;

    /// Compute if every input has arrived. Returns `Ok(false)` without side effects otherwise.
    fn invoke(&mut self, ctx: &ProcessContext) -> Result<bool, Error>;

    /// Arrivals still outstanding per input port.
    fn remaining(&self) -> &[i32] { &[] }

    /// Abandon a partially delivered tick: restore counters and drop pending inputs.
    fn reset(&mut self) {}

    /// The externally settable value, for injector nodes.
    fn value_cell(&self) -> Option<ValueCell> { None }

    /// Hand over the consumer side of this node's output stream, for ejector nodes.
    /// Returns `Some` at most once.
    fn take_reader(&mut self) -> Option<RingReader> { None }
}

/// Pending input batches plus the readiness counters of every input port.
#[derive(Debug, Clone)]
pub struct Inputs {
    pending: Vec<Batch>,
    expected: Vec<i32>,
    remaining: Vec<i32>,
}

impl Inputs {
    pub fn new(count: usize) -> Self {
        Self {
            pending: vec![Batch::silence(); count],
            expected: vec![0; count],
            remaining: vec![0; count],
        }
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.pending.len()
    }

    fn check(&self, port: usize) -> Result<(), Error> {
        if port < self.num_inputs() {
            Ok(())
        } else {
            Err(Error::InputPort {
                port,
                count: self.num_inputs(),
            })
        }
    }

    pub fn add_input(&mut self, port: usize) -> Result<(), Error> {
        self.check(port)?;
        self.expected[port] += 1;
        self.remaining[port] += 1;
        Ok(())
    }

    pub fn set_input(&mut self, port: usize, batch: &Batch) -> Result<(), Error> {
        self.check(port)?;
        if self.remaining[port] <= 0 {
            return Err(Error::OverDelivered {
                port,
                expected: self.expected[port],
            });
        }
        self.pending[port].add_assign(batch);
        self.remaining[port] -= 1;
        Ok(())
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.remaining.iter().all(|&r| r == 0)
    }

    #[inline]
    pub fn batches(&self) -> &[Batch] {
        &self.pending
    }

    #[inline]
    pub fn remaining(&self) -> &[i32] {
        &self.remaining
    }

    /// Restore every counter to its edge count and zero the pending batches.
    pub fn reset(&mut self) {
        self.remaining.copy_from_slice(&self.expected);
        self.pending.iter_mut().for_each(Batch::clear);
    }
}

/// An ordinary node: an [`AudioNode`] computation behind the readiness protocol.
pub struct Transform<N> {
    node: N,
    inputs: Inputs,
    outputs: Vec<Batch>,
    produced: bool,
}

impl<N: AudioNode> Transform<N> {
    pub fn new(node: N) -> Self {
        let inputs = Inputs::new(node.num_inputs());
        let outputs = vec![Batch::silence(); node.num_outputs()];
        Self {
            node,
            inputs,
            outputs,
            produced: false,
        }
    }

    /// Box it up for the graph.
    pub fn boxed(node: N) -> Box<dyn Node> {
        Box::new(Self::new(node))
    }

    pub fn inner(&self) -> &N {
        &self.node
    }
}

impl<N: AudioNode> Node for Transform<N> {
    delegate! {
        to self.inputs {
            fn num_inputs(&self) -> usize;
            fn add_input(&mut self, port: usize) -> Result<(), Error>;
            fn set_input(&mut self, port: usize, batch: &Batch) -> Result<(), Error>;
            fn remaining(&self) -> &[i32];
            fn reset(&mut self);
        }
    }

    fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    fn get_output(&self, port: usize) -> Option<&Batch> {
        if self.produced {
            self.outputs.get(port)
        } else {
            None
        }
    }

    fn invoke(&mut self, ctx: &ProcessContext) -> Result<bool, Error> {
        if !self.inputs.is_ready() {
            return Ok(false);
        }

        self.outputs.iter_mut().for_each(Batch::clear);
        self.node.process(ctx, self.inputs.batches(), &mut self.outputs)?;
        self.inputs.reset();
        self.produced = true;
        Ok(true)
    }
}

/// An [`AudioNode`] made from a closure, for one-off computations.
///
/// ```
/// use klotz::{FnNode, Transform};
///
/// // Two inputs, one output: elementwise maximum.
/// let max = Transform::new(FnNode::new(2, 1, |_ctx, inputs, outputs| {
///     for (i, out) in outputs[0].iter_mut().enumerate() {
///         *out = inputs[0][i].max(inputs[1][i]);
///     }
///     Ok(())
/// }));
/// # let _ = max;
/// ```
pub struct FnNode<F> {
    inputs: usize,
    outputs: usize,
    f: F,
}

impl<F> FnNode<F>
where
    F: FnMut(&ProcessContext, &[Batch], &mut [Batch]) -> Result<(), Error> + Send + 'static,
{
    pub fn new(inputs: usize, outputs: usize, f: F) -> Self {
        Self { inputs, outputs, f }
    }
}

impl<F> AudioNode for FnNode<F>
where
    F: FnMut(&ProcessContext, &[Batch], &mut [Batch]) -> Result<(), Error> + Send + 'static,
{
    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error> {
        (self.f)(ctx, inputs, outputs)
    }

    fn num_inputs(&self) -> usize {
        self.inputs
    }

    fn num_outputs(&self) -> usize {
        self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> Box<dyn Node> {
        Transform::boxed(FnNode::new(2, 1, |_ctx, inputs, outputs| {
            outputs[0].add_assign(&inputs[0]);
            outputs[0].add_assign(&inputs[1]);
            Ok(())
        }))
    }

    #[test]
    fn not_ready_until_every_edge_delivers() {
        let ctx = ProcessContext::at_tick(0);
        let mut node = adder();
        node.add_input(0).unwrap();
        node.add_input(0).unwrap();
        node.add_input(1).unwrap();
        assert_eq!(node.remaining(), &[2, 1]);

        node.set_input(0, &Batch::splat(1.0)).unwrap();
        node.set_input(1, &Batch::splat(10.0)).unwrap();
        assert!(!node.invoke(&ctx).unwrap());
        assert!(node.get_output(0).is_none());

        node.set_input(0, &Batch::splat(2.0)).unwrap();
        assert!(node.invoke(&ctx).unwrap());
        assert_eq!(node.get_output(0).unwrap().constant(), Some(13.0));
        assert_eq!(node.remaining(), &[2, 1]);
    }

    #[test]
    fn pending_inputs_are_cleared_after_invoke() {
        let ctx = ProcessContext::at_tick(0);
        let mut node = adder();
        node.add_input(0).unwrap();
        node.set_input(0, &Batch::splat(4.0)).unwrap();
        assert!(node.invoke(&ctx).unwrap());

        node.set_input(0, &Batch::splat(1.0)).unwrap();
        assert!(node.invoke(&ctx).unwrap());
        assert_eq!(node.get_output(0).unwrap().constant(), Some(1.0));
    }

    #[test]
    fn unconnected_ports_count_as_silence() {
        let mut node = adder();
        assert!(node.invoke(&ProcessContext::at_tick(0)).unwrap());
        assert_eq!(node.get_output(0).unwrap().constant(), Some(0.0));
    }

    #[test]
    fn extra_delivery_is_an_error() {
        let mut node = adder();
        node.add_input(1).unwrap();
        node.set_input(1, &Batch::silence()).unwrap();
        assert!(matches!(
            node.set_input(1, &Batch::silence()),
            Err(Error::OverDelivered { port: 1, expected: 1 })
        ));
    }

    #[test]
    fn port_out_of_range() {
        let mut node = adder();
        assert!(matches!(node.add_input(2), Err(Error::InputPort { port: 2, count: 2 })));
        assert!(node.get_output(1).is_none());
    }

    #[test]
    fn reset_restores_counters() {
        let mut node = adder();
        node.add_input(0).unwrap();
        node.set_input(0, &Batch::splat(9.0)).unwrap();
        node.reset();
        assert_eq!(node.remaining(), &[1, 0]);
        node.set_input(0, &Batch::splat(1.0)).unwrap();
        assert!(node.invoke(&ProcessContext::at_tick(0)).unwrap());
        assert_eq!(node.get_output(0).unwrap().constant(), Some(1.0));
    }

    #[test]
    fn context_timestamp_follows_ticks() {
        assert_eq!(ProcessContext::at_tick(0).timestamp, 0.0);
        assert_eq!(ProcessContext::at_tick(3).timestamp, 3.0 * BATCH_DURATION);
    }
}
