//! Mixer effect - sums multiple inputs together

use crate::batch::Batch;
use crate::error::Error;
use crate::node::{AudioNode, ProcessContext};

/// A mixer that sums its input ports with equal weight.
///
/// Edges landing on the same port are already summed by the graph; the mixer
/// is for keeping sources on separate ports so they can be patched independently.
pub struct Mixer {
    inputs: usize,
}

impl Mixer {
    /// Create a mixer with the given number of input ports
    pub fn new(inputs: usize) -> Self {
        Self { inputs }
    }

    /// Two-input mixer
    pub fn pair() -> Self {
        Self::new(2)
    }
}

impl AudioNode for Mixer {
    fn process(
        &mut self,
        _ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error> {
        for input in inputs {
            outputs[0].add_assign(input);
        }
        Ok(())
    }

    fn num_inputs(&self) -> usize {
        self.inputs
    }

    fn num_outputs(&self) -> usize {
        1
    }
}
