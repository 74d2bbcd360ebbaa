//! Externally controlled constant source

use crate::batch::Batch;
use crate::error::Error;
use crate::node::{Node, ProcessContext};
use crate::value::ValueCell;

/// A source whose output is a constant batch of an atomically settable value.
///
/// The value can be changed from any thread through the shared [`ValueCell`];
/// the new value is picked up on the next tick. Until it is first set the
/// output is silence.
pub struct Injector {
    value: ValueCell,
    output: Batch,
}

impl Injector {
    pub fn new(value: ValueCell) -> Self {
        Self {
            value,
            output: Batch::silence(),
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value.get()
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new(ValueCell::default())
    }
}

impl Node for Injector {
    fn num_inputs(&self) -> usize { 0 }

    fn num_outputs(&self) -> usize { 1 }

    fn add_input(&mut self, port: usize) -> Result<(), Error> {
        Err(Error::InputPort { port, count: 0 })
    }

    fn set_input(&mut self, port: usize, _batch: &Batch) -> Result<(), Error> {
        Err(Error::InputPort { port, count: 0 })
    }

    fn get_output(&self, port: usize) -> Option<&Batch> {
        (port == 0).then_some(&self.output)
    }

    fn invoke(&mut self, _ctx: &ProcessContext) -> Result<bool, Error> {
        self.output.fill(self.value.get());
        Ok(true)
    }

    fn value_cell(&self) -> Option<ValueCell> {
        Some(self.value.clone())
    }
}
