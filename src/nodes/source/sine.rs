//! Sine wave oscillator

use core::f64::consts::TAU;

use crate::batch::Batch;
use crate::error::Error;
use crate::node::{AudioNode, ProcessContext};

/// A sine oscillator driven by a per-sample frequency input (Hz).
///
/// Phase is accumulated in `f64` and carried across ticks, so frequency changes
/// do not click.
pub struct Sine {
    phase: f64,
    amplitude: f32,
}

impl Sine {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            amplitude: 1.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

impl Default for Sine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Sine {
    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error> {
        let rate = ctx.sample_rate as f64;

        for (out, &freq) in outputs[0].iter_mut().zip(inputs[0].iter()) {
            *out = (self.phase * TAU).sin() as f32 * self.amplitude;
            self.phase = (self.phase + freq.max(0.0) as f64 / rate).fract();
        }
        Ok(())
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 1 }
}
