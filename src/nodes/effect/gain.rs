//! Gain/volume control effect

use crate::batch::Batch;
use crate::error::Error;
use crate::node::{AudioNode, ProcessContext};

/// Multiplies a signal (input 0) by a per-sample gain (input 1).
///
/// With smoothing enabled the applied gain follows the control input through a
/// one-pole lowpass, which keeps stepwise control changes from clicking.
pub struct Gain {
    smoothed_gain: f32,
    /// Smoothing coefficient (0.0 = instant, 1.0 = no change)
    smooth_coeff: f32,
}

impl Gain {
    /// A gain without smoothing.
    pub fn new() -> Self {
        Self {
            smoothed_gain: 0.0,
            smooth_coeff: 0.0,
        }
    }

    /// Set the smoothing time in milliseconds
    pub fn with_smoothing_ms(mut self, ms: f32, sample_rate: u32) -> Self {
        // Time constant: after `ms` milliseconds, we've reached ~63% of target
        let samples = (ms / 1000.0) * sample_rate as f32;
        self.smooth_coeff = if samples > 0.0 { (-1.0 / samples).exp() } else { 0.0 };
        self
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for Gain {
    fn process(
        &mut self,
        _ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error> {
        let coeff = self.smooth_coeff;
        let mut gain = self.smoothed_gain;

        for ((out, &x), &target) in outputs[0].iter_mut().zip(inputs[0].iter()).zip(inputs[1].iter()) {
            gain = target + coeff * (gain - target);
            *out = x * gain;
        }

        self.smoothed_gain = gain;
        Ok(())
    }

    #[inline]
    fn num_inputs(&self) -> usize { 2 }

    #[inline]
    fn num_outputs(&self) -> usize { 1 }
}
