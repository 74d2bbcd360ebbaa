//! Biquad filter block

use crate::batch::Batch;
use crate::biquad::{BiQuad, Coefficients};
use crate::error::Error;
use crate::node::{AudioNode, ProcessContext};

/// Which coefficient generator a [`Filter`] uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

impl FilterKind {
    fn coefficients(self, f0: f64, gain: f64, slope: f64, sample_rate: f64) -> Coefficients {
        match self {
            FilterKind::LowPass => Coefficients::low_pass(f0, gain, slope, sample_rate),
            FilterKind::HighPass => Coefficients::high_pass(f0, gain, slope, sample_rate),
        }
    }
}

/// Input ports of a [`Filter`].
pub mod port {
    pub const SIGNAL: usize = 0;
    pub const F0: usize = 1;
    pub const GAIN: usize = 2;
    pub const SLOPE: usize = 3;
}

/// Biquad filter with audio-rate control inputs.
///
/// Inputs: signal, center frequency (Hz), gain (dB), slope. Coefficients are
/// only recomputed when a control value differs from the previous sample's.
pub struct Filter {
    kind: FilterKind,
    biquad: BiQuad,
    /// Controls the current coefficients were derived from.
    controls: Option<[f32; 3]>,
    updates: usize,
}

impl Filter {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            biquad: BiQuad::default(),
            controls: None,
            updates: 0,
        }
    }

    pub fn low_pass() -> Self {
        Self::new(FilterKind::LowPass)
    }

    pub fn high_pass() -> Self {
        Self::new(FilterKind::HighPass)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn biquad(&self) -> &BiQuad {
        &self.biquad
    }

    /// How many times coefficients have been derived from the controls.
    pub fn coefficient_updates(&self) -> usize {
        self.updates
    }
}

impl AudioNode for Filter {
    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[Batch],
        outputs: &mut [Batch],
    ) -> Result<(), Error> {
        let sample_rate = ctx.sample_rate as f64;
        let signal = &inputs[port::SIGNAL];

        for (i, out) in outputs[0].iter_mut().enumerate() {
            let controls = [inputs[port::F0][i], inputs[port::GAIN][i], inputs[port::SLOPE][i]];
            if self.controls != Some(controls) {
                let [f0, gain, slope] = controls;
                self.biquad.set_coefficients(self.kind.coefficients(
                    f0 as f64,
                    gain as f64,
                    slope as f64,
                    sample_rate,
                ));
                self.controls = Some(controls);
                self.updates += 1;
            }
            *out = self.biquad.process(signal[i])?;
        }
        Ok(())
    }

    #[inline]
    fn num_inputs(&self) -> usize { 4 }

    #[inline]
    fn num_outputs(&self) -> usize { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::low_pass_filter;

    fn controls(f0: f32, gain: f32, slope: f32) -> [Batch; 3] {
        [Batch::splat(f0), Batch::splat(gain), Batch::splat(slope)]
    }

    #[test]
    fn derives_coefficients_from_controls() {
        let mut filter = Filter::low_pass();
        let [f0, gain, slope] = controls(600.0, 6.0, 1.0);
        let mut out = [Batch::silence()];
        filter
            .process(&ProcessContext::at_tick(0), &[Batch::splat(1.0), f0, gain, slope], &mut out)
            .unwrap();

        assert_eq!(*filter.biquad().coefficients(), low_pass_filter(600.0, 6.0, 1.0));
        let c = low_pass_filter(600.0, 6.0, 1.0);
        assert!((out[0][0] as f64 - c.b0).abs() < 1e-7);
    }

    #[test]
    fn history_carries_across_batches() {
        let mut filter = Filter::low_pass();
        let ctx = ProcessContext::at_tick(0);
        let mut out = [Batch::silence()];
        let [f0, gain, slope] = controls(600.0, 0.0, 1.0);
        let inputs = [Batch::splat(1.0), f0, gain, slope];

        filter.process(&ctx, &inputs, &mut out).unwrap();
        let end_of_first = out[0][511];
        filter.process(&ctx, &inputs, &mut out).unwrap();
        assert!(out[0][0] >= end_of_first);
    }

    #[test]
    fn mid_batch_control_change_switches_coefficients_at_that_sample() {
        let mut filter = Filter::low_pass();
        let signal = Batch::from_fn(|i| ((i % 37) as f32 / 37.0) - 0.5);
        let f0 = Batch::from_fn(|i| if i < 256 { 600.0 } else { 2000.0 });
        let mut out = [Batch::silence()];
        filter
            .process(
                &ProcessContext::at_tick(0),
                &[signal.clone(), f0, Batch::splat(0.0), Batch::splat(1.0)],
                &mut out,
            )
            .unwrap();

        let mut reference = BiQuad::new(low_pass_filter(600.0, 0.0, 1.0));
        for (i, &x) in signal.iter().enumerate() {
            if i == 256 {
                reference.set_coefficients(low_pass_filter(2000.0, 0.0, 1.0));
            }
            assert_eq!(out[0][i], reference.process(x).unwrap(), "sample {}", i);
        }
        assert_eq!(*filter.biquad().coefficients(), low_pass_filter(2000.0, 0.0, 1.0));
        assert_eq!(filter.coefficient_updates(), 2);
    }

    #[test]
    fn unchanged_controls_keep_coefficients_across_batches() {
        let mut filter = Filter::high_pass();
        let ctx = ProcessContext::at_tick(0);
        let [f0, gain, slope] = controls(800.0, 3.0, 0.7);
        let inputs = [Batch::splat(0.5), f0, gain, slope];
        let mut out = [Batch::silence()];

        for _ in 0..3 {
            filter.process(&ctx, &inputs, &mut out).unwrap();
        }
        assert_eq!(filter.coefficient_updates(), 1);
        let expected = Coefficients::high_pass(800.0, 3.0, 0.7f32 as f64, ctx.sample_rate as f64);
        assert_eq!(*filter.biquad().coefficients(), expected);
    }

    #[test]
    fn invalid_controls_diverge() {
        let mut filter = Filter::low_pass();
        // Zero slope: 1/slope is infinite and the coefficients are NaN.
        let [f0, gain, slope] = controls(600.0, 0.0, 0.0);
        let mut out = [Batch::silence()];
        let result = filter.process(&ProcessContext::at_tick(0), &[Batch::splat(1.0), f0, gain, slope], &mut out);
        assert!(matches!(result, Err(Error::Diverged { .. })));
    }

    #[test]
    fn high_pass_tolerates_zero_slope() {
        let mut filter = Filter::high_pass();
        let [f0, gain, slope] = controls(600.0, 0.0, 0.0);
        let mut out = [Batch::silence()];
        filter
            .process(&ProcessContext::at_tick(0), &[Batch::splat(1.0), f0, gain, slope], &mut out)
            .unwrap();
        assert!(out[0].iter().all(|s| s.is_finite()));
    }
}
