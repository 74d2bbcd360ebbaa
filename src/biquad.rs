//! Biquad (second-order IIR) filter.
//!
//! Implements the Direct Form I recurrence
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
//!                - a1*y[n-1] - a2*y[n-2]
//! ```
//! with coefficients normalized so that `a0 = 1`. Coefficients and history are
//! kept in `f64`; only the samples going in and out are `f32`.

use core::f64::consts::PI;

use crate::batch::SAMPLE_RATE;
use crate::error::Error;

/// Smallest slope the high-pass generator accepts.
pub const MIN_SLOPE: f64 = 1e-4;

/// Normalized biquad coefficients.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Coefficients {
    /// `y[n] = x[n]`.
    pub const IDENTITY: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Low-pass response around `f0` Hz.
    ///
    /// `gain` is in dB and `slope` shapes the resonance (1.0 is the steepest
    /// slope without a peak).
    pub fn low_pass(f0: f64, gain: f64, slope: f64, sample_rate: f64) -> Self {
        let (cos_w, alpha) = shape(f0, gain, slope, sample_rate);
        let norm = 1.0 / (1.0 + alpha);

        Self {
            b0: (1.0 - cos_w) / 2.0 * norm,
            b1: (1.0 - cos_w) * norm,
            b2: (1.0 - cos_w) / 2.0 * norm,
            a1: -2.0 * cos_w * norm,
            a2: (1.0 - alpha) * norm,
        }
    }

    /// High-pass response around `f0` Hz. `slope` is floored to [`MIN_SLOPE`].
    pub fn high_pass(f0: f64, gain: f64, slope: f64, sample_rate: f64) -> Self {
        let (cos_w, alpha) = shape(f0, gain, slope.max(MIN_SLOPE), sample_rate);
        let norm = 1.0 / (1.0 + alpha);

        Self {
            b0: (1.0 + cos_w) / 2.0 * norm,
            b1: -(1.0 + cos_w) * norm,
            b2: (1.0 + cos_w) / 2.0 * norm,
            a1: -2.0 * cos_w * norm,
            a2: (1.0 - alpha) * norm,
        }
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Returns `(cos(w), alpha)` shared by both generators.
fn shape(f0: f64, gain: f64, slope: f64, sample_rate: f64) -> (f64, f64) {
    let w = 2.0 * PI * f0 / sample_rate;
    let a = 10f64.powf(gain / 40.0);
    let alpha = 0.5 * w.sin() * ((a + 1.0 / a) * (1.0 / slope - slope) + 2.0).sqrt();
    (w.cos(), alpha)
}

/// Low-pass coefficients at the engine sample rate.
pub fn low_pass_filter(f0: f64, gain: f64, slope: f64) -> Coefficients {
    Coefficients::low_pass(f0, gain, slope, SAMPLE_RATE as f64)
}

/// High-pass coefficients at the engine sample rate.
pub fn high_pass_filter(f0: f64, gain: f64, slope: f64) -> Coefficients {
    Coefficients::high_pass(f0, gain, slope, SAMPLE_RATE as f64)
}

/// Coefficients plus the two-sample input and output history.
#[derive(Clone, Debug, Default)]
pub struct BiQuad {
    coefficients: Coefficients,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiQuad {
    pub fn new(coefficients: Coefficients) -> Self {
        Self {
            coefficients,
            ..Self::default()
        }
    }

    /// Swap coefficients, keeping history.
    #[inline]
    pub fn set_coefficients(&mut self, coefficients: Coefficients) {
        self.coefficients = coefficients;
    }

    #[inline]
    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// `[x[n-1], x[n-2], y[n-1], y[n-2]]`.
    pub fn history(&self) -> [f64; 4] {
        [self.x1, self.x2, self.y1, self.y2]
    }

    /// Filter one sample.
    ///
    /// A non-finite output means the recurrence diverged; the error carries the
    /// coefficients and the history that produced it, and the history is left untouched.
    #[inline]
    pub fn process(&mut self, input: f32) -> Result<f32, Error> {
        let c = &self.coefficients;
        let x = input as f64;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        if !y.is_finite() {
            return Err(Error::Diverged {
                input,
                coefficients: self.coefficients,
                history: self.history(),
            });
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        Ok(y as f32)
    }

    /// Clear the history without touching the coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
