//! Fixed-size sample batches and the simulated clock constants.

use core::ops::{Deref, DerefMut};

/// Number of samples in one batch. Every node consumes and produces batches of this length.
pub const BATCH_SIZE: usize = 512;

/// Sample rate of the engine in Hz.
pub const SAMPLE_RATE: u32 = 44_000;

/// Duration of one batch in seconds (≈11.6 ms). Simulated time advances by this much per tick.
pub const BATCH_DURATION: f64 = BATCH_SIZE as f64 / SAMPLE_RATE as f64;

/// One tick's worth of mono audio.
///
/// Batches are plain values: cloning copies the samples, so every consumer of a
/// batch owns its own copy.
#[derive(Clone, PartialEq)]
pub struct Batch([f32; BATCH_SIZE]);

impl Batch {
    /// A batch of silence.
    pub const fn silence() -> Self {
        Self([0.0; BATCH_SIZE])
    }

    /// A batch where every sample is `value`.
    pub const fn splat(value: f32) -> Self {
        Self([value; BATCH_SIZE])
    }

    /// Build a batch from a per-sample function of the sample index.
    pub fn from_fn(f: impl FnMut(usize) -> f32) -> Self {
        Self(core::array::from_fn(f))
    }

    /// Set every sample to `value`.
    #[inline]
    pub fn fill(&mut self, value: f32) {
        self.0.fill(value);
    }

    /// Reset to silence.
    #[inline]
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Elementwise `self += other`.
    #[inline]
    pub fn add_assign(&mut self, other: &Batch) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
    }

    /// Elementwise `self = p * self + (1 - p) * other`.
    pub fn blend(&mut self, other: &Batch, p: f32) {
        let q = 1.0 - p;
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = p * *a + q * *b;
        }
    }

    /// Returns the sample value if every sample is identical.
    pub fn constant(&self) -> Option<f32> {
        let first = self.0[0];
        self.0.iter().all(|&s| s == first).then_some(first)
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::silence()
    }
}

impl Deref for Batch {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl DerefMut for Batch {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl core::fmt::Debug for Batch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.constant() {
            Some(v) => write!(f, "Batch([{}; {}])", v, BATCH_SIZE),
            None => f
                .debug_tuple("Batch")
                .field(&&self.0[..4])
                .field(&"..")
                .finish(),
        }
    }
}
