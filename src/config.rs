//! Engine configuration.

use std::time::Duration;

use crate::batch::{BATCH_DURATION, SAMPLE_RATE};

/// Tunables for streams, ring buffers and the synthesis loop.
///
/// All fields have sensible defaults; use the `with_*` builders to adjust them:
///
/// ```
/// use klotz::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_latency_batches(4)
///     .with_ring_capacity(88_000);
/// assert_eq!(config.latency_batches, 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Window over which a rolled-back batch fades into the one already queued, in seconds.
    pub fade_time: f64,
    /// Maximum number of batches a stream keeps pending before evicting the oldest.
    pub stream_capacity: usize,
    /// Ring buffer size in samples (one second of audio by default).
    pub ring_capacity: usize,
    /// Batches an output holds back before draining, so late batches can still fade in.
    pub latency_batches: usize,
    /// How many ticks the synthesis loop stays ahead of wall-clock time.
    pub lookahead_batches: u64,
    /// Capacity of the bridge → engine command queue.
    pub command_capacity: usize,
    /// Minimum time between repeated underflow warnings.
    pub log_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fade_time: BATCH_DURATION,
            stream_capacity: 64,
            ring_capacity: SAMPLE_RATE as usize,
            latency_batches: 2,
            lookahead_batches: 4,
            command_capacity: 256,
            log_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    pub fn with_fade_time(mut self, seconds: f64) -> Self {
        self.fade_time = seconds.max(0.0);
        self
    }

    pub fn with_stream_capacity(mut self, batches: usize) -> Self {
        self.stream_capacity = batches.max(1);
        self
    }

    pub fn with_ring_capacity(mut self, samples: usize) -> Self {
        self.ring_capacity = samples.max(1);
        self
    }

    pub fn with_latency_batches(mut self, batches: usize) -> Self {
        self.latency_batches = batches;
        self
    }

    pub fn with_lookahead_batches(mut self, batches: u64) -> Self {
        self.lookahead_batches = batches;
        self
    }

    pub fn with_command_capacity(mut self, commands: usize) -> Self {
        self.command_capacity = commands.max(1);
        self
    }

    pub fn with_log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }
}
