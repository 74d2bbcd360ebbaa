//! Jitter buffer between an output node and the audio device.
//!
//! A [`Stream`] collects timestamped batches from the synthesis thread and drains
//! them, oldest first, into the [`RingWriter`] that the audio callback reads from.
//! A batch stamped at or before the newest one already queued is treated as a
//! rollback and crossfaded into the slot it belongs to instead of being appended.

use std::collections::VecDeque;

use crate::batch::{Batch, BATCH_DURATION};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::ring::{ring_buffer, RingReader, RingWriter};
use crate::throttle::Throttle;

struct Pending {
    timestamp: f64,
    batch: Batch,
}

pub struct Stream {
    pending: VecDeque<Pending>,
    capacity: usize,
    /// Timestamp of the newest batch appended so far.
    end_time: Option<f64>,
    fade_time: f64,
    writer: RingWriter,
    underflow_log: Throttle,
}

impl Stream {
    /// Create a stream and the reader for its ring buffer.
    pub fn new(config: &EngineConfig) -> (Self, RingReader) {
        let (writer, reader) = ring_buffer(config.ring_capacity);
        let stream = Self {
            pending: VecDeque::with_capacity(config.stream_capacity),
            capacity: config.stream_capacity.max(1),
            end_time: None,
            fade_time: config.fade_time,
            writer,
            underflow_log: Throttle::new(config.log_interval),
        };
        (stream, reader)
    }

    /// Batches waiting to be flushed.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Timestamp of the newest batch seen, if any.
    #[inline]
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// Queue a batch produced at `timestamp` (seconds of simulated time).
    ///
    /// Timestamps past the newest one are appended. Anything else is blended into
    /// the queued batch it overlaps with weight
    /// `p = clamp((end_time - timestamp) / fade_time, 0, 1)` on the existing samples,
    /// so a late batch close to the head mostly replaces it and one further back
    /// mostly fades out.
    pub fn add_samples(&mut self, timestamp: f64, batch: Batch) -> Result<(), Error> {
        match self.end_time {
            Some(end) if timestamp <= end => {
                let p = if self.fade_time > 0.0 {
                    ((end - timestamp) / self.fade_time).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let index = self.index_of_timestamp(timestamp)?;
                tracing::trace!(timestamp, index, p, "blending rolled-back batch");
                self.pending[index].batch.blend(&batch, p as f32);
            }
            _ => {
                if self.pending.len() == self.capacity {
                    if let Some(evicted) = self.pending.pop_front() {
                        tracing::debug!(timestamp = evicted.timestamp, "stream full, dropping oldest batch");
                    }
                }
                self.pending.push_back(Pending { timestamp, batch });
                self.end_time = Some(timestamp);
            }
        }
        Ok(())
    }

    /// Slot of the batch covering `timestamp`, counted from the oldest retained batch.
    pub fn index_of_timestamp(&self, timestamp: f64) -> Result<usize, Error> {
        let (oldest, newest) = match (self.pending.front(), self.pending.back()) {
            (Some(front), Some(back)) => (front.timestamp, back.timestamp),
            _ => return Err(Error::EmptyStream),
        };

        let offset = ((timestamp - oldest) / BATCH_DURATION).round();
        if offset < 0.0 {
            return Err(Error::StaleTimestamp { timestamp, oldest });
        }
        let index = offset as usize;
        if index >= self.pending.len() {
            return Err(Error::FutureTimestamp { timestamp, newest });
        }
        Ok(index)
    }

    /// Drain `duration` seconds of audio into the ring buffer.
    pub fn flush_samples(&mut self, duration: f64) -> usize {
        let count = (duration / BATCH_DURATION).round().max(0.0) as usize;
        self.flush_batches(count)
    }

    /// Drain `count` batches into the ring buffer, padding with silence if fewer are queued.
    ///
    /// Returns the number of silent batches written.
    pub fn flush_batches(&mut self, count: usize) -> usize {
        let mut missing = 0;
        for _ in 0..count {
            match self.pending.pop_front() {
                Some(p) => self.writer.push_slice(&p.batch),
                None => {
                    self.writer.push_slice(&Batch::silence());
                    missing += 1;
                }
            }
        }

        if missing > 0 {
            if let Some(suppressed) = self.underflow_log.check() {
                tracing::warn!(missing, suppressed, "stream underflow, padded with silence");
            }
        }
        missing
    }
}
