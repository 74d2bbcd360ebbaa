//! Lock-free single-producer/single-consumer sample buffer.
//!
//! The synthesis thread owns the [`RingWriter`], the audio callback owns the
//! [`RingReader`]. The writer never blocks: once the reader falls more than one
//! buffer behind, the oldest unread samples are overwritten.
//!
//! Only the write cursor is shared. The read cursor lives in the reader and is
//! never published, so a writer that laps the reader in the middle of a pop can
//! hand out a sample from the new lap. Size the buffer well beyond the expected
//! drain latency (the engine default is one second of audio) and this race is
//! out of reach.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared {
    data: Box<[AtomicU32]>,
    /// Total samples ever written. Only the writer stores to it.
    write: AtomicUsize,
}

impl Shared {
    #[inline]
    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// Create a ring buffer holding `capacity` samples and split it into its two halves.
pub fn ring_buffer(capacity: usize) -> (RingWriter, RingReader) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        data: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        write: AtomicUsize::new(0),
    });

    (
        RingWriter {
            shared: shared.clone(),
            write: 0,
        },
        RingReader { shared, read: 0 },
    )
}

/// Producer half, owned by the synthesis thread.
pub struct RingWriter {
    shared: Arc<Shared>,
    write: usize,
}

impl RingWriter {
    /// Append one sample. Always succeeds.
    #[inline]
    pub fn push(&mut self, value: f32) {
        self.store(value);
        self.shared.write.store(self.write, Ordering::Release);
    }

    /// Append a run of samples, publishing the new cursor once at the end.
    pub fn push_slice(&mut self, values: &[f32]) {
        for &v in values {
            self.store(v);
        }
        self.shared.write.store(self.write, Ordering::Release);
    }

    #[inline]
    fn store(&mut self, value: f32) {
        let slot = self.write % self.shared.capacity();
        self.shared.data[slot].store(value.to_bits(), Ordering::Relaxed);
        self.write = self.write.wrapping_add(1);
    }

    /// Total samples written since creation.
    #[inline]
    pub fn written(&self) -> usize {
        self.write
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Consumer half, owned by the audio callback.
pub struct RingReader {
    shared: Arc<Shared>,
    read: usize,
}

impl RingReader {
    /// Unread samples as seen right now. May exceed the capacity if the writer lapped us.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared.write.load(Ordering::Acquire).wrapping_sub(self.read)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Take the oldest unread sample, or `None` if nothing is waiting.
    #[inline]
    pub fn pop(&mut self) -> Option<f32> {
        let write = self.shared.write.load(Ordering::Acquire);
        let size = write.wrapping_sub(self.read);
        if size == 0 {
            return None;
        }
        if size > self.capacity() {
            // Overwritten; skip to the oldest sample still in the buffer.
            self.read = write.wrapping_sub(self.capacity());
        }

        let slot = self.read % self.capacity();
        let bits = self.shared.data[slot].load(Ordering::Relaxed);
        self.read = self.read.wrapping_add(1);
        Some(f32::from_bits(bits))
    }

    /// Fill an interleaved frame buffer, writing each mono sample to all `channels`.
    ///
    /// Frames that cannot be filled get silence. Returns the number of silent frames.
    /// Does not allocate, so it is safe to call from a hardware callback.
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize) -> usize {
        self.fill_interleaved_with(data, channels, |s| s)
    }

    /// [`fill_interleaved`](Self::fill_interleaved) for any device sample type,
    /// converting each popped sample (or the 0.0 padding) with `convert`.
    pub fn fill_interleaved_with<T: Copy>(
        &mut self,
        data: &mut [T],
        channels: usize,
        convert: impl Fn(f32) -> T,
    ) -> usize {
        let mut underflow = 0;
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.pop().unwrap_or_else(|| {
                underflow += 1;
                0.0
            });
            frame.fill(convert(sample));
        }
        underflow
    }
}
