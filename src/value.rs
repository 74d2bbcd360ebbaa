//! Atomic scalar shared between a control thread and the synthesis thread.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A single `f32` that any thread can set and the synthesis thread reads once per tick.
///
/// Clones share the same cell. Stores are whole-word atomics, so a reader always sees
/// some previously written value, never a torn one. There is no other synchronization:
/// a value set mid-tick shows up on the next tick.
#[derive(Clone, Debug, Default)]
pub struct ValueCell {
    bits: Arc<AtomicU32>,
}

impl ValueCell {
    pub fn new(value: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(value.to_bits())),
        }
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        assert_eq!(ValueCell::default().get(), 0.0);
    }

    #[test]
    fn clones_share_storage() {
        let a = ValueCell::new(1.0);
        let b = a.clone();
        b.set(-3.5);
        assert_eq!(a.get(), -3.5);
    }

    #[test]
    fn set_from_another_thread() {
        let cell = ValueCell::new(0.0);
        let writer = cell.clone();
        std::thread::spawn(move || writer.set(440.0)).join().unwrap();
        assert_eq!(cell.get(), 440.0);
    }
}
