//! Lock-free sample ring shared between the decode worker and the output callback.
//!
//! Single producer (worker thread), single consumer (cpal callback). Samples
//! are stored as raw `f32` bits in atomics so neither side ever blocks or
//! allocates.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded SPSC ring of interleaved `f32` samples.
pub struct SampleRing {
    slots: Box<[AtomicU32]>,
    /// Total samples ever popped.
    head: AtomicUsize,
    /// Total samples ever pushed.
    tail: AtomicUsize,
}

impl SampleRing {
    /// Create a ring holding at least `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Samples waiting to be read.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots available for writing.
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Producer side. Returns how many samples were accepted.
    pub fn push_slice(&self, samples: &[f32]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        let room = self.capacity() - tail.wrapping_sub(head);
        let count = samples.len().min(room);
        let mask = self.capacity() - 1;

        for (offset, sample) in samples[..count].iter().enumerate() {
            self.slots[tail.wrapping_add(offset) & mask].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Consumer side. Returns how many samples were written into `out`.
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let count = out.len().min(tail.wrapping_sub(head));
        let mask = self.capacity() - 1;

        for (offset, slot) in out[..count].iter_mut().enumerate() {
            *slot = f32::from_bits(self.slots[head.wrapping_add(offset) & mask].load(Ordering::Relaxed));
        }
        self.head.store(head.wrapping_add(count), Ordering::Release);
        count
    }

    /// Drop everything queued. Only the producer may call this, and only
    /// while the consumer is outputting silence.
    pub fn clear(&self) {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.store(tail, Ordering::Release);
    }
}

/// Thread-safe reference to a sample ring.
pub type SharedRing = Arc<SampleRing>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_push_pop() {
        let ring = SampleRing::new(8);
        assert_eq!(ring.push_slice(&[0.25, -0.5, 1.0]), 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0.0f32; 4];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(&out[..3], &[0.25, -0.5, 1.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_capacity_rounds_up() {
        assert_eq!(SampleRing::new(5).capacity(), 8);
        assert_eq!(SampleRing::new(0).capacity(), 1);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_wraparound_keeps_order() {
        let ring = SampleRing::new(4);
        ring.push_slice(&[1.0, 2.0, 3.0]);
        let mut out = [0.0f32; 2];
        ring.pop_into(&mut out);
        assert_eq!(ring.push_slice(&[4.0, 5.0, 6.0]), 3);

        let mut rest = [0.0f32; 4];
        assert_eq!(ring.pop_into(&mut rest), 4);
        assert_eq!(rest, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_full_ring_rejects() {
        let ring = SampleRing::new(2);
        assert_eq!(ring.push_slice(&[1.0, 2.0, 3.0]), 2);
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.push_slice(&[4.0]), 0);
    }

    #[test]
    fn test_clear() {
        let ring = SampleRing::new(16);
        ring.push_slice(&[0.5; 10]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 16);
    }

    #[test]
    fn test_concurrent_transfer() {
        use std::thread;

        let ring = Arc::new(SampleRing::new(256));
        let producer = Arc::clone(&ring);

        let writer = thread::spawn(move || {
            let chunk = [0.1f32; 64];
            let mut sent = 0;
            while sent < 10_000 {
                let n = producer.push_slice(&chunk);
                if n == 0 {
                    thread::yield_now();
                }
                sent += n;
            }
            sent
        });

        let mut received = 0;
        let mut out = [0.0f32; 64];
        while received < 10_000 {
            let n = ring.pop_into(&mut out);
            if n == 0 {
                thread::yield_now();
            }
            received += n;
        }

        assert!(writer.join().unwrap() >= 10_000);
        assert!(received >= 10_000);
    }
}
