//! State shared between the resource handle, its worker, and the output callback.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::RwLock;

/// Shared transport state.
///
/// The handle writes intent (paused, volume, generation), the worker writes
/// what it learned about the source, and the output callback counts frames.
pub struct Transport {
    paused: AtomicBool,
    volume_bits: AtomicU32,
    /// Bumped on every load; results computed for an older generation are dropped.
    generation: AtomicU64,
    /// Frames rendered by the output since `base`.
    frames_played: AtomicU64,
    device_rate: AtomicU32,
    output_failed: AtomicBool,
    /// Source position (seconds) that `frames_played` counts from.
    base: RwLock<f64>,
    duration: RwLock<Option<f64>>,
}

impl Transport {
    pub fn new(volume: f32) -> Self {
        Self {
            paused: AtomicBool::new(true),
            volume_bits: AtomicU32::new(volume.to_bits()),
            generation: AtomicU64::new(0),
            frames_played: AtomicU64::new(0),
            device_rate: AtomicU32::new(48_000),
            output_failed: AtomicBool::new(false),
            base: RwLock::new(0.0),
            duration: RwLock::new(None),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new generation and return it.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn add_frames(&self, frames: u64) {
        self.frames_played.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate.load(Ordering::Relaxed)
    }

    pub fn set_device_rate(&self, rate: u32) {
        self.device_rate.store(rate.max(1), Ordering::Relaxed);
    }

    pub fn output_failed(&self) -> bool {
        self.output_failed.load(Ordering::Acquire)
    }

    pub fn mark_output_failed(&self) {
        self.output_failed.store(true, Ordering::Release);
    }

    /// Re-anchor the playhead, e.g. after a load or a seek.
    pub fn rebase(&self, seconds: f64) {
        *self.base.write() = seconds;
        self.frames_played.store(0, Ordering::Relaxed);
    }

    /// Playhead in seconds, clamped to the duration when one is known.
    pub fn position(&self) -> f64 {
        let played = self.frames_played.load(Ordering::Relaxed) as f64 / f64::from(self.device_rate());
        let position = *self.base.read() + played;
        match *self.duration.read() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        *self.duration.read()
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        *self.duration.write() = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_counts_frames_from_base() {
        let transport = Transport::new(1.0);
        transport.set_device_rate(1000);
        transport.rebase(2.0);
        transport.add_frames(500);
        assert!((transport.position() - 2.5).abs() < 1e-9);

        transport.set_duration(Some(2.2));
        assert!((transport.position() - 2.2).abs() < 1e-9);
    }

    #[test]
    fn test_generations() {
        let transport = Transport::new(1.0);
        let first = transport.next_generation();
        let second = transport.next_generation();
        assert!(!transport.is_current(first));
        assert!(transport.is_current(second));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_volume_roundtrip() {
        let transport = Transport::new(0.25);
        assert_eq!(transport.volume(), 0.25);
        transport.set_volume(0.75);
        assert_eq!(transport.volume(), 0.75);
        assert!(transport.is_paused());
    }
}
