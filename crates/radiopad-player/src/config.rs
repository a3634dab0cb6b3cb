//! Player tuning.

use std::time::Duration;

use radiopad_core::DEFAULT_VOLUME;

/// Position sampling interval while playing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Seek target used to make a resource resolve its real length. Larger than
/// any real clip.
pub const DEFAULT_SEEK_PROBE_SENTINEL: f64 = 1.0e7;

/// Configuration for a [`PlaybackEngine`](crate::PlaybackEngine) and its driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub poll_interval: Duration,
    pub initial_volume: f64,
    pub seek_probe_sentinel: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_volume: DEFAULT_VOLUME,
            seek_probe_sentinel: DEFAULT_SEEK_PROBE_SENTINEL,
        }
    }
}
