//! Observable player state.

use serde::{Deserialize, Serialize};

use super::common::{format_clock, format_duration, usable_duration, DEFAULT_VOLUME};
use super::sound::SoundItem;

/// Coarse playback phase derived from the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// Nothing has been played yet.
    #[default]
    Idle,
    /// A new source was assigned and is being loaded.
    Loading,
    Playing,
    /// A sound is current but not playing (paused, stopped, ended or rejected).
    Paused,
}

/// Read-only snapshot of the shared player, published to every observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// The sound most recently requested to play. Survives pause and stop.
    pub current_item: Option<SoundItem>,
    pub is_playing: bool,
    /// Last known playback position in seconds.
    pub position_seconds: f64,
    /// Total length in seconds; 0 means unknown.
    pub duration_seconds: f64,
    /// Output level in `[0, 1]`.
    pub volume: f64,
    pub phase: PlaybackPhase,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            current_item: None,
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            volume: DEFAULT_VOLUME,
            phase: PlaybackPhase::Idle,
        }
    }
}

impl PlayerSnapshot {
    /// Whether `sound` is the current sound.
    pub fn is_current(&self, sound: &SoundItem) -> bool {
        self.current_item
            .as_ref()
            .is_some_and(|current| current.same_sound(sound))
    }

    /// Playback progress as a rounded percentage, 0 while the duration is unknown.
    pub fn progress_percent(&self) -> u8 {
        usable_duration(self.duration_seconds).map_or(0, |duration| {
            let ratio = (self.position_seconds / duration).clamp(0.0, 1.0);
            (ratio * 100.0).round() as u8
        })
    }

    /// Volume as a rounded percentage.
    pub fn volume_percent(&self) -> u8 {
        let volume = if self.volume.is_finite() { self.volume } else { 0.0 };
        (volume.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// One-line `name  m:ss / m:ss  NN%  vol NN%` summary.
    pub fn status_line(&self) -> String {
        let name = self
            .current_item
            .as_ref()
            .map_or("-", |sound| sound.name.as_str());
        let state = if self.is_playing { "ON" } else { "OFF" };
        format!(
            "{name} [{state}]  {} / {}  {}%  vol {}%",
            format_clock(self.position_seconds),
            format_duration(self.duration_seconds),
            self.progress_percent(),
            self.volume_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_default_snapshot() {
        let snapshot = PlayerSnapshot::default();
        assert!(snapshot.current_item.is_none());
        assert!(!snapshot.is_playing);
        assert_eq!(snapshot.volume, 1.0);
        assert_eq!(snapshot.phase, PlaybackPhase::Idle);
    }

    #[test]
    fn test_progress_percent() {
        let mut snapshot = PlayerSnapshot {
            position_seconds: 15.0,
            duration_seconds: 60.0,
            ..PlayerSnapshot::default()
        };
        assert_eq!(snapshot.progress_percent(), 25);

        snapshot.duration_seconds = 0.0;
        assert_eq!(snapshot.progress_percent(), 0);

        snapshot.duration_seconds = 10.0;
        assert_eq!(snapshot.progress_percent(), 100);
    }

    #[test]
    fn test_volume_percent() {
        let snapshot = PlayerSnapshot {
            volume: 0.333,
            ..PlayerSnapshot::default()
        };
        assert_eq!(snapshot.volume_percent(), 33);
    }

    #[test]
    fn test_status_line() {
        let snapshot = PlayerSnapshot {
            current_item: Some(SoundItem::new("1", "Cortina")),
            is_playing: true,
            position_seconds: 65.0,
            duration_seconds: 130.0,
            volume: 0.5,
            phase: PlaybackPhase::Playing,
        };
        assert_eq!(snapshot.status_line(), "Cortina [ON]  1:05 / 2:10  50%  vol 50%");
    }

    #[test]
    fn test_is_current() {
        let snapshot = PlayerSnapshot {
            current_item: Some(SoundItem::new(5u64, "Bell")),
            ..PlayerSnapshot::default()
        };
        assert!(snapshot.is_current(&SoundItem::new("5", "Other name")));
        assert!(!snapshot.is_current(&SoundItem::new("6", "Bell")));
    }
}
