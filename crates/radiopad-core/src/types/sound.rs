//! Sound item type representing a single playable FX clip.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::common::usable_duration;

/// Opaque sound identifier.
///
/// The store hands out numeric ids from the mock backend and string ids from
/// the hosted one, so identity is always compared on the stringified form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SoundId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for SoundId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for SoundId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Unsigned(n) => Self(n.to_string()),
            RawId::Signed(n) => Self(n.to_string()),
        })
    }
}

/// A playable FX clip, as supplied by the sound library.
///
/// The engine only ever reads these; it never mutates the library's copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundItem {
    /// Store identifier.
    pub id: SoundId,
    /// Display label.
    pub name: String,
    /// Locator of the audio resource. Missing or blank means not playable.
    pub source_url: Option<String>,
    /// Duration already known to the store, if any.
    pub known_duration_seconds: Option<f64>,
    /// Number of times the clip has been started.
    pub play_count: u64,
}

impl SoundItem {
    pub fn new(id: impl Into<SoundId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_url: None,
            known_duration_seconds: None,
            play_count: 0,
        }
    }

    #[must_use]
    pub fn with_source(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_known_duration(mut self, seconds: f64) -> Self {
        self.known_duration_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_play_count(mut self, count: u64) -> Self {
        self.play_count = count;
        self
    }

    /// The trimmed source locator, if there is a non-blank one.
    pub fn playable_url(&self) -> Option<&str> {
        self.source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether the clip has a source at all.
    pub fn is_playable(&self) -> bool {
        self.playable_url().is_some()
    }

    /// Whether the clip is a video. Videos are rendered with native controls
    /// elsewhere and never go through the shared player.
    pub fn is_video(&self) -> bool {
        self.playable_url().is_some_and(|url| {
            let url = url.to_ascii_lowercase();
            url.ends_with(".mp4") || url.contains(".mp4?")
        })
    }

    /// Playable and not a video.
    pub fn is_audio(&self) -> bool {
        self.is_playable() && !self.is_video()
    }

    /// The store-provided duration, if it is usable.
    pub fn known_duration(&self) -> Option<f64> {
        self.known_duration_seconds.and_then(usable_duration)
    }

    /// Identity comparison on the stringified id.
    pub fn same_sound(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
