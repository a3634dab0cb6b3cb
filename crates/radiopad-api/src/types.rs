//! Wire types of the sound store.

use radiopad_core::{SoundId, SoundItem};
use serde::{Deserialize, Serialize};

/// A sound as the store serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundRecord {
    pub id: SoundId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub play_count: Option<u64>,
    /// `global`, `program` or `user`.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub program_id: Option<SoundId>,
    #[serde(default)]
    pub owner_user_id: Option<SoundId>,
}

impl From<SoundRecord> for SoundItem {
    fn from(record: SoundRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            source_url: record.file_url,
            known_duration_seconds: record.duration_seconds,
            play_count: record.play_count.unwrap_or(0),
        }
    }
}

/// `PATCH /sounds/{id}` body for a play-count bump.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayCountPatch {
    pub play_count: u64,
}

/// `PATCH /sounds/{id}` body for a discovered duration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DurationPatch {
    pub duration_seconds: f64,
}

/// The fields of a PATCH answer the player cares about. The store echoes the
/// whole record, but only these are relied on.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatchAck {
    #[serde(default)]
    pub id: Option<SoundId>,
    #[serde(default)]
    pub play_count: Option<u64>,
}
