//! Collaborator services the player reports to.
//!
//! All of these are called fire-and-forget; the player never lets their
//! failures affect playback.

use std::future::Future;

use bytes::Bytes;

use crate::{Result, SoundId};

/// Store acknowledgement of a play-count update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCountUpdate {
    pub id: SoundId,
    pub play_count: u64,
}

/// Records how often each sound was started.
pub trait PlayCountService: Send + Sync + 'static {
    fn increment_play_count(
        &self,
        id: &SoundId,
        next_count: u64,
    ) -> impl Future<Output = Result<PlayCountUpdate>> + Send;
}

/// Persists durations discovered by the player back to the sound store.
pub trait DurationStore: Send + Sync + 'static {
    fn patch_duration(&self, id: &SoundId, seconds: f64) -> impl Future<Output = Result<()>> + Send;
}

/// Downloads the raw bytes of a source for out-of-band decoding.
pub trait SourceFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
}
