//! The media resource seam.
//!
//! The player owns exactly one [`MediaResource`] for its whole lifetime and is
//! the only component allowed to drive it. Implementations report what happens
//! on the output side through [`MediaEvent`]s delivered back to the player.

use crate::Result;

/// Low-level notifications emitted by a media resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Metadata was loaded or the resource became playable. The duration may
    /// still be unknown.
    MetadataReady,
    /// The playback position moved (regular progress or a completed seek).
    TimeAdvanced,
    /// Playback reached the end of the source.
    Ended,
    /// Loading or rendering failed.
    Error(String),
}

/// The single audio output controlled by the player.
pub trait MediaResource: Send + 'static {
    /// Assign a new source. Takes effect on the next [`load`](Self::load).
    fn set_source(&mut self, url: &str);

    /// The currently assigned source, if any.
    fn source(&self) -> Option<String>;

    /// Start (re)loading the assigned source from the beginning.
    fn load(&mut self) -> Result<()>;

    /// Request playback. An error means the request was rejected.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Move the playhead. Seeking past the end is allowed and lands on the end.
    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Current playhead in seconds.
    fn position(&self) -> f64;

    /// Total length as reported by the resource. May be `None`, `NaN` or
    /// infinite when the resource cannot tell yet.
    fn duration(&self) -> Option<f64>;

    fn set_volume(&mut self, volume: f64);
}
