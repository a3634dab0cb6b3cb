//! Single reporting point for failures the player deliberately swallows.
//!
//! Nothing in here changes behavior: playback stays fail-open. It only makes
//! the swallowed failures observable.

use std::fmt;

use radiopad_core::SoundId;
use tracing::warn;

/// A failure the player recovered from without telling the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The resource refused to start playback.
    PlaybackStart { sound: SoundId, reason: String },
    /// The resource reported a load or render error.
    Media { reason: String },
    /// The resource refused to (re)load a source.
    Load { url: String, reason: String },
    /// A playhead move was refused.
    Seek { target: f64, reason: String },
    /// Out-of-band duration recovery failed.
    DurationProbe { url: String, reason: String },
    /// The play-count bump failed.
    PlayCount { sound: SoundId, reason: String },
    /// Writing a discovered duration back to the store failed.
    DurationPatch { sound: SoundId, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaybackStart { sound, reason } => {
                write!(f, "playback of {sound} did not start: {reason}")
            }
            Self::Media { reason } => write!(f, "media error: {reason}"),
            Self::Load { url, reason } => write!(f, "loading {url} failed: {reason}"),
            Self::Seek { target, reason } => write!(f, "seek to {target:.2}s refused: {reason}"),
            Self::DurationProbe { url, reason } => {
                write!(f, "duration probe for {url} failed: {reason}")
            }
            Self::PlayCount { sound, reason } => {
                write!(f, "play count for {sound} not recorded: {reason}")
            }
            Self::DurationPatch { sound, reason } => {
                write!(f, "duration for {sound} not saved: {reason}")
            }
        }
    }
}

/// Receives every [`Diagnostic`].
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Logs diagnostics through `tracing` under the `radiopad::diagnostics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        warn!(target: "radiopad::diagnostics", "{diagnostic}");
    }
}
