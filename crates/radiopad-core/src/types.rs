//! Core domain types for RadioPad.

pub mod common;
pub mod snapshot;
pub mod sound;

pub use common::*;
pub use snapshot::{PlaybackPhase, PlayerSnapshot};
pub use sound::{SoundId, SoundItem};
