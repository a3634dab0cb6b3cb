//! # radiopad-player
//!
//! The shared FX player: one engine, one media resource, any number of
//! observers.
//!
//! - [`PlaybackEngine`] is the synchronous state machine.
//! - [`PlayerService`] runs it on a tokio task and hands out [`PlayerHandle`]s.
//! - [`DurationProbe`] recovers lengths the resource cannot report.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod probe;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::PlayerConfig;
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use engine::{Effect, PlaybackEngine};
pub use probe::{DurationDecoder, DurationProbe, DurationSource, SymphoniaDecoder};
pub use service::{PlayerHandle, PlayerService};
