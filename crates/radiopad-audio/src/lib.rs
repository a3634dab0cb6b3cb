//! # radiopad-audio
//!
//! Native media resource for the RadioPad player.
//!
//! Features:
//! - Symphonia decoding of fully downloaded sources
//! - Rubato resampling to the device rate
//! - Lock-free sample ring between the decode worker and the cpal callback
//! - Out-of-band full decode for sources that do not declare their length

pub mod decode;
pub mod native;
pub mod output;
pub mod resample;
pub mod ring;
pub mod transport;

pub use decode::{decode_duration, SourceDecoder};
pub use native::NativeResource;
