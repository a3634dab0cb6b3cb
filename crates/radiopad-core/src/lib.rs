//! # radiopad-core
//!
//! Core types, traits, and error handling for the RadioPad FX player.

pub mod error;
pub mod media;
pub mod services;
pub mod types;

pub use error::{Error, HttpError, Result};
pub use media::{MediaEvent, MediaResource};
pub use services::{DurationStore, PlayCountService, PlayCountUpdate, SourceFetcher};
pub use types::*;
