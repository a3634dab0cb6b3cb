//! # radiopad-api
//!
//! Client for the RadioPad sound store (the `/sounds` REST resource).

pub mod client;
pub mod config;
pub mod types;

pub use client::SoundsClient;
pub use config::ApiConfig;
pub use types::SoundRecord;
