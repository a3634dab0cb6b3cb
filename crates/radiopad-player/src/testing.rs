//! Test doubles for the player.

use std::sync::Arc;

use parking_lot::Mutex;
use radiopad_core::{Error, MediaResource, Result};

use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// State behind a [`FakeResource`].
#[derive(Debug)]
pub struct FakeMedia {
    pub source: Option<String>,
    pub paused: bool,
    pub position: f64,
    /// What the resource reports as its length.
    pub duration: Option<f64>,
    /// Length revealed by the first seek after a load, like a stream that only
    /// learns its end when asked to go there.
    pub hidden_duration: Option<f64>,
    pub volume: f64,
    pub loads: usize,
    pub plays: usize,
    pub reject_play: Option<String>,
    pub reject_seek: bool,
    pub seeks: Vec<f64>,
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self {
            source: None,
            paused: true,
            position: 0.0,
            duration: None,
            hidden_duration: None,
            volume: 1.0,
            loads: 0,
            plays: 0,
            reject_play: None,
            reject_seek: false,
            seeks: Vec::new(),
        }
    }
}

/// Scriptable [`MediaResource`]. Clones share state so tests can inspect the
/// resource after handing it to the engine.
#[derive(Debug, Clone, Default)]
pub struct FakeResource(Arc<Mutex<FakeMedia>>);

impl FakeResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut FakeMedia) -> T) -> T {
        f(&mut self.0.lock())
    }

    /// Pretend playback advanced to `seconds`.
    pub fn advance_to(&self, seconds: f64) {
        self.0.lock().position = seconds;
    }

    pub fn set_duration(&self, seconds: Option<f64>) {
        self.0.lock().duration = seconds;
    }

    pub fn loads(&self) -> usize {
        self.0.lock().loads
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.0.lock().seeks.clone()
    }
}

impl MediaResource for FakeResource {
    fn set_source(&mut self, url: &str) {
        self.0.lock().source = Some(url.to_string());
    }

    fn source(&self) -> Option<String> {
        self.0.lock().source.clone()
    }

    fn load(&mut self) -> Result<()> {
        let mut media = self.0.lock();
        if media.source.is_none() {
            return Err(Error::NoSource);
        }
        media.loads += 1;
        media.position = 0.0;
        media.duration = None;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut media = self.0.lock();
        if let Some(reason) = media.reject_play.clone() {
            return Err(Error::PlaybackRejected(reason));
        }
        media.paused = false;
        media.plays += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.0.lock().paused
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let mut media = self.0.lock();
        if media.reject_seek {
            return Err(Error::SeekRejected("not seekable".into()));
        }
        media.seeks.push(seconds);
        if media.duration.is_none() {
            media.duration = media.hidden_duration;
        }
        media.position = match media.duration {
            Some(duration) if duration.is_finite() => seconds.min(duration),
            _ => seconds,
        };
        Ok(())
    }

    fn position(&self) -> f64 {
        self.0.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.0.lock().duration
    }

    fn set_volume(&mut self, volume: f64) {
        self.0.lock().volume = volume;
    }
}

/// Collects every diagnostic it receives.
#[derive(Debug, Default)]
pub struct RecordingSink(Mutex<Vec<Diagnostic>>);

impl RecordingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.0.lock())
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.0.lock().push(diagnostic);
    }
}
