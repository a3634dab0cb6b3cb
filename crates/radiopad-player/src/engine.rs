//! The shared playback engine.
//!
//! [`PlaybackEngine`] is a synchronous reducer: controls and media events go
//! in, the [`PlayerSnapshot`] changes, and side effects that need I/O come out
//! as [`Effect`]s for the driver to run. It owns the only [`MediaResource`].
//!
//! Duration recovery runs two strategies side by side when the resource cannot
//! report a length after load:
//! - a seek-probe, which parks the resource far past any real end so it has to
//!   resolve the length, then restores the playhead;
//! - a decode probe, requested as [`Effect::ProbeDuration`] and answered through
//!   [`PlaybackEngine::on_probe_resolved`].
//!
//! Whichever lands first sets the duration. Late answers for a source that is
//! no longer current are dropped.

use std::sync::Arc;

use radiopad_core::{
    clamp_position, clamp_volume, usable_duration, MediaEvent, MediaResource, PlayCountUpdate,
    PlaybackPhase, PlayerSnapshot, Result, SoundId, SoundItem,
};
use tracing::{debug, trace};

use crate::config::PlayerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};

/// Work the engine wants done outside the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Record one more start of `id`.
    BumpPlayCount { id: SoundId, next_count: u64 },
    /// Recover the length of `url` by downloading and decoding it.
    ProbeDuration { url: String },
    /// Save a recovered length back to the store.
    PatchDuration { id: SoundId, seconds: f64 },
}

/// Single-voice playback engine.
pub struct PlaybackEngine<R> {
    resource: R,
    config: PlayerConfig,
    diagnostics: Arc<dyn DiagnosticSink>,
    state: PlayerSnapshot,
    /// Source assigned by the last switch.
    current_url: Option<String>,
    /// Seek requested while the duration was unknown.
    pending_seek: Option<f64>,
    /// Playhead to restore while a seek-probe is parked at the sentinel.
    seek_probe_restore: Option<f64>,
    /// Source a decode probe was already requested for.
    decode_probe_url: Option<String>,
    effects: Vec<Effect>,
}

impl<R: MediaResource> PlaybackEngine<R> {
    pub fn new(mut resource: R, config: PlayerConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        let volume = clamp_volume(config.initial_volume);
        resource.set_volume(volume);

        Self {
            resource,
            config,
            diagnostics,
            state: PlayerSnapshot {
                volume,
                ..PlayerSnapshot::default()
            },
            current_url: None,
            pending_seek: None,
            seek_probe_restore: None,
            decode_probe_url: None,
            effects: Vec::new(),
        }
    }

    /// The current observable state.
    pub const fn snapshot(&self) -> &PlayerSnapshot {
        &self.state
    }

    pub const fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub const fn resource(&self) -> &R {
        &self.resource
    }

    /// Whether a seek-probe is parked at the sentinel.
    pub const fn is_seek_probing(&self) -> bool {
        self.seek_probe_restore.is_some()
    }

    /// Seek waiting for a known duration.
    pub const fn pending_seek(&self) -> Option<f64> {
        self.pending_seek
    }

    /// Hand over the effects accumulated since the last call.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Start `item`, or resume it if it is already loaded.
    ///
    /// Sounds without a source and videos are ignored.
    pub fn play(&mut self, item: SoundItem) {
        let Some(url) = self.accept(&item) else {
            return;
        };

        let is_same = self.state.is_current(&item);
        let loaded = self.resource.source().as_deref() == Some(url.as_str());
        let hint = item.known_duration();

        let play_count = match &self.state.current_item {
            Some(current) if is_same => current.play_count.max(item.play_count),
            _ => item.play_count,
        };
        self.state.current_item = Some(SoundItem { play_count, ..item });

        if is_same && loaded {
            if let Some(hint) = hint {
                if usable_duration(self.state.duration_seconds).is_none() {
                    self.state.duration_seconds = hint;
                    self.clamp_position_to_duration();
                }
            }
        } else {
            self.switch_source(url);
        }

        self.start_playback();
    }

    /// Play/pause `item`. A different sound is started instead.
    pub fn toggle(&mut self, item: SoundItem) {
        if self.accept(&item).is_none() {
            return;
        }

        if !self.state.is_current(&item) {
            self.play(item);
            return;
        }

        if self.resource.is_paused() {
            self.start_playback();
        } else {
            self.resource.pause();
            self.state.is_playing = false;
            self.state.phase = PlaybackPhase::Paused;
            if !self.is_seek_probing() {
                let position = self.resource.position();
                self.observe_position(position);
            }
        }
    }

    /// Pause and rewind. The current sound stays selected.
    pub fn stop(&mut self) {
        self.resource.pause();
        if let Some(restore) = self.seek_probe_restore.as_mut() {
            // Let the probe finish, but come back to the start.
            *restore = 0.0;
        } else if let Err(e) = self.resource.seek(0.0) {
            self.report(Diagnostic::Seek {
                target: 0.0,
                reason: e.to_string(),
            });
        }
        self.state.position_seconds = 0.0;
        self.state.is_playing = false;
        self.state.phase = if self.state.current_item.is_some() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Idle
        };
    }

    /// Move the playhead, clamped to the known duration. While the duration is
    /// unknown the request is held and replayed once it becomes known.
    pub fn seek(&mut self, target: f64) {
        let safe = clamp_position(target, self.state.duration_seconds);

        if usable_duration(self.state.duration_seconds).is_none() {
            debug!("Duration unknown, holding seek to {safe:.2}s");
            self.pending_seek = Some(safe);
            return;
        }

        // A user seek supersedes the probe's restore point.
        self.seek_probe_restore = None;
        match self.resource.seek(safe) {
            Ok(()) => self.state.position_seconds = safe,
            Err(e) => self.report(Diagnostic::Seek {
                target: safe,
                reason: e.to_string(),
            }),
        }
    }

    /// Set the output level. Applies immediately, playing or not.
    pub fn set_volume(&mut self, volume: f64) {
        let safe = clamp_volume(volume);
        self.state.volume = safe;
        self.resource.set_volume(safe);
    }

    /// Feed a notification from the resource.
    pub fn handle_media_event(&mut self, event: MediaEvent) {
        trace!("Media event: {event:?}");
        match event {
            MediaEvent::MetadataReady => self.on_metadata(),
            MediaEvent::TimeAdvanced => {
                if self.is_seek_probing() {
                    self.finish_seek_probe();
                } else {
                    let position = self.resource.position();
                    self.observe_position(position);
                }
            }
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Error(reason) => {
                self.seek_probe_restore = None;
                self.state.is_playing = false;
                if self.state.current_item.is_some() {
                    self.state.phase = PlaybackPhase::Paused;
                }
                self.report(Diagnostic::Media { reason });
            }
        }
    }

    /// Sample the playhead. Called on the poll interval while playing.
    pub fn on_poll_tick(&mut self) {
        if self.state.is_playing && !self.is_seek_probing() {
            let position = self.resource.position();
            self.observe_position(position);
        }
    }

    /// Result of a decode probe requested through [`Effect::ProbeDuration`].
    pub fn on_probe_resolved(&mut self, url: &str, result: Result<f64>) {
        let seconds = match result {
            Ok(seconds) => seconds,
            Err(e) => {
                self.report(Diagnostic::DurationProbe {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };
        let Some(seconds) = usable_duration(seconds) else {
            return;
        };
        if self.current_url.as_deref() != Some(url) {
            debug!("Discarding duration for stale source {url}");
            return;
        }

        if usable_duration(self.state.duration_seconds).is_none() {
            self.state.duration_seconds = seconds;
            self.clamp_position_to_duration();
        }

        if let Some(restore) = self.seek_probe_restore.take() {
            self.restore_playhead(restore);
        }

        if let Some(current) = self.state.current_item.as_mut() {
            if current.playable_url() == Some(url) && current.known_duration().is_none() {
                current.known_duration_seconds = Some(seconds);
                self.effects.push(Effect::PatchDuration {
                    id: current.id.clone(),
                    seconds,
                });
            }
        }

        self.apply_pending_seek();
    }

    /// Result of an [`Effect::BumpPlayCount`].
    pub fn on_play_count_result(&mut self, id: &SoundId, result: Result<PlayCountUpdate>) {
        match result {
            Ok(update) => {
                if let Some(current) = self.state.current_item.as_mut() {
                    if current.id == update.id {
                        current.play_count = update.play_count;
                    }
                }
            }
            Err(e) => self.report(Diagnostic::PlayCount {
                sound: id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Result of an [`Effect::PatchDuration`].
    pub fn on_duration_patched(&mut self, id: &SoundId, result: Result<()>) {
        if let Err(e) = result {
            self.report(Diagnostic::DurationPatch {
                sound: id.clone(),
                reason: e.to_string(),
            });
        }
    }

    /// Playable, non-video sounds yield their source.
    fn accept(&self, item: &SoundItem) -> Option<String> {
        let Some(url) = item.playable_url() else {
            debug!("Ignoring sound {} without a source", item.id);
            return None;
        };
        if !item.is_audio() {
            debug!("Ignoring video sound {}", item.id);
            return None;
        }
        Some(url.to_string())
    }

    fn switch_source(&mut self, url: String) {
        debug!("Switching source to {url}");
        self.resource.pause();
        self.resource.set_source(&url);
        self.current_url = Some(url.clone());
        self.state.duration_seconds = 0.0;
        self.state.position_seconds = 0.0;
        self.state.phase = PlaybackPhase::Loading;
        self.pending_seek = None;
        self.seek_probe_restore = None;
        self.decode_probe_url = None;

        if let Err(e) = self.resource.load() {
            self.report(Diagnostic::Load {
                url,
                reason: e.to_string(),
            });
        }
    }

    fn start_playback(&mut self) {
        let Some(current) = self.state.current_item.as_ref() else {
            return;
        };
        let id = current.id.clone();
        let next_count = current.play_count.saturating_add(1);

        match self.resource.play() {
            Ok(()) => {
                self.state.is_playing = true;
                if self.state.phase != PlaybackPhase::Loading {
                    self.state.phase = PlaybackPhase::Playing;
                }
                self.effects.push(Effect::BumpPlayCount { id, next_count });
            }
            Err(e) => {
                self.state.is_playing = false;
                self.state.phase = PlaybackPhase::Paused;
                self.report(Diagnostic::PlaybackStart {
                    sound: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_metadata(&mut self) {
        if self.state.phase == PlaybackPhase::Loading {
            self.state.phase = if self.state.is_playing {
                PlaybackPhase::Playing
            } else {
                PlaybackPhase::Paused
            };
        }

        match self.resource.duration().and_then(usable_duration) {
            Some(duration) if !self.is_seek_probing() => {
                self.state.duration_seconds = duration;
                self.clamp_position_to_duration();
            }
            Some(_) => {}
            None => {
                self.start_seek_probe();
                self.request_decode_probe();
            }
        }

        self.finish_seek_probe();
        self.apply_pending_seek();
    }

    fn on_ended(&mut self) {
        if self.is_seek_probing() {
            // Parking at the sentinel can run the resource off its end.
            self.finish_seek_probe();
            if self.state.is_playing {
                if let Err(e) = self.resource.play() {
                    self.state.is_playing = false;
                    self.state.phase = PlaybackPhase::Paused;
                    self.report(Diagnostic::Media {
                        reason: e.to_string(),
                    });
                }
            }
            return;
        }

        self.state.is_playing = false;
        self.state.phase = PlaybackPhase::Paused;
        if let Err(e) = self.resource.seek(0.0) {
            self.report(Diagnostic::Seek {
                target: 0.0,
                reason: e.to_string(),
            });
            return;
        }
        self.state.position_seconds = 0.0;
    }

    fn start_seek_probe(&mut self) {
        if self.is_seek_probing() {
            return;
        }
        let restore = self.resource.position();
        let restore = if restore.is_finite() { restore.max(0.0) } else { 0.0 };
        let sentinel = self.config.seek_probe_sentinel;

        match self.resource.seek(sentinel) {
            Ok(()) => {
                debug!("Seek-probing duration, will restore to {restore:.2}s");
                self.seek_probe_restore = Some(restore);
            }
            Err(e) => self.report(Diagnostic::Seek {
                target: sentinel,
                reason: e.to_string(),
            }),
        }
    }

    /// Complete the seek-probe once the resource knows its length.
    fn finish_seek_probe(&mut self) {
        let Some(restore) = self.seek_probe_restore else {
            return;
        };
        let Some(duration) = self.resource.duration().and_then(usable_duration) else {
            return;
        };

        self.seek_probe_restore = None;
        self.state.duration_seconds = duration;
        debug!("Seek-probe resolved duration {duration:.2}s");
        self.restore_playhead(restore);
        self.apply_pending_seek();
    }

    fn restore_playhead(&mut self, restore: f64) {
        let target = clamp_position(restore, self.state.duration_seconds);
        match self.resource.seek(target) {
            Ok(()) => self.observe_position(target),
            Err(e) => self.report(Diagnostic::Seek {
                target,
                reason: e.to_string(),
            }),
        }
    }

    fn request_decode_probe(&mut self) {
        let Some(url) = self.current_url.clone() else {
            return;
        };
        if self.decode_probe_url.as_deref() == Some(url.as_str()) {
            return;
        }
        self.decode_probe_url = Some(url.clone());
        self.effects.push(Effect::ProbeDuration { url });
    }

    fn apply_pending_seek(&mut self) {
        let Some(pending) = self.pending_seek else {
            return;
        };
        if usable_duration(self.state.duration_seconds).is_none() {
            return;
        }

        let target = clamp_position(pending, self.state.duration_seconds);
        match self.resource.seek(target) {
            Ok(()) => {
                self.pending_seek = None;
                self.seek_probe_restore = None;
                self.state.position_seconds = target;
            }
            Err(e) => self.report(Diagnostic::Seek {
                target,
                reason: e.to_string(),
            }),
        }
    }

    fn observe_position(&mut self, position: f64) {
        let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
        self.state.position_seconds = clamp_position(position, self.state.duration_seconds);
    }

    fn clamp_position_to_duration(&mut self) {
        self.state.position_seconds =
            clamp_position(self.state.position_seconds, self.state.duration_seconds);
    }

    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }
}
