//! The player's event loop.
//!
//! A single tokio task owns the [`PlaybackEngine`]. Controls, media events and
//! side-effect completions are all funnelled into it, so engine state is only
//! ever touched from one place. Observers read [`PlayerSnapshot`]s from a
//! `watch` channel.

use std::sync::Arc;

use parking_lot::Mutex;
use radiopad_core::{
    DurationStore, Error, MediaEvent, MediaResource, PlayCountService, PlayCountUpdate,
    PlayerSnapshot, Result, SoundId, SoundItem,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::engine::{Effect, PlaybackEngine};
use crate::probe::DurationSource;

/// Controls sent to the event loop.
#[derive(Debug, Clone)]
enum Command {
    Play(SoundItem),
    Toggle(SoundItem),
    Stop,
    Seek(f64),
    SetVolume(f64),
    Shutdown,
}

/// Results of effects run off the loop.
#[derive(Debug)]
enum Completion {
    DurationProbed { url: String, result: Result<f64> },
    PlayCount { id: SoundId, result: Result<PlayCountUpdate> },
    DurationPatched { id: SoundId, result: Result<()> },
}

/// Drives a [`PlaybackEngine`] and the collaborators its effects talk to.
pub struct PlayerService<R, C, S, P> {
    engine: PlaybackEngine<R>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    play_counts: Arc<C>,
    durations: Arc<S>,
    probe: Arc<P>,
}

impl<R, C, S, P> PlayerService<R, C, S, P>
where
    R: MediaResource,
    C: PlayCountService,
    S: DurationStore,
    P: DurationSource,
{
    /// `media_events` must be the channel the engine's resource reports into.
    pub fn new(
        engine: PlaybackEngine<R>,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
        play_counts: Arc<C>,
        durations: Arc<S>,
        probe: Arc<P>,
    ) -> Self {
        Self {
            engine,
            media_events,
            play_counts,
            durations,
            probe,
        }
    }

    /// Start the event loop on the current tokio runtime.
    pub fn spawn(self) -> PlayerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(self.engine.snapshot().clone());

        let driver = tokio::spawn(self.run(command_rx, snapshot_tx));
        info!("Player started");

        PlayerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            driver: Arc::new(Mutex::new(Some(driver))),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        snapshots: watch::Sender<PlayerSnapshot>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut poll = tokio::time::interval(self.engine.config().poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut media_open = true;

        loop {
            let playing = self.engine.snapshot().is_playing;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                event = self.media_events.recv(), if media_open => match event {
                    Some(event) => self.engine.handle_media_event(event),
                    None => {
                        debug!("Media event channel closed");
                        media_open = false;
                    }
                },
                Some(completion) = done_rx.recv() => self.complete(completion),
                _ = poll.tick(), if playing => self.engine.on_poll_tick(),
            }

            self.dispatch(&done_tx);
            publish(&snapshots, self.engine.snapshot());
        }

        self.engine.stop();
        publish(&snapshots, self.engine.snapshot());
        info!("Player stopped");
    }

    fn apply(&mut self, command: Command) {
        trace!("Command: {command:?}");
        match command {
            Command::Play(item) => self.engine.play(item),
            Command::Toggle(item) => self.engine.toggle(item),
            Command::Stop => self.engine.stop(),
            Command::Seek(seconds) => self.engine.seek(seconds),
            Command::SetVolume(volume) => self.engine.set_volume(volume),
            Command::Shutdown => {}
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::DurationProbed { url, result } => {
                self.engine.on_probe_resolved(&url, result);
            }
            Completion::PlayCount { id, result } => {
                self.engine.on_play_count_result(&id, result);
            }
            Completion::DurationPatched { id, result } => {
                self.engine.on_duration_patched(&id, result);
            }
        }
    }

    /// Run pending effects as detached tasks. Their results come back through
    /// `done`.
    fn dispatch(&mut self, done: &mpsc::UnboundedSender<Completion>) {
        for effect in self.engine.take_effects() {
            let done = done.clone();
            match effect {
                Effect::BumpPlayCount { id, next_count } => {
                    let play_counts = Arc::clone(&self.play_counts);
                    tokio::spawn(async move {
                        let result = play_counts.increment_play_count(&id, next_count).await;
                        let _ = done.send(Completion::PlayCount { id, result });
                    });
                }
                Effect::ProbeDuration { url } => {
                    let probe = Arc::clone(&self.probe);
                    tokio::spawn(async move {
                        let result = probe.probe_duration(&url).await;
                        let _ = done.send(Completion::DurationProbed { url, result });
                    });
                }
                Effect::PatchDuration { id, seconds } => {
                    let durations = Arc::clone(&self.durations);
                    tokio::spawn(async move {
                        let result = durations.patch_duration(&id, seconds).await;
                        let _ = done.send(Completion::DurationPatched { id, result });
                    });
                }
            }
        }
    }
}

fn publish(snapshots: &watch::Sender<PlayerSnapshot>, snapshot: &PlayerSnapshot) {
    snapshots.send_if_modified(|current| {
        if *current == *snapshot {
            false
        } else {
            current.clone_from(snapshot);
            true
        }
    });
}

/// Cloneable handle to a running player.
///
/// Controls are fire-and-forget: they only fail once the player has shut down.
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PlayerSnapshot>,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlayerHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Closed)
    }

    pub fn play(&self, item: SoundItem) -> Result<()> {
        self.send(Command::Play(item))
    }

    pub fn toggle(&self, item: SoundItem) -> Result<()> {
        self.send(Command::Toggle(item))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(Command::Seek(seconds))
    }

    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.send(Command::SetVolume(volume))
    }

    /// The latest published state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the event loop and wait for it to finish. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            let _ = driver.await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::diagnostics::Diagnostic;
    use crate::testing::{FakeResource, RecordingSink};
    use radiopad_core::PlaybackPhase;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingStore {
        bumps: Mutex<Vec<(SoundId, u64)>>,
        patches: Mutex<Vec<(SoundId, f64)>>,
        offline: bool,
    }

    impl PlayCountService for RecordingStore {
        async fn increment_play_count(
            &self,
            id: &SoundId,
            next_count: u64,
        ) -> Result<PlayCountUpdate> {
            if self.offline {
                return Err(Error::Network("offline".into()));
            }
            self.bumps.lock().push((id.clone(), next_count));
            Ok(PlayCountUpdate {
                id: id.clone(),
                play_count: next_count,
            })
        }
    }

    impl DurationStore for RecordingStore {
        async fn patch_duration(&self, id: &SoundId, seconds: f64) -> Result<()> {
            self.patches.lock().push((id.clone(), seconds));
            Ok(())
        }
    }

    /// Answers probes from a table after a per-source delay.
    #[derive(Default)]
    struct StubProbe(HashMap<String, (Duration, f64)>);

    impl StubProbe {
        fn with(mut self, url: &str, delay: Duration, seconds: f64) -> Self {
            self.0.insert(url.to_string(), (delay, seconds));
            self
        }
    }

    impl DurationSource for StubProbe {
        async fn probe_duration(&self, url: &str) -> Result<f64> {
            let Some(&(delay, seconds)) = self.0.get(url) else {
                return Err(Error::AudioDecode(format!("no stub for {url}")));
            };
            tokio::time::sleep(delay).await;
            Ok(seconds)
        }
    }

    struct Harness {
        handle: PlayerHandle,
        fake: FakeResource,
        media: mpsc::UnboundedSender<MediaEvent>,
        store: Arc<RecordingStore>,
        sink: Arc<RecordingSink>,
    }

    fn start(store: RecordingStore, probe: StubProbe) -> Harness {
        let fake = FakeResource::new();
        let sink = RecordingSink::shared();
        let store = Arc::new(store);
        let (media, media_rx) = mpsc::unbounded_channel();
        let engine = PlaybackEngine::new(fake.clone(), PlayerConfig::default(), sink.clone());
        let handle = PlayerService::new(
            engine,
            media_rx,
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::new(probe),
        )
        .spawn();

        Harness {
            handle,
            fake,
            media,
            store,
            sink,
        }
    }

    fn sound(id: &str) -> SoundItem {
        SoundItem::new(id, format!("Sound {id}")).with_source(format!("https://cdn.test/{id}.mp3"))
    }

    async fn wait_for(
        handle: &PlayerHandle,
        predicate: impl Fn(&PlayerSnapshot) -> bool,
    ) -> PlayerSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for player state")
            .expect("player gone");
        PlayerSnapshot::clone(&snapshot)
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_publishes_and_counts() {
        let h = start(RecordingStore::default(), StubProbe::default());

        h.handle.play(sound("a").with_play_count(2)).unwrap();

        let snapshot = wait_for(&h.handle, |s| {
            s.current_item.as_ref().is_some_and(|item| item.play_count == 3)
        })
        .await;
        assert!(snapshot.is_playing);
        assert_eq!(*h.store.bumps.lock(), vec![(SoundId::from("a"), 3)]);
        assert_eq!(h.fake.loads(), 1);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_result_is_applied_and_saved() {
        let probe = StubProbe::default().with("https://cdn.test/a.mp3", Duration::ZERO, 64.0);
        let h = start(RecordingStore::default(), probe);

        h.handle.play(sound("a")).unwrap();
        wait_for(&h.handle, |s| s.phase == PlaybackPhase::Loading).await;
        h.media.send(MediaEvent::MetadataReady).unwrap();

        let snapshot = wait_for(&h.handle, |s| s.duration_seconds == 64.0).await;
        assert_eq!(snapshot.position_seconds, 0.0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*h.store.patches.lock(), vec![(SoundId::from("a"), 64.0)]);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_probe_for_previous_sound_is_ignored() {
        let probe = StubProbe::default()
            .with("https://cdn.test/a.mp3", Duration::from_secs(2), 99.0)
            .with("https://cdn.test/b.mp3", Duration::ZERO, 12.0);
        let h = start(RecordingStore::default(), probe);

        h.handle.play(sound("a")).unwrap();
        wait_for(&h.handle, |s| s.phase == PlaybackPhase::Loading).await;
        h.media.send(MediaEvent::MetadataReady).unwrap();
        wait_for(&h.handle, |s| s.phase == PlaybackPhase::Playing).await;

        h.handle.play(sound("b")).unwrap();
        wait_for(&h.handle, |s| s.phase == PlaybackPhase::Loading).await;
        h.media.send(MediaEvent::MetadataReady).unwrap();
        wait_for(&h.handle, |s| s.duration_seconds == 12.0).await;

        tokio::time::sleep(Duration::from_secs(3)).await;

        let snapshot = h.handle.snapshot();
        assert_eq!(snapshot.duration_seconds, 12.0);
        assert_eq!(snapshot.current_item.map(|s| s.id), Some(SoundId::from("b")));
        assert_eq!(*h.store.patches.lock(), vec![(SoundId::from("b"), 12.0)]);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_polled_while_playing() {
        let h = start(RecordingStore::default(), StubProbe::default());

        h.handle.play(sound("a")).unwrap();
        wait_for(&h.handle, |s| s.is_playing).await;
        h.fake.set_duration(Some(60.0));
        h.media.send(MediaEvent::MetadataReady).unwrap();
        wait_for(&h.handle, |s| s.duration_seconds == 60.0).await;

        h.fake.advance_to(5.0);
        let snapshot = wait_for(&h.handle, |s| s.position_seconds == 5.0).await;
        assert!(snapshot.is_playing);

        h.handle.toggle(sound("a")).unwrap();
        wait_for(&h.handle, |s| !s.is_playing).await;
        h.fake.advance_to(9.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.handle.snapshot().position_seconds, 5.0);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_count_failure_keeps_playing() {
        let store = RecordingStore {
            offline: true,
            ..RecordingStore::default()
        };
        let h = start(store, StubProbe::default());

        h.handle.play(sound("a")).unwrap();
        wait_for(&h.handle, |s| s.is_playing).await;

        let mut reported = Vec::new();
        for _ in 0..50 {
            reported.extend(h.sink.take());
            if !reported.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(reported.as_slice(), [Diagnostic::PlayCount { .. }]));
        assert!(h.handle.snapshot().is_playing);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_controls_fail_after_shutdown() {
        let h = start(RecordingStore::default(), StubProbe::default());
        h.handle.set_volume(0.4).unwrap();
        wait_for(&h.handle, |s| s.volume == 0.4).await;

        h.handle.shutdown().await;
        h.handle.shutdown().await;

        assert!(matches!(h.handle.stop(), Err(Error::Closed)));
        assert!(matches!(h.handle.seek(3.0), Err(Error::Closed)));
    }
}
