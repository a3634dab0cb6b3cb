//! The native media resource: one worker thread feeding one cpal stream.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use radiopad_core::{Error, MediaEvent, MediaResource, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::decode::SourceDecoder;
use crate::output::AudioOutput;
use crate::resample::{remix, StreamResampler};
use crate::ring::{SampleRing, SharedRing};
use crate::transport::Transport;

/// Ring size in samples (a bit over a second of 48kHz stereo).
const RING_SAMPLES: usize = 1 << 17;

/// How often progress is reported while rendering.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for a downloaded source.
const MAX_SOURCE_BYTES: u64 = 256 * 1024 * 1024;

enum WorkerCommand {
    Load { url: String, generation: u64 },
    Play,
    Seek { seconds: f64, generation: u64 },
    Shutdown,
}

/// [`MediaResource`] backed by the default output device.
pub struct NativeResource {
    source: Option<String>,
    transport: Arc<Transport>,
    commands: Sender<WorkerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl NativeResource {
    /// Open the default output device. Media events are delivered on `events`.
    pub fn new(events: UnboundedSender<MediaEvent>) -> Result<Self> {
        let transport = Arc::new(Transport::new(1.0));
        let (command_tx, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let worker_transport = Arc::clone(&transport);
        let worker = std::thread::Builder::new()
            .name("radiopad-audio".to_string())
            .spawn(move || {
                let ring: SharedRing = Arc::new(SampleRing::new(RING_SAMPLES));
                // cpal::Stream is not Send, so the output lives on this thread.
                match AudioOutput::open(Arc::clone(&ring), Arc::clone(&worker_transport)) {
                    Ok(output) => {
                        worker_transport.set_device_rate(output.sample_rate());
                        let _ = ready_tx.send(Ok(()));
                        Worker::new(
                            command_rx,
                            events,
                            worker_transport,
                            ring,
                            (output.sample_rate(), usize::from(output.channels())),
                        )
                        .run();
                    }
                    Err(e) => {
                        error!("Failed to initialize audio output: {e}");
                        worker_transport.mark_output_failed();
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        Ok(Self {
            source: None,
            transport,
            commands: command_tx,
            worker: Some(worker),
        })
    }

    fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| Error::AudioOutput(format!("Audio thread is gone: {e}")))
    }
}

impl MediaResource for NativeResource {
    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn load(&mut self) -> Result<()> {
        let url = self.source.clone().ok_or(Error::NoSource)?;
        let generation = self.transport.next_generation();
        self.transport.set_duration(None);
        self.transport.rebase(0.0);
        self.send(WorkerCommand::Load { url, generation })
    }

    fn play(&mut self) -> Result<()> {
        if self.transport.output_failed() {
            return Err(Error::PlaybackRejected("audio output unavailable".to_string()));
        }
        if self.source.is_none() {
            return Err(Error::NoSource);
        }
        self.transport.set_paused(false);
        self.send(WorkerCommand::Play)
    }

    fn pause(&mut self) {
        self.transport.set_paused(true);
    }

    fn is_paused(&self) -> bool {
        self.transport.is_paused()
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(Error::SeekRejected(format!("non-finite target {seconds}")));
        }
        let target = seconds.max(0.0);
        // Report the requested position right away; the worker re-anchors it
        // to where the decoder actually lands.
        self.transport.rebase(target);
        self.send(WorkerCommand::Seek {
            seconds: target,
            generation: self.transport.generation(),
        })
    }

    fn position(&self) -> f64 {
        self.transport.position()
    }

    fn duration(&self) -> Option<f64> {
        self.transport.duration()
    }

    fn set_volume(&mut self, volume: f64) {
        self.transport.set_volume(volume.clamp(0.0, 1.0) as f32);
    }
}

impl Drop for NativeResource {
    fn drop(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A decoded source bound to the generation that loaded it.
struct LoadedTrack {
    generation: u64,
    decoder: SourceDecoder,
    resampler: StreamResampler,
    /// Converted samples that did not fit into the ring yet.
    carry: Vec<f32>,
    /// The decoder hit end of stream.
    drained: bool,
    /// A seek overshot the end; hold still instead of ending.
    parked: bool,
    ended: bool,
}

struct Worker {
    commands: Receiver<WorkerCommand>,
    events: UnboundedSender<MediaEvent>,
    transport: Arc<Transport>,
    ring: SharedRing,
    output_rate: u32,
    output_channels: usize,
    track: Option<LoadedTrack>,
    /// Seek requested before the source finished loading, tagged with its generation.
    pending_seek: Option<(u64, f64)>,
}

impl Worker {
    fn new(
        commands: Receiver<WorkerCommand>,
        events: UnboundedSender<MediaEvent>,
        transport: Arc<Transport>,
        ring: SharedRing,
        (output_rate, output_channels): (u32, usize),
    ) -> Self {
        Self {
            commands,
            events,
            transport,
            ring,
            output_rate,
            output_channels,
            track: None,
            pending_seek: None,
        }
    }

    fn run(mut self) {
        info!("Audio worker started");
        let mut last_tick = Instant::now();

        loop {
            let rendering = self.is_rendering();
            let command = if rendering {
                match self.commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv_timeout(Duration::from_millis(50)) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            match command {
                Some(WorkerCommand::Shutdown) => break,
                Some(WorkerCommand::Load { url, generation }) => self.load(&url, generation),
                Some(WorkerCommand::Seek { seconds, generation }) => self.seek(seconds, generation),
                Some(WorkerCommand::Play) => {
                    if let Some(track) = self.track.as_mut() {
                        track.ended = false;
                    }
                }
                None => {}
            }

            if self.is_rendering() {
                self.fill();
                self.check_end();

                if last_tick.elapsed() >= TICK_INTERVAL {
                    self.emit(MediaEvent::TimeAdvanced);
                    last_tick = Instant::now();
                }
            }

            if self.ring.free() < 4096 {
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        debug!("Audio worker stopped");
    }

    fn is_rendering(&self) -> bool {
        !self.transport.is_paused() && self.track.as_ref().is_some_and(|t| !t.ended)
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    fn load(&mut self, url: &str, generation: u64) {
        debug!("Loading source: {url}");
        self.track = None;
        self.ring.clear();

        let data = match fetch_source(url) {
            Ok(data) => data,
            Err(e) => {
                if self.transport.is_current(generation) {
                    warn!("Failed to fetch {url}: {e}");
                    self.emit(MediaEvent::Error(e.to_string()));
                }
                return;
            }
        };

        if !self.transport.is_current(generation) {
            debug!("Dropping superseded load of {url}");
            return;
        }

        let opened = SourceDecoder::open(data, Some(url)).and_then(|decoder| {
            let resampler =
                StreamResampler::new(decoder.sample_rate(), self.output_rate, self.output_channels)?;
            Ok((decoder, resampler))
        });

        match opened {
            Ok((decoder, resampler)) => {
                self.transport.set_duration(decoder.duration());
                self.transport.rebase(0.0);
                self.track = Some(LoadedTrack {
                    generation,
                    decoder,
                    resampler,
                    carry: Vec::new(),
                    drained: false,
                    parked: false,
                    ended: false,
                });
                if let Some((pending_generation, seconds)) = self.pending_seek.take() {
                    if pending_generation == generation {
                        self.seek(seconds, generation);
                    }
                }
                self.emit(MediaEvent::MetadataReady);
            }
            Err(e) => {
                warn!("Failed to open {url}: {e}");
                self.emit(MediaEvent::Error(e.to_string()));
            }
        }
    }

    fn seek(&mut self, seconds: f64, generation: u64) {
        if !self.transport.is_current(generation) {
            return;
        }
        let Some(track) = self.track.as_mut().filter(|t| t.generation == generation) else {
            self.pending_seek = Some((generation, seconds));
            return;
        };

        self.ring.clear();
        track.carry.clear();
        track.resampler.reset();
        track.drained = false;
        track.ended = false;

        let had_duration = self.transport.duration().is_some();
        let landed = match track.decoder.seek(seconds) {
            Ok(landed) => landed,
            Err(e) => {
                warn!("Seek to {seconds:.2}s failed: {e}");
                self.transport.rebase(track.decoder.position());
                let _ = self.events.send(MediaEvent::Error(e.to_string()));
                return;
            }
        };

        let duration = track.decoder.duration();
        track.parked = duration.is_some_and(|d| seconds > d);
        self.transport.rebase(landed);

        if !had_duration && duration.is_some() {
            self.transport.set_duration(duration);
            let _ = self.events.send(MediaEvent::MetadataReady);
        }
        let _ = self.events.send(MediaEvent::TimeAdvanced);
    }

    fn fill(&mut self) {
        let Some(track) = self.track.as_mut() else {
            return;
        };
        if track.parked {
            return;
        }

        loop {
            if !track.carry.is_empty() {
                let written = self.ring.push_slice(&track.carry);
                track.carry.drain(..written);
                if !track.carry.is_empty() {
                    return;
                }
            }
            if track.drained || self.ring.free() < 2048 {
                return;
            }

            let converted = match track.decoder.next_chunk() {
                Ok(Some(samples)) => {
                    let remixed = remix(&samples, track.decoder.channels(), self.output_channels);
                    track.resampler.process(&remixed)
                }
                Ok(None) => {
                    track.drained = true;
                    track.resampler.flush()
                }
                Err(e) => {
                    error!("Decode error: {e}");
                    track.drained = true;
                    let _ = self.events.send(MediaEvent::Error(e.to_string()));
                    return;
                }
            };

            match converted {
                Ok(samples) => track.carry = samples,
                Err(e) => {
                    track.drained = true;
                    let _ = self.events.send(MediaEvent::Error(e.to_string()));
                    return;
                }
            }
        }
    }

    fn check_end(&mut self) {
        let Some(track) = self.track.as_mut() else {
            return;
        };
        if !track.drained || !track.carry.is_empty() || !self.ring.is_empty() {
            return;
        }

        track.ended = true;
        if self.transport.duration().is_none() {
            let measured = track.decoder.position();
            self.transport.set_duration(Some(measured));
            let _ = self.events.send(MediaEvent::MetadataReady);
        }
        self.transport.set_paused(true);
        info!("Playback finished");
        let _ = self.events.send(MediaEvent::Ended);
    }
}

/// Download a source over HTTP, or read it from disk for local paths.
fn fetch_source(url: &str) -> Result<Bytes> {
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Bytes::from(std::fs::read(path)?));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Ok(Bytes::from(std::fs::read(url)?));
    }

    let data = ureq::get(url)
        .call()
        .map_err(|e| Error::Network(format!("HTTP request failed: {e}")))?
        .into_body()
        .with_config()
        .limit(MAX_SOURCE_BYTES)
        .read_to_vec()
        .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

    debug!("Fetched {} bytes from {url}", data.len());
    Ok(Bytes::from(data))
}
