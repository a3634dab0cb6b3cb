//! Audio decoding using symphonia.

use std::io::Cursor;

use bytes::Bytes;
use radiopad_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    units::{Time, TimeBase},
};
use tracing::{debug, trace, warn};

/// Decoder over a fully downloaded source.
///
/// Keeps the encoded bytes so it can rebuild itself when a format refuses to
/// seek backwards.
pub struct SourceDecoder {
    data: Bytes,
    extension: Option<String>,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    time_base: Option<TimeBase>,
    n_frames: Option<u64>,
    /// Length measured by a full scan, when the container did not declare one.
    scanned: Option<f64>,
    /// Playhead in source frames.
    cursor: u64,
}

impl SourceDecoder {
    /// Open a decoder. `locator` is the source URL or a mime type and is only
    /// used to hint the container format.
    pub fn open(data: Bytes, locator: Option<&str>) -> Result<Self> {
        let extension = locator.and_then(extension_hint);
        Self::open_with_extension(data, extension)
    }

    fn open_with_extension(data: Bytes, extension: Option<String>) -> Result<Self> {
        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(data.clone())),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        if let Some(ext) = &extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("Failed to probe format: {e}")))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode("No audio tracks found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::AudioDecode("Unknown sample rate".to_string()))?;
        let channels = track.codec_params.channels.map_or(2, |c| c.count());
        let time_base = track.codec_params.time_base;
        let n_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("Failed to create decoder: {e}")))?;

        debug!(
            "Opened source: track={}, {} Hz, {} channels, frames={:?}",
            track_id, sample_rate, channels, n_frames
        );

        Ok(Self {
            data,
            extension,
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            time_base,
            n_frames,
            scanned: None,
            cursor: 0,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Duration declared by the container, if it declares one.
    pub fn duration(&self) -> Option<f64> {
        if self.scanned.is_some() {
            return self.scanned;
        }
        let frames = self.n_frames?;
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(frames);
                Some(time.seconds as f64 + time.frac)
            }
            None => Some(frames as f64 / f64::from(self.sample_rate)),
        }
    }

    /// Current playhead in seconds.
    pub fn position(&self) -> f64 {
        self.cursor as f64 / f64::from(self.sample_rate)
    }

    /// Decode the next packet into interleaved `f32` samples.
    /// Returns `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => return Err(Error::AudioDecode(format!("Failed to read packet: {e}"))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = decoded.frames() as u64;
                    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    samples.copy_interleaved_ref(decoded);
                    self.cursor += frames;
                    return Ok(Some(samples.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error (skipping packet): {e}");
                }
                Err(e) => return Err(Error::AudioDecode(format!("Decode failed: {e}"))),
            }
        }
    }

    /// Decode to the end of the stream without producing output, and return
    /// the total length in seconds. Leaves the playhead at the end.
    pub fn scan_to_end(&mut self) -> Result<f64> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => return Err(Error::AudioDecode(format!("Failed to read packet: {e}"))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => self.cursor += decoded.frames() as u64,
                Err(SymphoniaError::DecodeError(e)) => trace!("Skipping corrupt packet: {e}"),
                Err(e) => return Err(Error::AudioDecode(format!("Decode failed: {e}"))),
            }
        }

        let duration = self.position();
        self.scanned = Some(duration);
        Ok(duration)
    }

    /// Move the playhead. Falls back to rebuilding the decoder and skipping
    /// forward when the container cannot seek. Returns the new position.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        let target = seconds.max(0.0);

        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time: Time::from(target),
                track_id: Some(self.track_id),
            },
        );

        match seeked {
            Ok(seeked) => {
                self.decoder.reset();
                self.cursor = self.ts_to_frames(seeked.actual_ts);
                Ok(self.position())
            }
            Err(e) => {
                debug!("Container seek failed ({e}), rewinding by re-decoding");
                self.rewind_and_skip(target)
            }
        }
    }

    fn rewind_and_skip(&mut self, target: f64) -> Result<f64> {
        let scanned = self.scanned;
        let mut fresh = Self::open_with_extension(self.data.clone(), self.extension.clone())?;
        fresh.scanned = scanned;
        *self = fresh;

        let target_frames = (target * f64::from(self.sample_rate)) as u64;
        while self.cursor < target_frames {
            if self.next_chunk()?.is_none() {
                // Ran off the end, so the length is now known exactly.
                if self.duration().is_none() {
                    self.scanned = Some(self.position());
                }
                break;
            }
        }
        Ok(self.position())
    }

    fn ts_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) => {
                let time = tb.calc_time(ts);
                ((time.seconds as f64 + time.frac) * f64::from(self.sample_rate)) as u64
            }
            None => ts,
        }
    }
}

/// Fully decode `data` and return its exact length in seconds.
///
/// Used when a resource cannot report a duration on its own.
pub fn decode_duration(data: Bytes, locator: Option<&str>) -> Result<f64> {
    let mut decoder = SourceDecoder::open(data, locator)?;
    let duration = decoder.scan_to_end()?;
    debug!("Decoded duration: {duration:.3}s");
    Ok(duration)
}

/// Derive a container extension from a URL path or a mime type.
pub fn extension_hint(locator: &str) -> Option<String> {
    let locator = locator.trim().to_ascii_lowercase();

    if locator.contains('/') && !locator.contains("://") && !locator.starts_with('/') {
        // Looks like a mime type such as `audio/mpeg`.
        let subtype = locator.rsplit('/').next()?;
        let ext = match subtype {
            "mpeg" | "mp3" => "mp3",
            "mp4" | "m4a" | "aac" | "x-m4a" => "m4a",
            "ogg" | "vorbis" | "opus" => "ogg",
            "wav" | "x-wav" | "wave" => "wav",
            "flac" | "x-flac" => "flac",
            "webm" => "webm",
            _ => return None,
        };
        return Some(ext.to_string());
    }

    let path = url::Url::parse(&locator)
        .map(|u| u.path().to_string())
        .unwrap_or(locator);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5).then(|| ext.to_string())
}
