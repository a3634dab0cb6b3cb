//! Sample-rate and channel-layout conversion to match the output device.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use radiopad_core::{Error, Result};
use rubato::{FftFixedIn, Resampler};
use tracing::debug;

/// Requested input frames per rubato call (rubato may round it up).
const CHUNK_FRAMES: usize = 1024;

/// Streaming resampler over interleaved samples.
///
/// A pass-through when the source already runs at the device rate.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    channels: usize,
    input_rate: u32,
    output_rate: u32,
    /// Deinterleaved input waiting for a full chunk.
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        let channels = channels.max(1);
        let inner = if input_rate == output_rate {
            None
        } else {
            let resampler = FftFixedIn::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_FRAMES,
                2,
                channels,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {e}")))?;
            debug!("Resampling {input_rate}Hz -> {output_rate}Hz, {channels} channels");
            Some(resampler)
        };

        Ok(Self {
            inner,
            channels,
            input_rate,
            output_rate,
            pending: vec![Vec::new(); channels],
        })
    }

    pub const fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Feed interleaved samples, returning whatever full chunks produced.
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(interleaved.to_vec());
        };

        for frame in interleaved.chunks_exact(self.channels) {
            for (channel, sample) in self.pending.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| Error::AudioOutput(format!("Resample failed: {e}")))?;
            interleave_into(&resampled, usize::MAX, &mut out);
        }
        Ok(out)
    }

    /// Drain the partial chunk left at end of stream.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Ok(Vec::new());
        }

        let chunk: Vec<Vec<f32>> = self.pending.iter_mut().map(std::mem::take).collect();
        let resampled = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| Error::AudioOutput(format!("Resample failed: {e}")))?;

        let frames =
            (remaining as f64 * f64::from(self.output_rate) / f64::from(self.input_rate)) as usize;
        let mut out = Vec::new();
        interleave_into(&resampled, frames, &mut out);
        Ok(out)
    }

    /// Forget buffered input, e.g. after a seek.
    pub fn reset(&mut self) {
        if let Some(resampler) = self.inner.as_mut() {
            resampler.reset();
        }
        self.pending.iter_mut().for_each(Vec::clear);
    }
}

fn interleave_into(planes: &[Vec<f32>], max_frames: usize, out: &mut Vec<f32>) {
    let Some(first) = planes.first() else {
        return;
    };
    let frames = first.len().min(max_frames);
    out.reserve(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            out.push(plane[frame]);
        }
    }
}

/// Convert interleaved samples between channel counts.
///
/// Mono is duplicated, stereo is averaged down to mono, and anything else
/// keeps the leading channels (padding with silence).
pub fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        match (from, to) {
            (1, _) => out.extend(std::iter::repeat(frame[0]).take(to)),
            (_, 1) => out.push(frame.iter().sum::<f32>() / from as f32),
            _ => {
                let kept = from.min(to);
                out.extend_from_slice(&frame[..kept]);
                out.extend(std::iter::repeat(0.0).take(to - kept));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut resampler = StreamResampler::new(48000, 48000, 2).unwrap();
        assert!(resampler.is_passthrough());
        let input = vec![0.5f32; 2048];
        assert_eq!(resampler.process(&input).unwrap(), input);
        assert!(resampler.flush().unwrap().is_empty());
    }

    #[test]
    fn test_resampling_changes_length() {
        let mut resampler = StreamResampler::new(44100, 48000, 1).unwrap();
        assert!(!resampler.is_passthrough());

        let mut produced = resampler.process(&vec![0.0f32; 44100]).unwrap().len();
        produced += resampler.flush().unwrap().len();
        // One second in, roughly one second out (minus resampler latency).
        assert!(produced > 40_000 && produced < 52_000, "produced {produced}");
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_remix() {
        assert_eq!(remix(&[0.2, 0.4], 1, 2), vec![0.2, 0.2, 0.4, 0.4]);
        let mono = remix(&[0.2, 0.4], 2, 1);
        assert_eq!(mono.len(), 1);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert_eq!(remix(&[1.0, 2.0, 3.0], 3, 2), vec![1.0, 2.0]);
        assert_eq!(remix(&[1.0, 2.0], 2, 4), vec![1.0, 2.0, 0.0, 0.0]);
    }
}
