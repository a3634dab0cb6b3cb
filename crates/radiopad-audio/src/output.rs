//! Audio output using cpal.

use std::sync::Arc;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use radiopad_core::{Error, Result};
use tracing::{debug, error, info};

use crate::ring::SharedRing;
use crate::transport::Transport;

/// Samples pulled from the ring per inner copy in the callback.
const SCRATCH_SAMPLES: usize = 512;

/// Live output stream. Must stay on the thread that created it.
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl AudioOutput {
    /// Open the default output device and start rendering from `ring`.
    pub fn open(ring: SharedRing, transport: Arc<Transport>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))?;
        Self::with_device(&device, ring, transport)
    }

    fn with_device(device: &Device, ring: SharedRing, transport: Arc<Transport>) -> Result<Self> {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;
        debug!("Supported output config: {:?}", supported);

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, &config, ring, transport)?,
            SampleFormat::I16 => build_stream::<i16>(device, &config, ring, transport)?,
            SampleFormat::U16 => build_stream::<u16>(device, &config, ring, transport)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {other:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

        info!(
            "Audio output on {device_name}: {} Hz, {} channels",
            config.sample_rate.0, config.channels
        );

        Ok(Self {
            _stream: stream,
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            device_name,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    ring: SharedRing,
    transport: Arc<Transport>,
) -> Result<Stream> {
    let channels = usize::from(config.channels).max(1);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if transport.is_paused() {
                    data.fill(T::from_sample(0.0f32));
                    return;
                }

                let volume = transport.volume();
                let mut scratch = [0.0f32; SCRATCH_SAMPLES];
                let mut rendered = 0;

                for out in data.chunks_mut(SCRATCH_SAMPLES) {
                    let read = ring.pop_into(&mut scratch[..out.len()]);
                    for (i, sample) in out.iter_mut().enumerate() {
                        let value = if i < read { scratch[i] * volume } else { 0.0 };
                        *sample = T::from_sample(value);
                    }
                    rendered += read;
                }

                transport.add_frames((rendered / channels) as u64);
            },
            |err| error!("Audio stream error: {err}"),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}
