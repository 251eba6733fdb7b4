//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐   rtrb commands   ┌─────────────────────┐
//! │  Control thread  │──────────────────►│  CPAL audio thread  │
//! │ (RenderContext)  │                   │   (owns MixEngine)  │
//! └──────────────────┘                   └──────────┬──────────┘
//!          ▲            DeckAtomics / capture ring  │
//!          └────────────────────────────────────────┘
//! ```
//!
//! Opening happens in two steps: [`open_output`] picks the device and stream
//! format, so the render context can be created at the device sample rate;
//! [`OutputDevice::start`] then moves the engine into the stream callback.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::find_output_device;
use super::error::{AudioError, AudioResult};
use crate::engine::{MixEngine, MAX_BUFFER_SIZE};
use crate::types::StereoBuffer;

/// A chosen device and stream format, not yet running
pub struct OutputDevice {
    device: cpal::Device,
    name: String,
    stream_config: StreamConfig,
    buffer_size: u32,
}

/// Keeps the output stream alive; drop to stop audio
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Select the output device and negotiate its stream format
pub fn open_output(config: &AudioConfig) -> AudioResult<OutputDevice> {
    let device = find_output_device(config.device.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", name);

    let supported = select_stream_config(&device, config.target_sample_rate())?;
    let buffer_size = config.buffer_frames();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        stream_config.sample_rate.0,
        buffer_size,
        config.latency_ms(stream_config.sample_rate.0)
    );

    Ok(OutputDevice {
        device,
        name,
        stream_config,
        buffer_size,
    })
}

impl OutputDevice {
    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build and start the stream; the engine moves into the callback
    pub fn start(self, mut engine: MixEngine) -> AudioResult<AudioHandle> {
        let channels = self.stream_config.channels as usize;
        let mut master = StereoBuffer::silence(MAX_BUFFER_SIZE);

        let stream = self
            .device
            .build_output_stream(
                &self.stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let n_frames = (data.len() / channels).min(MAX_BUFFER_SIZE);
                    master.set_len_from_capacity(n_frames);
                    engine.process(&mut master);

                    let samples = master.as_slice();
                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        match samples.get(i) {
                            Some(sample) => {
                                frame[0] = sample.left;
                                if channels > 1 {
                                    frame[1] = sample.right;
                                }
                                for ch in frame.iter_mut().skip(2) {
                                    *ch = 0.0;
                                }
                            }
                            None => frame.fill(0.0),
                        }
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
        log::info!("Audio stream started on {}", self.name);

        Ok(AudioHandle {
            _stream: stream,
            sample_rate: self.stream_config.sample_rate.0,
            buffer_size: self.buffer_size,
            device_name: self.name,
        })
    }
}

/// Prefer stereo f32 at the target rate, falling back to the closest match
fn select_stream_config(
    device: &cpal::Device,
    target_sample_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .find(|c| c.channels() >= 2 && in_range(c))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (sources will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}
