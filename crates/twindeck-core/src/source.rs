//! Decoded PCM sources
//!
//! A [`PcmBuffer`] is what a deck plays and what beat detection reads. Files
//! are decoded with `hound`; anything not WAV is out of scope for the core.

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use rubato::{
    ResampleError, Resampler, ResamplerConstructionError, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

use crate::types::{StereoSample, StereoBuffer};

/// Errors from loading a source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to decode WAV: {0}")]
    Decode(#[from] hound::Error),

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    #[error("Source contains no audio")]
    Empty,

    #[error("Cannot build resampler: {0}")]
    ResamplerSetup(#[from] ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),
}

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Decoded stereo audio plus its sample rate
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    samples: StereoBuffer,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: StereoBuffer, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Build from interleaved stereo samples
    pub fn from_interleaved(interleaved: &[f32], sample_rate: u32) -> Self {
        Self::new(StereoBuffer::from_interleaved(interleaved), sample_rate)
    }

    pub fn samples(&self) -> &StereoBuffer {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in stereo frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Mono mixdown, used by analysis
    pub fn mono(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.to_mono()).collect()
    }

    /// Convert to another sample rate with band-limited sinc interpolation
    ///
    /// Returns `self` unchanged when the rates already match. The result is
    /// time-aligned with the input (resampler delay removed) and holds
    /// `len * target / source` frames, rounded.
    pub fn resampled(self, target_rate: u32) -> Result<Self, SourceError> {
        let target_rate = target_rate.max(1);
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(self);
        }

        let ratio = target_rate as f64 / self.sample_rate as f64;
        let mut resampler =
            SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), RESAMPLE_CHUNK, 2)?;
        let delay = resampler.output_delay();

        let (left, right): (Vec<f32>, Vec<f32>) =
            self.samples.iter().map(|s| (s.left, s.right)).unzip();
        let expected = (left.len() as f64 * ratio).round() as usize;
        let mut out = [
            Vec::with_capacity(expected + delay),
            Vec::with_capacity(expected + delay),
        ];

        let mut pos = 0;
        while pos + RESAMPLE_CHUNK <= left.len() {
            let end = pos + RESAMPLE_CHUNK;
            let chunk: [&[f32]; 2] = [&left[pos..end], &right[pos..end]];
            append_channels(&mut out, resampler.process(&chunk[..], None)?);
            pos = end;
        }
        if pos < left.len() {
            let tail: [&[f32]; 2] = [&left[pos..], &right[pos..]];
            append_channels(&mut out, resampler.process_partial(Some(&tail[..]), None)?);
        }
        // Flush the filter so the last input frames come out
        while out[0].len() < delay + expected {
            let flushed = resampler.process_partial(None::<&[&[f32]]>, None)?;
            if flushed.first().map_or(true, |ch| ch.is_empty()) {
                break;
            }
            append_channels(&mut out, flushed);
        }

        let [out_left, out_right] = out;
        let samples: Vec<StereoSample> = out_left
            .iter()
            .zip(out_right.iter())
            .skip(delay)
            .take(expected)
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();

        log::debug!(
            "Resampled source {} Hz -> {} Hz ({} -> {} frames)",
            self.sample_rate,
            target_rate,
            left.len(),
            samples.len()
        );
        Ok(Self::new(StereoBuffer::from_vec(samples), target_rate))
    }
}

fn append_channels(out: &mut [Vec<f32>; 2], wave: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(wave) {
        dst.extend_from_slice(&src);
    }
}

/// Decode a WAV file into a stereo [`PcmBuffer`]
///
/// Mono is duplicated to both channels; extra channels beyond two are
/// dropped. Integer formats are scaled to [-1, 1].
pub fn load_wav(path: &Path) -> Result<PcmBuffer, SourceError> {
    let reader = WavReader::open(path)?;
    let buffer = decode_wav(reader)?;
    log::info!(
        "Loaded {:?}: {:.1}s at {} Hz",
        path,
        buffer.duration_secs(),
        buffer.sample_rate()
    );
    Ok(buffer)
}

/// Decode WAV data from any reader
pub fn decode_wav<R: Read>(reader: WavReader<R>) -> Result<PcmBuffer, SourceError> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(SourceError::UnsupportedChannels(spec.channels));
    }

    let raw: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let frames: Vec<StereoSample> = raw
        .chunks_exact(channels)
        .map(|frame| match frame {
            [mono] => StereoSample::mono(*mono),
            [left, right, ..] => StereoSample::new(*left, *right),
            [] => StereoSample::silence(),
        })
        .collect();

    if frames.is_empty() {
        return Err(SourceError::Empty);
    }

    Ok(PcmBuffer::new(StereoBuffer::from_vec(frames), spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_mono_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &[16384, -16384, 0, 32767]);

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.sample_rate(), 8000);
        assert!((buffer.samples()[0].left - 0.5).abs() < 1e-4);
        assert_eq!(buffer.samples()[1].left, buffer.samples()[1].right);
        assert!((buffer.duration_secs() - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_load_stereo_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.25f32, -0.25, 0.5, -0.5] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.samples()[1].right, -0.5);
    }

    #[test]
    fn test_empty_wav_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &[]);
        assert!(matches!(load_wav(&path), Err(SourceError::Empty)));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let result = load_wav(Path::new("/nonexistent/track.wav"));
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, frames: usize) -> PcmBuffer {
        let step = 2.0 * std::f32::consts::PI * freq / sample_rate as f32;
        let samples = (0..frames)
            .map(|n| StereoSample::mono((n as f32 * step).sin() * amplitude))
            .collect();
        PcmBuffer::new(StereoBuffer::from_vec(samples), sample_rate)
    }

    fn rms(samples: &[StereoSample]) -> f32 {
        let sum: f32 = samples.iter().map(|s| s.left * s.left).sum();
        (sum / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_resample_halves_length() {
        let buffer = PcmBuffer::from_interleaved(&[0.0; 200], 48000);
        let resampled = buffer.resampled(24000).unwrap();
        assert_eq!(resampled.len(), 50);
        assert_eq!(resampled.sample_rate(), 24000);
        assert!((resampled.duration_secs() - 100.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_rate_is_untouched() {
        let buffer = sine(440.0, 0.5, 48000, 300);
        let resampled = buffer.clone().resampled(48000).unwrap();
        assert_eq!(resampled.samples().as_slice(), buffer.samples().as_slice());
    }

    #[test]
    fn test_downsample_removes_content_above_nyquist() {
        // 30 kHz cannot exist at 48 kHz; it must not fold down to 18 kHz
        let buffer = sine(30_000.0, 0.9, 96000, 96000);
        let resampled = buffer.resampled(48000).unwrap();
        assert_eq!(resampled.len(), 48000);
        let body = &resampled.samples().as_slice()[2000..46000];
        assert!(rms(body) < 0.01, "aliased rms {}", rms(body));
    }

    #[test]
    fn test_upsample_keeps_passband_level() {
        let buffer = sine(1000.0, 0.5, 44100, 44100);
        let resampled = buffer.resampled(48000).unwrap();
        assert_eq!(resampled.len(), 48000);
        let body = &resampled.samples().as_slice()[2000..46000];
        assert!((rms(body) - 0.5 / 2f32.sqrt()).abs() < 0.01);
    }
}
