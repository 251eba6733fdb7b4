//! Master bus recording
//!
//! While recording, the engine copies the master bus into the render
//! context's capture ring; [`RecordingController::poll`] drains it into
//! chunks on every control tick. Stopping flushes the chunks into a single
//! 32-bit float stereo WAV held in memory.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::engine::{EngineCommand, RenderContext};

/// Artifact file name
pub const RECORDING_FILE_NAME: &str = "mix.wav";

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to encode recording: {0}")]
    Encode(#[from] hound::Error),

    #[error("Failed to write recording: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

/// One finished take
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    pub file_name: String,
    /// Complete WAV file contents
    pub bytes: Vec<u8>,
    pub frames: usize,
    pub sample_rate: u32,
}

impl RecordingArtifact {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// Write the artifact into `dir`, creating it if needed
    pub fn save_into(&self, dir: &Path) -> Result<PathBuf, RecordingError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        log::info!("Recorder: saved {:.1}s to {:?}", self.duration_secs(), path);
        Ok(path)
    }
}

/// Idle/Recording state machine around the capture tap
#[derive(Debug, Default)]
pub struct RecordingController {
    state: RecordingState,
    chunks: Vec<Vec<f32>>,
    frames: usize,
    sample_rate: u32,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Frames captured so far in the current take
    pub fn captured_frames(&self) -> usize {
        self.frames
    }

    /// Attach the capture tap and start a take
    ///
    /// Returns whether a new take started. Already recording, no render
    /// context, or a failed attach all leave the state unchanged.
    pub fn start(&mut self, ctx: Option<&mut RenderContext>) -> bool {
        if self.is_recording() {
            return false;
        }
        let Some(ctx) = ctx else {
            log::warn!("Recorder: no render context, staying idle");
            return false;
        };

        ctx.clear_capture();
        if ctx.send(EngineCommand::AttachCapture).is_err() {
            log::warn!("Recorder: could not attach capture tap, staying idle");
            return false;
        }

        self.chunks.clear();
        self.frames = 0;
        self.sample_rate = ctx.sample_rate();
        self.state = RecordingState::Recording;
        log::info!("Recorder: started at {} Hz", self.sample_rate);
        true
    }

    /// Move captured audio into the chunk list
    pub fn poll(&mut self, ctx: Option<&mut RenderContext>) -> usize {
        let (true, Some(ctx)) = (self.is_recording(), ctx) else {
            return 0;
        };
        let mut chunk = Vec::new();
        let frames = ctx.drain_capture(&mut chunk);
        if frames > 0 {
            self.chunks.push(chunk);
            self.frames += frames;
        }
        frames
    }

    /// Detach the tap and flush the take into a WAV artifact
    ///
    /// Stopping while idle yields `Ok(None)`. The chunk buffer is discarded
    /// either way.
    pub fn stop(
        &mut self,
        ctx: Option<&mut RenderContext>,
    ) -> Result<Option<RecordingArtifact>, RecordingError> {
        if !self.is_recording() {
            return Ok(None);
        }

        if let Some(ctx) = ctx {
            self.poll(Some(&mut *ctx));
            if ctx.send(EngineCommand::DetachCapture).is_err() {
                log::warn!("Recorder: capture detach deferred, engine queue full");
            }
        }

        self.state = RecordingState::Idle;
        let chunks = std::mem::take(&mut self.chunks);
        let frames = std::mem::take(&mut self.frames);
        let bytes = encode_wav(&chunks, self.sample_rate)?;

        log::info!("Recorder: stopped, {} frames in {} chunks", frames, chunks.len());
        Ok(Some(RecordingArtifact {
            file_name: RECORDING_FILE_NAME.to_string(),
            bytes,
            frames,
            sample_rate: self.sample_rate,
        }))
    }
}

/// Encode interleaved stereo chunks as a float WAV in memory
fn encode_wav(chunks: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, RecordingError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: sample_rate.max(1),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in chunks.iter().flatten() {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::COMMAND_QUEUE_CAPACITY;
    use crate::source::PcmBuffer;
    use crate::types::{DeckId, StereoBuffer, StereoSample};

    #[test]
    fn test_start_requires_context() {
        let mut recorder = RecordingController::new();
        assert!(!recorder.start(None));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let mut recorder = RecordingController::new();
        let (mut ctx, _engine) = RenderContext::new(1000);
        assert!(recorder.stop(Some(&mut ctx)).unwrap().is_none());
        assert_eq!(ctx.pending_commands(), 0);
    }

    #[test]
    fn test_start_while_recording_is_noop() {
        let mut recorder = RecordingController::new();
        let (mut ctx, _engine) = RenderContext::new(1000);
        assert!(recorder.start(Some(&mut ctx)));
        assert!(!recorder.start(Some(&mut ctx)));
        assert_eq!(ctx.pending_commands(), 1);
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_failed_attach_stays_idle() {
        let mut recorder = RecordingController::new();
        let (mut ctx, _engine) = RenderContext::new(1000);
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            ctx.send(EngineCommand::DetachCapture).unwrap();
        }
        assert!(!recorder.start(Some(&mut ctx)));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_take_produces_float_wav() {
        let mut recorder = RecordingController::new();
        let (mut ctx, mut engine) = RenderContext::new(1000);
        let source = PcmBuffer::new(
            StereoBuffer::from_vec(vec![StereoSample::new(0.5, -0.5); 1000]),
            1000,
        );
        let source = ctx.share(source);
        ctx.send(EngineCommand::LoadSource { deck: DeckId::A, source }).unwrap();
        ctx.send(EngineCommand::Play { deck: DeckId::A }).unwrap();
        ctx.send(EngineCommand::SetDeckGains { gains: [1.0, 0.0] }).unwrap();

        assert!(recorder.start(Some(&mut ctx)));
        let mut master = StereoBuffer::silence(100);
        engine.process(&mut master);
        assert_eq!(recorder.poll(Some(&mut ctx)), 100);
        engine.process(&mut master);

        let artifact = recorder.stop(Some(&mut ctx)).unwrap().unwrap();
        assert_eq!(artifact.file_name, "mix.wav");
        assert_eq!(artifact.frames, 200);
        assert!((artifact.duration_secs() - 0.2).abs() < 1e-9);
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(recorder.captured_frames(), 0);

        let reader = hound::WavReader::new(Cursor::new(artifact.bytes.clone())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 400);
        assert!((samples[0] - 0.5).abs() < 1e-6);
        assert!((samples[1] + 0.5).abs() < 1e-6);

        let dir = tempfile::tempdir().unwrap();
        let path = artifact.save_into(&dir.path().join("take")).unwrap();
        assert!(path.ends_with("mix.wav"));
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }
}
