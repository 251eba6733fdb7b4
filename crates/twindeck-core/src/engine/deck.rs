//! Source playback for one deck on the audio thread

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::MAX_BUFFER_SIZE;
use crate::source::PcmBuffer;
use crate::tempo::MAX_RATE;
use crate::timestretch::TimeStretcher;
use crate::types::{StereoBuffer, StereoSample};

/// Transport state published by the audio thread
///
/// Written only by the engine, read lock-free by the control thread.
#[derive(Debug, Default)]
pub struct DeckAtomics {
    /// Playhead in source frames
    pub position: AtomicU64,
    pub playing: AtomicBool,
    pub loaded: AtomicBool,
    /// Source sample rate in Hz (0 when nothing is loaded)
    pub source_rate: AtomicU32,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Playhead in seconds
    pub fn position_secs(&self) -> f64 {
        match self.source_rate.load(Ordering::Relaxed) {
            0 => 0.0,
            rate => self.position() as f64 / rate as f64,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }
}

/// Plays a shared source through the time stretcher
pub struct DeckPlayer {
    source: Option<Shared<PcmBuffer>>,
    playhead: usize,
    playing: bool,
    stretcher: TimeStretcher,
    stretch_input: StereoBuffer,
    stretch_capacity: usize,
    atomics: Arc<DeckAtomics>,
}

impl DeckPlayer {
    pub fn new(sample_rate: u32, atomics: Arc<DeckAtomics>) -> Self {
        let stretch_capacity = (MAX_BUFFER_SIZE as f32 * MAX_RATE).ceil() as usize + 1;
        Self {
            source: None,
            playhead: 0,
            playing: false,
            stretcher: TimeStretcher::new(sample_rate),
            stretch_input: StereoBuffer::silence(stretch_capacity),
            stretch_capacity,
            atomics,
        }
    }

    pub fn load(&mut self, source: Shared<PcmBuffer>) {
        self.atomics
            .source_rate
            .store(source.sample_rate(), Ordering::Relaxed);
        // Previous source, if any, is handed to the collector on drop
        self.source = Some(source);
        self.playhead = 0;
        self.playing = false;
        self.stretcher.reset();
        self.publish();
    }

    pub fn unload(&mut self) {
        self.source = None;
        self.playhead = 0;
        self.playing = false;
        self.atomics.source_rate.store(0, Ordering::Relaxed);
        self.publish();
    }

    pub fn play(&mut self) {
        if self.source.is_some() {
            self.playing = true;
            self.publish();
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.publish();
    }

    pub fn seek(&mut self, seconds: f64) {
        if let Some(source) = &self.source {
            let frame = (seconds.max(0.0) * source.sample_rate() as f64).round() as usize;
            self.playhead = frame.min(source.len());
            self.stretcher.reset();
            self.publish();
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.stretcher.set_rate(rate);
    }

    pub fn rate(&self) -> f32 {
        self.stretcher.rate()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn publish(&self) {
        self.atomics
            .position
            .store(self.playhead as u64, Ordering::Relaxed);
        self.atomics.playing.store(self.playing, Ordering::Relaxed);
        self.atomics
            .loaded
            .store(self.source.is_some(), Ordering::Relaxed);
    }

    /// Copy source frames from `start` into `out`, padding with silence
    fn read_frames(source: &PcmBuffer, start: usize, out: &mut [StereoSample]) {
        let frames = source.samples().as_slice();
        let available = frames.len().saturating_sub(start).min(out.len());
        out[..available].copy_from_slice(&frames[start..start + available]);
        out[available..].fill(StereoSample::silence());
    }

    /// Render the next `output.len()` frames
    pub fn render(&mut self, output: &mut StereoBuffer) {
        let source = match (&self.source, self.playing) {
            (Some(source), true) => source,
            _ => {
                output.fill_silence();
                return;
            }
        };

        let consumed = if self.stretcher.is_unity() {
            Self::read_frames(source, self.playhead, output.as_mut_slice());
            output.len()
        } else {
            let wanted = self
                .stretcher
                .input_len_for(output.len())
                .min(self.stretch_capacity);
            self.stretch_input.set_len_from_capacity(wanted);
            Self::read_frames(source, self.playhead, self.stretch_input.as_mut_slice());
            self.stretcher.process(&self.stretch_input, output);
            wanted
        };

        self.playhead = (self.playhead + consumed).min(source.len());
        if self.playhead >= source.len() {
            self.playing = false;
        }
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc_handle;

    fn player_with(frames: usize) -> (DeckPlayer, Arc<DeckAtomics>) {
        let atomics = Arc::new(DeckAtomics::new());
        let mut player = DeckPlayer::new(1000, atomics.clone());
        let pcm = PcmBuffer::new(
            StereoBuffer::from_vec(vec![StereoSample::mono(0.25); frames]),
            1000,
        );
        player.load(Shared::new(&gc_handle(), pcm));
        (player, atomics)
    }

    #[test]
    fn test_paused_deck_renders_silence() {
        let (mut player, atomics) = player_with(100);
        let mut out = StereoBuffer::silence(32);
        player.render(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(atomics.position(), 0);
        assert!(atomics.is_loaded());
    }

    #[test]
    fn test_unity_playback_advances_playhead() {
        let (mut player, atomics) = player_with(100);
        player.play();
        let mut out = StereoBuffer::silence(32);
        player.render(&mut out);
        assert!((out[0].left - 0.25).abs() < 1e-6);
        assert_eq!(atomics.position(), 32);
        assert!((atomics.position_secs() - 0.032).abs() < 1e-9);
    }

    #[test]
    fn test_playback_stops_at_end() {
        let (mut player, atomics) = player_with(40);
        player.play();
        let mut out = StereoBuffer::silence(32);
        player.render(&mut out);
        player.render(&mut out);
        assert_eq!(out[8].left, 0.0);
        assert!(!atomics.is_playing());
        assert_eq!(atomics.position(), 40);
    }

    #[test]
    fn test_faster_rate_consumes_more_source() {
        let (mut player, atomics) = player_with(1000);
        player.set_rate(1.5);
        player.play();
        let mut out = StereoBuffer::silence(100);
        player.render(&mut out);
        assert_eq!(atomics.position(), 150);
    }

    #[test]
    fn test_seek_clamped_to_source() {
        let (mut player, atomics) = player_with(100);
        player.seek(5.0);
        assert_eq!(atomics.position(), 100);
        player.seek(0.05);
        assert_eq!(atomics.position(), 50);
    }
}
