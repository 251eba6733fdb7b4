//! Pitch-preserving playback rate via signalsmith-stretch
//!
//! A deck playing at rate `r` reads `r * n` source frames for every `n`
//! output frames; the stretcher squeezes or expands them without changing
//! pitch.

use signalsmith_stretch::Stretch;

use crate::tempo::clamp_rate;
use crate::types::StereoBuffer;

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Time stretcher driving deck playback rate
pub struct TimeStretcher {
    stretcher: Stretch,
    /// Playback rate, source frames per output frame
    rate: f32,
}

impl TimeStretcher {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            rate: 1.0,
        }
    }

    /// Set the playback rate, clamped to the deck rate range
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = clamp_rate(rate);
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Number of source frames to feed for `output_len` output frames
    #[inline]
    pub fn input_len_for(&self, output_len: usize) -> usize {
        (output_len as f32 * self.rate).round() as usize
    }

    /// Whether the stretcher can be skipped (unity rate)
    #[inline]
    pub fn is_unity(&self) -> bool {
        (self.rate - 1.0).abs() < 1e-4
    }

    pub fn reset(&mut self) {
        self.stretcher.reset();
    }

    /// Stretch `input` into `output`; the length ratio sets the tempo change
    ///
    /// Both buffers are viewed as interleaved f32 without copying.
    pub fn process(&mut self, input: &StereoBuffer, output: &mut StereoBuffer) {
        if input.is_empty() {
            output.fill_silence();
            return;
        }

        let output_interleaved = output.as_interleaved_mut();
        output_interleaved.fill(0.0);
        self.stretcher.process(input.as_interleaved(), output_interleaved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_clamped() {
        let mut stretcher = TimeStretcher::new(48000);
        assert_eq!(stretcher.rate(), 1.0);
        assert!(stretcher.is_unity());

        stretcher.set_rate(3.0);
        assert_eq!(stretcher.rate(), 1.5);
        stretcher.set_rate(0.1);
        assert_eq!(stretcher.rate(), 0.6);
    }

    #[test]
    fn test_input_len_follows_rate() {
        let mut stretcher = TimeStretcher::new(48000);
        stretcher.set_rate(1.25);
        assert_eq!(stretcher.input_len_for(512), 640);
        stretcher.set_rate(0.8);
        assert_eq!(stretcher.input_len_for(512), 410);
    }

    #[test]
    fn test_process_fills_output() {
        let mut stretcher = TimeStretcher::new(48000);
        stretcher.set_rate(1.2);

        let input = StereoBuffer::silence(stretcher.input_len_for(256));
        let mut output = StereoBuffer::silence(256);
        stretcher.process(&input, &mut output);

        assert_eq!(output.len(), 256);
    }
}
