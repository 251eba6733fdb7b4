//! Feedback delay stage
//!
//! Stereo delay line with a feedback path, mixed with the dry signal at the
//! stage output.

use crate::fx::{Effect, Param};
use crate::types::StereoBuffer;

/// Maximum delay time in seconds (buffer length)
pub const MAX_DELAY_SECONDS: f32 = 2.0;
/// Level of the delayed signal at the stage output
const DELAY_MIX: f32 = 0.5;

/// Stereo delay line
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_pos: 0,
            delay_samples: 1,
        }
    }

    fn capacity(&self) -> usize {
        self.buffer_l.len()
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.capacity() - 1);
    }

    #[inline]
    fn read(&self) -> (f32, f32) {
        let cap = self.capacity();
        let read_pos = (self.write_pos + cap - self.delay_samples) % cap;
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    #[inline]
    fn write(&mut self, left: f32, right: f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.capacity();
    }

    /// Process one sample through the delay with feedback
    #[inline]
    fn process(&mut self, left: f32, right: f32, feedback: f32) -> (f32, f32) {
        let (delayed_l, delayed_r) = self.read();
        self.write(left + delayed_l * feedback, right + delayed_r * feedback);
        (delayed_l, delayed_r)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Delay with feedback
///
/// Parameters:
/// - Time: 0.05 s to 0.5 s
/// - Feedback: 0.10 to 0.70
pub struct DelayEffect {
    time_secs: Param,
    feedback: Param,
    delay_line: DelayLine,
    sample_rate: f32,
}

impl DelayEffect {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let mut effect = Self {
            time_secs: Param::centered(0.05, 0.5),
            feedback: Param::centered(0.10, 0.70),
            delay_line: DelayLine::new((sr * MAX_DELAY_SECONDS) as usize),
            sample_rate: sr,
        };
        effect.update_delay_time();
        effect
    }

    pub fn time_secs(&self) -> f32 {
        self.time_secs.get()
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.get()
    }

    pub fn set_time_secs(&mut self, seconds: f32) {
        self.time_secs.set(seconds);
        self.update_delay_time();
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set(feedback);
    }

    fn update_delay_time(&mut self) {
        let samples = (self.time_secs() * self.sample_rate).round() as usize;
        self.delay_line.set_delay_samples(samples);
    }
}

impl Effect for DelayEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let feedback = self.feedback();
        let dry = 1.0 - DELAY_MIX;

        for sample in buffer.iter_mut() {
            let (delayed_l, delayed_r) =
                self.delay_line.process(sample.left, sample.right, feedback);
            sample.left = sample.left * dry + delayed_l * DELAY_MIX;
            sample.right = sample.right * dry + delayed_r * DELAY_MIX;
        }
    }

    fn reset(&mut self) {
        self.delay_line.reset();
    }
}
