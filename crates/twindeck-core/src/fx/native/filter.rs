//! Lowpass filter stage - two-pole state-variable filter

use crate::fx::{Effect, Param};
use crate::types::StereoBuffer;

/// Fixed resonance of the deck lowpass
const FILTER_Q: f32 = 0.707;

/// Two-pole (12dB/octave) TPT state-variable filter, lowpass output only
struct SvfLowpass {
    ic1eq_l: f32,
    ic2eq_l: f32,
    ic1eq_r: f32,
    ic2eq_r: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfLowpass {
    fn new() -> Self {
        Self {
            ic1eq_l: 0.0,
            ic2eq_l: 0.0,
            ic1eq_r: 0.0,
            ic2eq_r: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        }
    }

    fn set_params(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        // Keep the cutoff below Nyquist so tan() stays finite
        let cutoff = cutoff.clamp(20.0, sample_rate * 0.45);
        let g = (std::f32::consts::PI * cutoff / sample_rate).tan();
        let k = 1.0 / q;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let v3_l = left - self.ic2eq_l;
        let v1_l = self.a1 * self.ic1eq_l + self.a2 * v3_l;
        let v2_l = self.ic2eq_l + self.a2 * self.ic1eq_l + self.a3 * v3_l;
        self.ic1eq_l = 2.0 * v1_l - self.ic1eq_l;
        self.ic2eq_l = 2.0 * v2_l - self.ic2eq_l;

        let v3_r = right - self.ic2eq_r;
        let v1_r = self.a1 * self.ic1eq_r + self.a2 * v3_r;
        let v2_r = self.ic2eq_r + self.a2 * self.ic1eq_r + self.a3 * v3_r;
        self.ic1eq_r = 2.0 * v1_r - self.ic1eq_r;
        self.ic2eq_r = 2.0 * v2_r - self.ic2eq_r;

        (v2_l, v2_r)
    }

    fn reset(&mut self) {
        self.ic1eq_l = 0.0;
        self.ic2eq_l = 0.0;
        self.ic1eq_r = 0.0;
        self.ic2eq_r = 0.0;
    }
}

/// Deck lowpass filter
///
/// Parameters:
/// - Cutoff: 500 Hz to 8000 Hz
pub struct LowpassEffect {
    cutoff_hz: Param,
    filter: SvfLowpass,
    sample_rate: f32,
}

impl LowpassEffect {
    pub fn new(sample_rate: u32) -> Self {
        let mut effect = Self {
            cutoff_hz: Param::centered(500.0, 8000.0),
            filter: SvfLowpass::new(),
            sample_rate: sample_rate.max(1) as f32,
        };
        effect.update_filter();
        effect
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz.get()
    }

    pub fn set_cutoff_hz(&mut self, cutoff_hz: f32) {
        self.cutoff_hz.set(cutoff_hz);
        self.update_filter();
    }

    fn update_filter(&mut self) {
        let cutoff = self.cutoff_hz();
        self.filter.set_params(cutoff, FILTER_Q, self.sample_rate);
    }
}

impl Effect for LowpassEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let (l, r) = self.filter.process(sample.left, sample.right);
            sample.left = l;
            sample.right = r;
        }
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn nyquist(len: usize) -> StereoBuffer {
        let samples = (0..len)
            .map(|i| StereoSample::mono(if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        StereoBuffer::from_vec(samples)
    }

    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut effect = LowpassEffect::new(48000);
        effect.set_cutoff_hz(500.0);

        let mut buffer = nyquist(256);
        effect.process(&mut buffer);

        let avg: f32 = buffer.iter().map(|s| s.left.abs()).sum::<f32>() / buffer.len() as f32;
        assert!(avg < 0.1, "lowpass should attenuate high frequencies");
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut effect = LowpassEffect::new(48000);
        effect.set_cutoff_hz(8000.0);

        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(0.5); 2048]);
        effect.process(&mut buffer);
        assert!((buffer[2047].left - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut effect = LowpassEffect::new(48000);
        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(1.0); 512]);
        effect.process(&mut buffer);
        effect.reset();

        let mut silence = StereoBuffer::silence(16);
        effect.process(&mut silence);
        assert_eq!(silence.peak(), 0.0);
    }
}
