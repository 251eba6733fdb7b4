//! Noise gate - silences the signal while its envelope sits below a threshold

use crate::fx::{Effect, Param};
use crate::types::StereoBuffer;

/// Envelope attack time (seconds)
const ATTACK_S: f32 = 0.002;
/// Envelope release time (seconds)
const RELEASE_S: f32 = 0.080;
/// Gain smoothing time when the gate opens or closes (seconds)
const GAIN_SMOOTH_S: f32 = 0.005;

/// Noise gate with peak envelope follower and smoothed gain
///
/// Parameters:
/// - Threshold: -50 dB to -20 dB
pub struct GateEffect {
    threshold_db: Param,
    attack_coeff: f32,
    release_coeff: f32,
    smooth_coeff: f32,
    envelope: f32,
    gain: f32,
}

impl GateEffect {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;

        Self {
            threshold_db: Param::centered(-50.0, -20.0),
            attack_coeff: time_coeff(ATTACK_S, sr),
            release_coeff: time_coeff(RELEASE_S, sr),
            smooth_coeff: time_coeff(GAIN_SMOOTH_S, sr),
            envelope: 0.0,
            gain: 1.0,
        }
    }

    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db.set(threshold_db);
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db.get()
    }
}

/// One-pole coefficient for a time constant
#[inline]
fn time_coeff(seconds: f32, sample_rate: f32) -> f32 {
    (-1.0 / (seconds * sample_rate)).exp()
}

#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

impl Effect for GateEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let threshold = db_to_linear(self.threshold_db());

        for sample in buffer.iter_mut() {
            let level = sample.peak();
            let coeff = if level > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = level + coeff * (self.envelope - level);

            let target = if self.envelope >= threshold { 1.0 } else { 0.0 };
            self.gain = target + self.smooth_coeff * (self.gain - target);

            *sample *= self.gain;
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_gate_closes_on_quiet_signal() {
        let mut gate = GateEffect::new(48000);
        gate.set_threshold_db(-20.0);

        // -40 dB constant signal, well under threshold
        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(0.01); 4800]);
        gate.process(&mut buffer);

        assert!(buffer[4799].left.abs() < 1e-4);
    }

    #[test]
    fn test_gate_passes_loud_signal() {
        let mut gate = GateEffect::new(48000);
        gate.set_threshold_db(-50.0);

        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(0.5); 4800]);
        gate.process(&mut buffer);

        assert!((buffer[4799].left - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_clamped_to_range() {
        let mut gate = GateEffect::new(48000);
        gate.set_threshold_db(-90.0);
        assert_eq!(gate.threshold_db(), -50.0);
        gate.set_threshold_db(-35.0);
        assert!((gate.threshold_db() + 35.0).abs() < 1e-3);
    }
}
