//! Single-band EQ stage (RBJ biquad)
//!
//! Each deck owns three of these: low shelf at 150 Hz, peak at 1 kHz, high
//! shelf at 6 kHz. Gain is in dB, clamped to +/-12.

use crate::fx::{Effect, EqBand, Param, EQ_GAIN_LIMIT_DB};
use crate::types::StereoBuffer;

/// Low shelf corner frequency (Hz)
pub const EQ_LOW_FREQ: f32 = 150.0;
/// Mid peak centre frequency (Hz)
pub const EQ_MID_FREQ: f32 = 1000.0;
/// High shelf corner frequency (Hz)
pub const EQ_HIGH_FREQ: f32 = 6000.0;
/// Mid peak Q
const EQ_MID_Q: f32 = 0.7;
/// Shelf slope (S = 1 is the steepest monotonic shelf)
const SHELF_SLOPE: f32 = 1.0;

/// Biquad filter state, both channels
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input_l: f32, input_r: f32, c: &BiquadCoeffs) -> (f32, f32) {
        let out_l = c.b0 * input_l + c.b1 * self.x1_l + c.b2 * self.x2_l
            - c.a1 * self.y1_l - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = c.b0 * input_r + c.b1 * self.x1_r + c.b2 * self.x2_r
            - c.a1 * self.y1_r - c.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, PartialEq)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    fn shelf_alpha(a: f32, sin_w0: f32) -> f32 {
        sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt()
    }

    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = Self::shelf_alpha(a, w0.sin());
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = Self::shelf_alpha(a, w0.sin());
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// One EQ band of a deck
pub struct EqBandEffect {
    gain_db: Param,
    band: EqBand,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl EqBandEffect {
    pub fn new(band: EqBand, sample_rate: u32) -> Self {
        let mut effect = Self {
            gain_db: Param::centered(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB),
            band,
            sample_rate: sample_rate.max(1) as f32,
            coeffs: BiquadCoeffs::passthrough(),
            state: BiquadState::default(),
        };
        effect.update_coeffs();
        effect
    }

    pub fn band(&self) -> EqBand {
        self.band
    }

    pub fn frequency(&self) -> f32 {
        match self.band {
            EqBand::Low => EQ_LOW_FREQ,
            EqBand::Mid => EQ_MID_FREQ,
            EqBand::High => EQ_HIGH_FREQ,
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.get()
    }

    /// Set the band gain in dB; coefficients are recomputed only on change
    pub fn set_gain_db(&mut self, gain_db: f32) {
        let before = self.gain_db();
        self.gain_db.set(gain_db);
        if (self.gain_db() - before).abs() > f32::EPSILON {
            self.update_coeffs();
        }
    }

    fn update_coeffs(&mut self) {
        let gain = self.gain_db();
        let freq = self.frequency();
        self.coeffs = if gain.abs() < 0.01 {
            BiquadCoeffs::passthrough()
        } else {
            match self.band {
                EqBand::Low => BiquadCoeffs::low_shelf(freq, gain, self.sample_rate),
                EqBand::Mid => BiquadCoeffs::peaking(freq, gain, EQ_MID_Q, self.sample_rate),
                EqBand::High => BiquadCoeffs::high_shelf(freq, gain, self.sample_rate),
            }
        };
    }
}

impl Effect for EqBandEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let (l, r) = self.state.process(sample.left, sample.right, &self.coeffs);
            sample.left = l;
            sample.right = r;
        }
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}
