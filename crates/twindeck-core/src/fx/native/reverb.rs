//! Convolution reverb
//!
//! Uniformly partitioned overlap-save convolution against a synthetic noise
//! impulse: 1.3 s of uniform noise shaped by `(1 - pos/len)^2.3`. The impulse
//! is generated once per deck and never regenerated.
//!
//! The wet path carries one block of latency ([`BLOCK_SIZE`] samples).

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};

use crate::fx::Effect;
use crate::types::StereoBuffer;

/// Impulse length in seconds
pub const IMPULSE_SECONDS: f32 = 1.3;
/// Impulse decay exponent
pub const IMPULSE_DECAY: f32 = 2.3;
/// Partition size of the convolver
pub const BLOCK_SIZE: usize = 1024;
/// Level of the reverberated signal at the stage output
const REVERB_MIX: f32 = 0.35;

/// Stereo impulse response
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    /// Generate a decaying noise impulse from an entropy-seeded RNG
    pub fn generate(sample_rate: u32) -> Self {
        Self::generate_with(sample_rate, &mut SmallRng::from_entropy())
    }

    /// Deterministic variant for reproducible output
    pub fn generate_seeded(sample_rate: u32, seed: u64) -> Self {
        Self::generate_with(sample_rate, &mut SmallRng::seed_from_u64(seed))
    }

    fn generate_with<R: Rng>(sample_rate: u32, rng: &mut R) -> Self {
        let len = ((sample_rate as f32 * IMPULSE_SECONDS) as usize).max(1);
        let channel = |rng: &mut R| -> Vec<f32> {
            (0..len)
                .map(|i| {
                    let shape = (1.0 - i as f32 / len as f32).powf(IMPULSE_DECAY);
                    rng.gen_range(-1.0f32..1.0) * shape
                })
                .collect()
        };
        let left = channel(rng);
        let right = channel(rng);
        Self { left, right, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scale so the impulse has unit energy
fn normalization_scale(ir: &[f32]) -> f32 {
    let energy: f32 = ir.iter().map(|s| s * s).sum();
    if energy > f32::EPSILON {
        1.0 / energy.sqrt()
    } else {
        0.0
    }
}

/// Single-channel partitioned convolver
struct Convolver {
    block: usize,
    fwd: Arc<dyn RealToComplex<f32>>,
    inv: Arc<dyn ComplexToReal<f32>>,
    /// Spectra of the impulse partitions
    ir_spectra: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input frames
    fdl: Vec<Vec<Complex<f32>>>,
    fdl_head: usize,
    /// Previous block followed by the block being filled
    input_frame: Vec<f32>,
    time_buf: Vec<f32>,
    accum: Vec<Complex<f32>>,
    out_time: Vec<f32>,
    output_block: Vec<f32>,
    scratch_fwd: Vec<Complex<f32>>,
    scratch_inv: Vec<Complex<f32>>,
}

impl Convolver {
    fn new(ir: &[f32], block: usize, planner: &mut RealFftPlanner<f32>) -> Result<Self, FftError> {
        let block = block.max(1);
        let fft_len = block * 2;
        let fwd = planner.plan_fft_forward(fft_len);
        let inv = planner.plan_fft_inverse(fft_len);

        let scale = normalization_scale(ir);
        let partitions = ir.len().div_ceil(block).max(1);
        let mut scratch_fwd = fwd.make_scratch_vec();

        let ir_spectra = (0..partitions)
            .map(|p| {
                let mut padded = vec![0.0f32; fft_len];
                let start = p * block;
                let end = (start + block).min(ir.len());
                for (dst, src) in padded.iter_mut().zip(ir[start.min(end)..end].iter()) {
                    *dst = src * scale;
                }
                let mut spectrum = fwd.make_output_vec();
                fwd.process_with_scratch(&mut padded, &mut spectrum, &mut scratch_fwd)?;
                Ok(spectrum)
            })
            .collect::<Result<Vec<_>, FftError>>()?;

        Ok(Self {
            block,
            fdl: vec![fwd.make_output_vec(); partitions],
            fdl_head: 0,
            input_frame: vec![0.0; fft_len],
            time_buf: vec![0.0; fft_len],
            accum: inv.make_input_vec(),
            out_time: inv.make_output_vec(),
            output_block: vec![0.0; block],
            scratch_inv: inv.make_scratch_vec(),
            scratch_fwd,
            ir_spectra,
            fwd,
            inv,
        })
    }

    #[inline]
    fn push(&mut self, pos: usize, input: f32) -> f32 {
        self.input_frame[self.block + pos] = input;
        self.output_block[pos]
    }

    /// Convolve the completed input block; results are read on the next block
    fn run_block(&mut self) {
        let partitions = self.ir_spectra.len();

        self.time_buf.copy_from_slice(&self.input_frame);
        if self
            .fwd
            .process_with_scratch(
                &mut self.time_buf,
                &mut self.fdl[self.fdl_head],
                &mut self.scratch_fwd,
            )
            .is_err()
        {
            return;
        }

        self.accum.fill(Complex::new(0.0, 0.0));
        for (p, h) in self.ir_spectra.iter().enumerate() {
            let x = &self.fdl[(self.fdl_head + partitions - p) % partitions];
            for ((acc, xk), hk) in self.accum.iter_mut().zip(x.iter()).zip(h.iter()) {
                *acc += xk * hk;
            }
        }

        let last = self.accum.len() - 1;
        self.accum[0].im = 0.0;
        self.accum[last].im = 0.0;

        if self
            .inv
            .process_with_scratch(&mut self.accum, &mut self.out_time, &mut self.scratch_inv)
            .is_ok()
        {
            let norm = 1.0 / self.out_time.len() as f32;
            for (dst, src) in self
                .output_block
                .iter_mut()
                .zip(self.out_time[self.block..].iter())
            {
                *dst = src * norm;
            }
        }

        self.input_frame.copy_within(self.block.., 0);
        self.fdl_head = (self.fdl_head + 1) % partitions;
    }

    fn reset(&mut self) {
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.input_frame.fill(0.0);
        self.output_block.fill(0.0);
        self.fdl_head = 0;
    }
}

/// Stereo convolution reverb (no parameters)
pub struct ReverbEffect {
    left: Convolver,
    right: Convolver,
    fill: usize,
    block: usize,
}

impl ReverbEffect {
    /// Build the convolver for `impulse`
    ///
    /// Fails only if the impulse partitions cannot be transformed.
    pub fn new(impulse: &ImpulseResponse) -> Result<Self, FftError> {
        Self::with_block_size(impulse, BLOCK_SIZE)
    }

    fn with_block_size(impulse: &ImpulseResponse, block: usize) -> Result<Self, FftError> {
        let mut planner = RealFftPlanner::<f32>::new();
        let left = Convolver::new(&impulse.left, block, &mut planner)?;
        let right = Convolver::new(&impulse.right, block, &mut planner)?;
        Ok(Self {
            block: left.block,
            left,
            right,
            fill: 0,
        })
    }
}

impl Effect for ReverbEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let dry = 1.0 - REVERB_MIX;
        for sample in buffer.iter_mut() {
            let wet_l = self.left.push(self.fill, sample.left);
            let wet_r = self.right.push(self.fill, sample.right);
            sample.left = sample.left * dry + wet_l * REVERB_MIX;
            sample.right = sample.right * dry + wet_r * REVERB_MIX;

            self.fill += 1;
            if self.fill == self.block {
                self.left.run_block();
                self.right.run_block();
                self.fill = 0;
            }
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.fill = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_impulse_shape() {
        let ir = ImpulseResponse::generate_seeded(1000, 7);
        assert_eq!(ir.len(), 1300);
        assert!(ir.left.iter().all(|s| s.abs() <= 1.0));

        // Envelope bounds every sample
        for (i, s) in ir.left.iter().enumerate() {
            let shape = (1.0 - i as f32 / 1300.0).powf(IMPULSE_DECAY);
            assert!(s.abs() <= shape + 1e-6);
        }
        let head: f32 = ir.left[..100].iter().map(|s| s.abs()).sum();
        let tail: f32 = ir.left[1200..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 10.0);
    }

    #[test]
    fn test_seeded_impulse_is_deterministic() {
        let a = ImpulseResponse::generate_seeded(2000, 42);
        let b = ImpulseResponse::generate_seeded(2000, 42);
        assert_eq!(a.left, b.left);
        assert_ne!(a.left, a.right);
    }

    #[test]
    fn test_convolver_matches_direct_convolution() {
        let ir: Vec<f32> = (0..20).map(|i| 1.0 / (i as f32 + 1.0)).collect();
        let scale = normalization_scale(&ir);
        let block = 8;
        let mut planner = RealFftPlanner::<f32>::new();
        let mut conv = Convolver::new(&ir, block, &mut planner).unwrap();

        let input: Vec<f32> = (0..64).map(|i| ((i * 7) % 5) as f32 - 2.0).collect();
        let mut output = Vec::with_capacity(input.len());
        let mut pos = 0;
        for &x in &input {
            output.push(conv.push(pos, x));
            pos += 1;
            if pos == block {
                conv.run_block();
                pos = 0;
            }
        }

        // Output lags the direct result by one block
        for n in block..input.len() {
            let t = n - block;
            let expected: f32 = (0..=t)
                .filter(|k| t - k < ir.len())
                .map(|k| input[k] * ir[t - k] * scale)
                .sum();
            assert!(
                (output[n] - expected).abs() < 1e-3,
                "sample {}: {} vs {}",
                n,
                output[n],
                expected
            );
        }
    }

    #[test]
    fn test_reverb_adds_tail() {
        let ir = ImpulseResponse::generate_seeded(1000, 3);
        let mut reverb = ReverbEffect::with_block_size(&ir, 64).unwrap();

        let mut buffer = StereoBuffer::silence(1024);
        buffer[0] = StereoSample::mono(1.0);
        reverb.process(&mut buffer);

        let tail: f32 = buffer.as_slice()[64..512].iter().map(|s| s.left.abs()).sum();
        assert!(tail > 0.0);
        assert!((buffer[0].left - (1.0 - REVERB_MIX)).abs() < 1e-6);
    }

    #[test]
    fn test_reset_silences_tail() {
        let ir = ImpulseResponse::generate_seeded(1000, 3);
        let mut reverb = ReverbEffect::with_block_size(&ir, 64).unwrap();

        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(1.0); 256]);
        reverb.process(&mut buffer);
        reverb.reset();

        let mut silence = StereoBuffer::silence(512);
        reverb.process(&mut silence);
        assert!(silence.peak() < 1e-6);
    }
}
