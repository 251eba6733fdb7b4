//! Level and spectrum metering on the visual clock
//!
//! Each deck's post-chain signal reaches the control thread through an
//! [`AnalysisTap`], which turns the most recent samples into a byte spectrum.
//! [`MeteringService`] folds both decks' spectra into smoothed levels, a bar
//! display and the ambient pulse once per tick.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::types::NUM_DECKS;

/// Analysis window length in samples
pub const FFT_SIZE: usize = 512;
/// Frequency bins exposed per spectrum
pub const BIN_COUNT: usize = FFT_SIZE / 2;
/// Temporal smoothing of bin magnitudes between polls
pub const SPECTRUM_SMOOTHING: f32 = 0.8;
/// Magnitudes at or below this map to byte 0
pub const MIN_DECIBELS: f32 = -100.0;
/// Magnitudes at or above this map to byte 255
pub const MAX_DECIBELS: f32 = -30.0;

/// Number of spectrum bars
pub const BARS: usize = 24;
/// Level decay per tick while the deck is playing
pub const LEVEL_DECAY_PLAYING: f32 = 0.85;
/// Level decay per tick while idle
pub const LEVEL_DECAY_IDLE: f32 = 0.9;
/// Idle level never falls below this
pub const LEVEL_FLOOR: f32 = 0.02;
/// Bar decay per tick
pub const BAR_DECAY: f32 = 0.82;

/// Control-side end of a deck's analysis ring
pub struct AnalysisTap {
    consumer: rtrb::Consumer<f32>,
    /// Circular window of the latest samples
    history: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl AnalysisTap {
    pub fn new(consumer: rtrb::Consumer<f32>) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        let window = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        Self {
            consumer,
            history: vec![0.0; FFT_SIZE],
            write_pos: 0,
            window,
            frame: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            smoothed: vec![0.0; BIN_COUNT],
            bytes: vec![0; BIN_COUNT],
        }
    }

    /// Pull pending samples from the audio thread and refresh the spectrum
    ///
    /// Returns the number of new samples consumed.
    pub fn poll(&mut self) -> usize {
        let available = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(available) {
            let (first, second) = chunk.as_slices();
            for &sample in first.iter().chain(second.iter()) {
                self.history[self.write_pos] = sample;
                self.write_pos = (self.write_pos + 1) % FFT_SIZE;
            }
            chunk.commit_all();
        }
        self.analyze();
        available
    }

    fn analyze(&mut self) {
        for (i, (dst, w)) in self.frame.iter_mut().zip(self.window.iter()).enumerate() {
            *dst = self.history[(self.write_pos + i) % FFT_SIZE] * w;
        }
        if self
            .fft
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
            .is_err()
        {
            return;
        }

        let norm = 1.0 / FFT_SIZE as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for k in 0..BIN_COUNT {
            let magnitude = self.spectrum[k].norm() * norm;
            let smoothed =
                SPECTRUM_SMOOTHING * self.smoothed[k] + (1.0 - SPECTRUM_SMOOTHING) * magnitude;
            self.smoothed[k] = smoothed;

            self.bytes[k] = if smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    /// Drop pending samples and forget the analyzed history
    ///
    /// Called when the deck's chain is disconnected, so a paused deck does
    /// not keep reporting its last spectrum.
    pub fn clear(&mut self) {
        let pending = self.consumer.slots();
        if let Ok(chunk) = self.consumer.read_chunk(pending) {
            chunk.commit_all();
        }
        self.history.fill(0.0);
        self.write_pos = 0;
        self.smoothed.fill(0.0);
        self.bytes.fill(0);
    }

    /// Latest spectrum, one byte per bin
    pub fn byte_frequency_data(&self) -> &[u8] {
        &self.bytes
    }
}

/// Bin sampled by spectrum bar `bar`
///
/// Quadratic spacing gives the low end more bars.
pub fn bar_bin(bar: usize, bin_count: usize) -> usize {
    let t = (bar as f32 + 0.5) / BARS as f32;
    ((t * t * bin_count as f32) as usize).min(bin_count.saturating_sub(1))
}

/// RMS of a byte spectrum, normalized to [0, 1]
pub fn spectrum_rms(spectrum: &[u8]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let sum: f32 = spectrum.iter().map(|&b| (b as f32) * (b as f32)).sum();
    (sum / spectrum.len() as f32).sqrt() / 255.0
}

/// What one deck contributes to a metering tick
#[derive(Debug, Clone, Copy, Default)]
pub struct DeckMeterInput<'a> {
    pub playing: bool,
    /// Byte spectrum, `None` when the deck has no analysis tap yet
    pub spectrum: Option<&'a [u8]>,
}

/// Result of one metering tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterFrame {
    pub levels: [f32; NUM_DECKS],
    pub bars: [f32; BARS],
    /// Loudest deck level in [0, 1], for secondary visuals
    pub pulse: f32,
}

/// Smoothed per-deck levels and spectrum bars
#[derive(Debug, Clone)]
pub struct MeteringService {
    levels: [f32; NUM_DECKS],
    bars: [f32; BARS],
}

impl Default for MeteringService {
    fn default() -> Self {
        Self::new()
    }
}

impl MeteringService {
    pub fn new() -> Self {
        Self {
            levels: [0.0; NUM_DECKS],
            bars: [0.0; BARS],
        }
    }

    pub fn levels(&self) -> [f32; NUM_DECKS] {
        self.levels
    }

    pub fn bars(&self) -> &[f32; BARS] {
        &self.bars
    }

    /// Advance one visual-clock tick
    pub fn tick(&mut self, decks: [DeckMeterInput<'_>; NUM_DECKS]) -> MeterFrame {
        for (level, input) in self.levels.iter_mut().zip(decks.iter()) {
            *level = match (input.playing, input.spectrum) {
                (true, Some(spectrum)) => (*level * LEVEL_DECAY_PLAYING).max(spectrum_rms(spectrum)),
                _ => (*level * LEVEL_DECAY_IDLE).max(LEVEL_FLOOR),
            };
        }

        // Only playing decks feed the bars; the rest decay
        for (i, bar) in self.bars.iter_mut().enumerate() {
            let raw = decks
                .iter()
                .filter(|input| input.playing)
                .filter_map(|input| input.spectrum)
                .filter(|spectrum| !spectrum.is_empty())
                .map(|spectrum| spectrum[bar_bin(i, spectrum.len())] as f32 / 255.0)
                .fold(0.0f32, f32::max);
            *bar = (*bar * BAR_DECAY).max(raw);
        }

        let pulse = self.levels.iter().copied().fold(0.0f32, f32::max).clamp(0.0, 1.0);

        MeterFrame {
            levels: self.levels,
            bars: self.bars,
            pulse,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_with(samples: &[f32]) -> AnalysisTap {
        let (mut producer, consumer) = rtrb::RingBuffer::new(4096);
        for &s in samples {
            producer.push(s).unwrap();
        }
        AnalysisTap::new(consumer)
    }

    #[test]
    fn test_silent_tap_reads_zero() {
        let mut tap = tap_with(&[0.0; 600]);
        assert_eq!(tap.poll(), 600);
        assert!(tap.byte_frequency_data().iter().all(|&b| b == 0));
        assert_eq!(tap.byte_frequency_data().len(), BIN_COUNT);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        // Bin 32 of a 512-point FFT
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|n| (2.0 * std::f32::consts::PI * 32.0 * n as f32 / FFT_SIZE as f32).sin())
            .collect();
        let mut tap = tap_with(&samples);
        tap.poll();

        let bytes = tap.byte_frequency_data();
        assert_eq!(bytes[32], 255);
        assert!(bytes[32] > bytes[100]);
    }

    #[test]
    fn test_clear_forgets_history() {
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|n| (2.0 * std::f32::consts::PI * 32.0 * n as f32 / FFT_SIZE as f32).sin())
            .collect();
        let mut tap = tap_with(&samples);
        tap.poll();
        assert!(tap.byte_frequency_data()[32] > 0);

        tap.clear();
        assert!(tap.byte_frequency_data().iter().all(|&b| b == 0));
        // Nothing new arrived, so the next poll stays silent
        assert_eq!(tap.poll(), 0);
        assert!(tap.byte_frequency_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bar_bins_are_quadratic() {
        assert_eq!(bar_bin(0, 256), 0);
        // (23.5 / 24)^2 * 256 = 245.4
        assert_eq!(bar_bin(23, 256), 245);
        assert!(bar_bin(12, 256) < 128);
    }

    #[test]
    fn test_playing_level_attacks_and_decays() {
        let mut meter = MeteringService::new();
        let loud = [255u8; BIN_COUNT];
        let frame = meter.tick([
            DeckMeterInput { playing: true, spectrum: Some(&loud) },
            DeckMeterInput::default(),
        ]);
        assert!((frame.levels[0] - 1.0).abs() < 1e-6);
        assert!((frame.pulse - 1.0).abs() < 1e-6);

        let quiet = [0u8; BIN_COUNT];
        let frame = meter.tick([
            DeckMeterInput { playing: true, spectrum: Some(&quiet) },
            DeckMeterInput::default(),
        ]);
        assert!((frame.levels[0] - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_idle_level_decays_to_floor() {
        let mut meter = MeteringService::new();
        let frame = meter.tick([DeckMeterInput::default(); NUM_DECKS]);
        assert!((frame.levels[1] - LEVEL_FLOOR).abs() < 1e-6);

        meter.levels = [0.5, 0.5];
        // Paused with a tap still counts as idle
        let spectrum = [200u8; BIN_COUNT];
        let frame = meter.tick([
            DeckMeterInput { playing: false, spectrum: Some(&spectrum) },
            DeckMeterInput::default(),
        ]);
        assert!((frame.levels[0] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_bars_take_louder_deck() {
        let mut meter = MeteringService::new();
        let mut a = [0u8; BIN_COUNT];
        let mut b = [0u8; BIN_COUNT];
        a[bar_bin(0, BIN_COUNT)] = 51;
        b[bar_bin(0, BIN_COUNT)] = 102;
        a[bar_bin(5, BIN_COUNT)] = 255;

        let frame = meter.tick([
            DeckMeterInput { playing: true, spectrum: Some(&a) },
            DeckMeterInput { playing: true, spectrum: Some(&b) },
        ]);
        assert!((frame.bars[0] - 0.4).abs() < 1e-6);
        assert!((frame.bars[5] - 1.0).abs() < 1e-6);

        let frame = meter.tick([DeckMeterInput::default(); NUM_DECKS]);
        assert!((frame.bars[5] - BAR_DECAY).abs() < 1e-6);
    }

    #[test]
    fn test_paused_deck_bars_decay() {
        let mut meter = MeteringService::new();
        let loud = [255u8; BIN_COUNT];
        meter.tick([
            DeckMeterInput { playing: true, spectrum: Some(&loud) },
            DeckMeterInput::default(),
        ]);

        // Same frozen spectrum, deck no longer playing
        let mut frame = meter.tick([DeckMeterInput::default(); NUM_DECKS]);
        for _ in 0..60 {
            frame = meter.tick([
                DeckMeterInput { playing: false, spectrum: Some(&loud) },
                DeckMeterInput::default(),
            ]);
        }
        assert!(frame.bars.iter().all(|&bar| bar < 1e-4));
    }
}
