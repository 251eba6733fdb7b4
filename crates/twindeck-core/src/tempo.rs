//! Tempo: BPM estimation, tap tempo, sync and beat-snap
//!
//! All operations run on the control thread and work on [`DeckState`]; the
//! resulting playback rate is realized by the deck's time stretcher, which
//! preserves pitch.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::deck::DeckState;
use crate::source::PcmBuffer;
use crate::types::NUM_DECKS;

/// Slowest playback rate
pub const MIN_RATE: f32 = 0.6;
/// Fastest playback rate
pub const MAX_RATE: f32 = 1.5;
/// Shortest accepted tap interval (240 BPM)
pub const TAP_MIN_INTERVAL: Duration = Duration::from_millis(250);
/// Longest accepted tap interval (30 BPM)
pub const TAP_MAX_INTERVAL: Duration = Duration::from_millis(2000);

/// Clamp a playback rate into the deck range; NaN resets to unity
#[inline]
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

/// Rate that brings a deck at `own_bpm` to `target_bpm`
///
/// `None` when either tempo is unknown.
pub fn sync_rate(own_bpm: Option<u32>, target_bpm: Option<u32>) -> Option<f32> {
    match (own_bpm, target_bpm) {
        (Some(own), Some(target)) if own > 0 && target > 0 => {
            Some(clamp_rate(target as f32 / own as f32))
        }
        _ => None,
    }
}

/// Nearest beat boundary to `position`, clamped to [0, duration]
pub fn snap_to_beat(position: f64, bpm: u32, duration: f64) -> f64 {
    if bpm == 0 {
        return position.clamp(0.0, duration.max(0.0));
    }
    let beat = 60.0 / bpm as f64;
    let snapped = (position / beat).round() * beat;
    snapped.clamp(0.0, duration.max(0.0))
}

/// Tap tempo estimator
///
/// Out-of-range intervals are discarded but still move the baseline, so a
/// long pause followed by two taps starts a fresh measurement.
#[derive(Debug, Clone, Default)]
pub struct TapTempo {
    last_tap: Option<Instant>,
}

impl TapTempo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tap; returns a BPM when the interval is in range
    pub fn tap(&mut self, now: Instant) -> Option<u32> {
        let previous = self.last_tap.replace(now)?;
        let interval = now.checked_duration_since(previous)?;

        if interval < TAP_MIN_INTERVAL || interval > TAP_MAX_INTERVAL {
            log::debug!("Tap interval {:?} out of range, discarded", interval);
            return None;
        }

        let millis = interval.as_secs_f64() * 1000.0;
        Some((60000.0 / millis).round() as u32)
    }

    pub fn last_tap(&self) -> Option<Instant> {
        self.last_tap
    }

    pub fn reset(&mut self) {
        self.last_tap = None;
    }
}

/// Per-deck tempo operations
#[derive(Debug, Default)]
pub struct TempoController {
    taps: [TapTempo; NUM_DECKS],
}

impl TempoController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run beat detection for a freshly loaded source
    ///
    /// Duration is always taken from the source. On detection failure the BPM
    /// is cleared, never defaulted.
    pub fn analyze(&self, deck: &mut DeckState, source: &PcmBuffer, detector: &dyn BeatDetector) {
        deck.duration = source.duration_secs();
        match detector.detect(source) {
            Ok(bpm) => {
                let rounded = bpm.round() as u32;
                log::info!(
                    "Deck {}: {} detected {:.2} BPM",
                    deck.id,
                    detector.name(),
                    bpm
                );
                deck.bpm = (rounded > 0).then_some(rounded);
            }
            Err(e) => {
                log::warn!("Deck {}: beat detection failed: {}", deck.id, e);
                deck.bpm = None;
            }
        }
    }

    /// Tap on a deck; a valid interval overwrites its BPM
    pub fn tap(&mut self, deck: &mut DeckState, now: Instant) -> Option<u32> {
        let bpm = self.taps[deck.id.index()].tap(now)?;
        deck.bpm = Some(bpm);
        Some(bpm)
    }

    /// Match `deck`'s tempo to `target`; no-op when either BPM is unknown
    pub fn sync(&self, deck: &mut DeckState, target: &DeckState) -> Option<f32> {
        let rate = sync_rate(deck.bpm, target.bpm)?;
        deck.rate = rate;
        Some(rate)
    }

    /// Set a deck's playback rate, clamped
    pub fn set_rate(&self, deck: &mut DeckState, rate: f32) -> f32 {
        deck.rate = clamp_rate(rate);
        deck.rate
    }

    /// Beat-snapped start position, if snapping applies
    pub fn snap_position(&self, deck: &DeckState, enabled: bool) -> Option<f64> {
        if !enabled {
            return None;
        }
        let bpm = deck.bpm?;
        Some(snap_to_beat(deck.position, bpm, deck.duration))
    }

    pub fn reset_taps(&mut self, deck: crate::types::DeckId) {
        self.taps[deck.index()].reset();
    }
}

/// Errors from beat detection
#[derive(Debug, Error, PartialEq)]
pub enum BeatDetectError {
    #[error("Source too short for tempo analysis ({0:.1}s)")]
    TooShort(f64),

    #[error("Source is silent")]
    Silent,

    #[error("No periodicity found in 60-180 BPM range")]
    NoPeak,
}

/// Tempo estimation backend
pub trait BeatDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Estimate the tempo of a source in BPM
    fn detect(&self, source: &PcmBuffer) -> Result<f64, BeatDetectError>;
}

/// Onset-energy autocorrelation detector
///
/// Frames the mono mixdown at ~200 Hz, takes the positive energy flux as an
/// onset envelope and picks the strongest autocorrelation lag between
/// `min_bpm` and `max_bpm`, refined by parabolic interpolation.
#[derive(Debug, Clone)]
pub struct EnergyBeatDetector {
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for EnergyBeatDetector {
    fn default() -> Self {
        Self {
            min_bpm: 60.0,
            max_bpm: 180.0,
        }
    }
}

/// Onset envelope frame rate (Hz)
const ONSET_FRAME_RATE: u32 = 200;

impl EnergyBeatDetector {
    fn onset_envelope(mono: &[f32], hop: usize) -> Vec<f32> {
        let energies: Vec<f32> = mono
            .chunks(hop)
            .map(|frame| frame.iter().map(|s| s * s).sum::<f32>())
            .collect();

        let mut onsets = Vec::with_capacity(energies.len());
        onsets.push(0.0);
        for pair in energies.windows(2) {
            onsets.push((pair[1] - pair[0]).max(0.0));
        }
        onsets
    }

    fn autocorrelation(onsets: &[f32], lag: usize) -> f32 {
        onsets
            .iter()
            .zip(onsets[lag..].iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

impl BeatDetector for EnergyBeatDetector {
    fn name(&self) -> &'static str {
        "energy-autocorrelation"
    }

    fn detect(&self, source: &PcmBuffer) -> Result<f64, BeatDetectError> {
        let sample_rate = source.sample_rate();
        let hop = (sample_rate / ONSET_FRAME_RATE).max(1) as usize;
        let frame_rate = sample_rate as f64 / hop as f64;

        let lag_min = ((60.0 * frame_rate / self.max_bpm).floor() as usize).max(1);
        let lag_max = (60.0 * frame_rate / self.min_bpm).ceil() as usize;

        let onsets = Self::onset_envelope(&source.mono(), hop);
        if onsets.len() < lag_max * 2 {
            return Err(BeatDetectError::TooShort(source.duration_secs()));
        }
        if onsets.iter().all(|&o| o <= f32::EPSILON) {
            return Err(BeatDetectError::Silent);
        }

        let scores: Vec<f32> = (lag_min..=lag_max + 1)
            .map(|lag| Self::autocorrelation(&onsets, lag))
            .collect();

        // Search within [lag_min, lag_max]; the extra entry is for interpolation
        let (best_idx, best) = scores[..scores.len() - 1]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, s)| (i, *s))
            .ok_or(BeatDetectError::NoPeak)?;

        if best <= 0.0 {
            return Err(BeatDetectError::NoPeak);
        }

        let mut lag = (lag_min + best_idx) as f64;
        if best_idx > 0 {
            let (y0, y1, y2) = (scores[best_idx - 1], best, scores[best_idx + 1]);
            let denom = y0 - 2.0 * y1 + y2;
            if denom.abs() > f32::EPSILON {
                lag += (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5) as f64;
            }
        }

        Ok(60.0 * frame_rate / lag)
    }
}
