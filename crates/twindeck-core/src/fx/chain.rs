//! Effect chain builder
//!
//! Pure mapping from a deck's [`FxState`] and [`EqGains`] to the ordered list
//! of stages that should be active. Order is fixed:
//!
//! ```text
//! gate -> EQ low -> EQ mid -> EQ high -> filter -> delay -> reverb
//! ```
//!
//! Disabled stages are left out entirely rather than passed through. The EQ
//! bands are always present. Reverb carries no parameters; it is included only
//! when its impulse response exists and the toggle is on.

use super::{EffectKind, EqBand, EqGains, FxState};

/// Gate threshold at wet 0 (dB)
pub const GATE_THRESHOLD_MIN_DB: f32 = -50.0;
/// Gate threshold span across the wet range (dB)
pub const GATE_THRESHOLD_SPAN_DB: f32 = 30.0;
/// Lowpass cutoff at wet 0 (Hz)
pub const FILTER_CUTOFF_MIN_HZ: f32 = 500.0;
/// Lowpass cutoff span across the wet range (Hz)
pub const FILTER_CUTOFF_SPAN_HZ: f32 = 7500.0;
/// Delay time at wet 0 (seconds)
pub const DELAY_TIME_MIN_S: f32 = 0.05;
/// Delay time span across the wet range (seconds)
pub const DELAY_TIME_SPAN_S: f32 = 0.45;
/// Delay feedback at wet 0
pub const DELAY_FEEDBACK_MIN: f32 = 0.10;
/// Delay feedback span across the wet range
pub const DELAY_FEEDBACK_SPAN: f32 = 0.60;

/// Number of slots in a fully populated chain
pub const MAX_STAGES: usize = 7;

#[inline]
pub fn gate_threshold_db(wet: f32) -> f32 {
    GATE_THRESHOLD_MIN_DB + GATE_THRESHOLD_SPAN_DB * wet.clamp(0.0, 1.0)
}

#[inline]
pub fn filter_cutoff_hz(wet: f32) -> f32 {
    FILTER_CUTOFF_MIN_HZ + FILTER_CUTOFF_SPAN_HZ * wet.clamp(0.0, 1.0)
}

#[inline]
pub fn delay_time_secs(wet: f32) -> f32 {
    DELAY_TIME_MIN_S + DELAY_TIME_SPAN_S * wet.clamp(0.0, 1.0)
}

#[inline]
pub fn delay_feedback(wet: f32) -> f32 {
    DELAY_FEEDBACK_MIN + DELAY_FEEDBACK_SPAN * wet.clamp(0.0, 1.0)
}

/// Identifies one of the seven persistent stage slots on a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageSlot {
    Gate,
    Eq(EqBand),
    Filter,
    Delay,
    Reverb,
}

impl StageSlot {
    /// Slots in their fixed chain order
    pub const ORDER: [StageSlot; MAX_STAGES] = [
        StageSlot::Gate,
        StageSlot::Eq(EqBand::Low),
        StageSlot::Eq(EqBand::Mid),
        StageSlot::Eq(EqBand::High),
        StageSlot::Filter,
        StageSlot::Delay,
        StageSlot::Reverb,
    ];

    /// Position in the fixed order
    pub fn position(self) -> usize {
        match self {
            StageSlot::Gate => 0,
            StageSlot::Eq(EqBand::Low) => 1,
            StageSlot::Eq(EqBand::Mid) => 2,
            StageSlot::Eq(EqBand::High) => 3,
            StageSlot::Filter => 4,
            StageSlot::Delay => 5,
            StageSlot::Reverb => 6,
        }
    }
}

/// One active stage and the parameters it should run with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Gate { threshold_db: f32 },
    Eq { band: EqBand, gain_db: f32 },
    Filter { cutoff_hz: f32 },
    Delay { time_s: f32, feedback: f32 },
    Reverb,
}

impl Stage {
    pub fn slot(&self) -> StageSlot {
        match self {
            Stage::Gate { .. } => StageSlot::Gate,
            Stage::Eq { band, .. } => StageSlot::Eq(*band),
            Stage::Filter { .. } => StageSlot::Filter,
            Stage::Delay { .. } => StageSlot::Delay,
            Stage::Reverb => StageSlot::Reverb,
        }
    }
}

/// Build the ordered list of active stages for one deck
///
/// `reverb_ready` reports whether the deck's impulse response exists.
pub fn build_chain(fx: &FxState, eq: &EqGains, reverb_ready: bool) -> Vec<Stage> {
    let mut chain = Vec::with_capacity(MAX_STAGES);

    if fx.is_enabled(EffectKind::Gate) {
        chain.push(Stage::Gate {
            threshold_db: gate_threshold_db(fx.wet(EffectKind::Gate)),
        });
    }

    let eq = eq.clamped();
    for band in EqBand::ALL {
        chain.push(Stage::Eq {
            band,
            gain_db: eq.get(band),
        });
    }

    if fx.is_enabled(EffectKind::Filter) {
        chain.push(Stage::Filter {
            cutoff_hz: filter_cutoff_hz(fx.wet(EffectKind::Filter)),
        });
    }

    if fx.is_enabled(EffectKind::Delay) {
        let wet = fx.wet(EffectKind::Delay);
        chain.push(Stage::Delay {
            time_s: delay_time_secs(wet),
            feedback: delay_feedback(wet),
        });
    }

    if reverb_ready && fx.is_enabled(EffectKind::Reverb) {
        chain.push(Stage::Reverb);
    }

    chain
}
