//! Effect system - stage trait, parameters and per-deck effect state
//!
//! - [`Effect`]: the trait every processing stage implements
//! - [`FxState`]: the control-layer toggles and wet amounts for one deck
//! - [`chain`]: turns an [`FxState`] plus EQ gains into an ordered stage list
//! - [`native`]: the Rust DSP behind each stage

pub mod chain;
pub mod native;

use serde::{Deserialize, Serialize};

use crate::types::StereoBuffer;

/// A stage parameter held in its own unit and clamped to a range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    value: f32,
    min: f32,
    max: f32,
}

impl Param {
    /// Parameter starting at the middle of `min..=max`
    pub fn centered(min: f32, max: f32) -> Self {
        Self {
            value: min + 0.5 * (max - min),
            min,
            max,
        }
    }

    pub fn get(&self) -> f32 {
        self.value
    }

    /// Store `value` clamped to the range; NaN leaves the value unchanged
    pub fn set(&mut self, value: f32) {
        if !value.is_nan() {
            self.value = value.clamp(self.min, self.max);
        }
    }
}

/// The processing-stage trait
///
/// Stages are created once per deck on the control thread, moved to the audio
/// thread and only reparametrized afterwards. `process` runs on the audio
/// thread and must not allocate.
pub trait Effect: Send {
    /// Process a stereo buffer in-place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Clear internal state (delay lines, filter memory)
    fn reset(&mut self);
}

/// The four toggleable effect kinds on each deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Reverb,
    Delay,
    Filter,
    Gate,
}

impl EffectKind {
    /// All kinds, in settings order
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Filter,
        EffectKind::Gate,
    ];

    fn slot(self) -> usize {
        match self {
            EffectKind::Reverb => 0,
            EffectKind::Delay => 1,
            EffectKind::Filter => 2,
            EffectKind::Gate => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Reverb => "reverb",
            EffectKind::Delay => "delay",
            EffectKind::Filter => "filter",
            EffectKind::Gate => "gate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Toggle and intensity for one effect kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxSlot {
    pub enabled: bool,
    /// Wet amount, 0.0-1.0
    pub wet: f32,
}

impl Default for FxSlot {
    fn default() -> Self {
        Self {
            enabled: false,
            wet: DEFAULT_WET,
        }
    }
}

/// Default wet amount restored on reset
pub const DEFAULT_WET: f32 = 0.5;

/// Per-deck effect toggles (settings shape: four booleans)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxFlags {
    pub reverb: bool,
    pub delay: bool,
    pub filter: bool,
    pub gate: bool,
}

/// Per-deck wet amounts (settings shape: four floats in [0,1])
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxWet {
    pub reverb: f32,
    pub delay: f32,
    pub filter: f32,
    pub gate: f32,
}

impl Default for FxWet {
    fn default() -> Self {
        Self {
            reverb: DEFAULT_WET,
            delay: DEFAULT_WET,
            filter: DEFAULT_WET,
            gate: DEFAULT_WET,
        }
    }
}

/// Effect toggles and wet amounts for one deck
///
/// Lives for the whole session; [`reset`](Self::reset) restores defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FxState {
    slots: [FxSlot; 4],
}

impl FxState {
    /// Build from the persisted settings halves
    pub fn from_parts(flags: FxFlags, wet: FxWet) -> Self {
        let mut state = Self::default();
        state.set_enabled(EffectKind::Reverb, flags.reverb);
        state.set_enabled(EffectKind::Delay, flags.delay);
        state.set_enabled(EffectKind::Filter, flags.filter);
        state.set_enabled(EffectKind::Gate, flags.gate);
        state.set_wet(EffectKind::Reverb, wet.reverb);
        state.set_wet(EffectKind::Delay, wet.delay);
        state.set_wet(EffectKind::Filter, wet.filter);
        state.set_wet(EffectKind::Gate, wet.gate);
        state
    }

    pub fn slot(&self, kind: EffectKind) -> FxSlot {
        self.slots[kind.slot()]
    }

    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.slots[kind.slot()].enabled
    }

    pub fn wet(&self, kind: EffectKind) -> f32 {
        self.slots[kind.slot()].wet
    }

    pub fn set_enabled(&mut self, kind: EffectKind, enabled: bool) {
        self.slots[kind.slot()].enabled = enabled;
    }

    /// Flip a toggle, returning the new state
    pub fn toggle(&mut self, kind: EffectKind) -> bool {
        let slot = &mut self.slots[kind.slot()];
        slot.enabled = !slot.enabled;
        slot.enabled
    }

    /// Set a wet amount, clamped to 0.0-1.0 (NaN is ignored)
    pub fn set_wet(&mut self, kind: EffectKind, wet: f32) {
        if wet.is_nan() {
            return;
        }
        self.slots[kind.slot()].wet = wet.clamp(0.0, 1.0);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn flags(&self) -> FxFlags {
        FxFlags {
            reverb: self.is_enabled(EffectKind::Reverb),
            delay: self.is_enabled(EffectKind::Delay),
            filter: self.is_enabled(EffectKind::Filter),
            gate: self.is_enabled(EffectKind::Gate),
        }
    }

    pub fn wets(&self) -> FxWet {
        FxWet {
            reverb: self.wet(EffectKind::Reverb),
            delay: self.wet(EffectKind::Delay),
            filter: self.wet(EffectKind::Filter),
            gate: self.wet(EffectKind::Gate),
        }
    }
}

/// The three fixed EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" | "lo" => Some(EqBand::Low),
            "mid" => Some(EqBand::Mid),
            "high" | "hi" => Some(EqBand::High),
            _ => None,
        }
    }
}

/// EQ gain limit in dB (symmetric)
pub const EQ_GAIN_LIMIT_DB: f32 = 12.0;

/// Three-band EQ gains in dB, each within [-12, 12]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqGains {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl EqGains {
    pub fn get(&self, band: EqBand) -> f32 {
        match band {
            EqBand::Low => self.low,
            EqBand::Mid => self.mid,
            EqBand::High => self.high,
        }
    }

    /// Set a band gain, clamped to the EQ range (NaN is ignored)
    pub fn set(&mut self, band: EqBand, db: f32) {
        if db.is_nan() {
            return;
        }
        let db = db.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB);
        match band {
            EqBand::Low => self.low = db,
            EqBand::Mid => self.mid = db,
            EqBand::High => self.high = db,
        }
    }

    /// Copy with every band clamped into range
    pub fn clamped(self) -> Self {
        let mut out = Self::default();
        for band in EqBand::ALL {
            out.set(band, self.get(band));
        }
        out
    }
}
