//! Per-deck processing stages on the audio thread
//!
//! A deck's [`DeckNodes`] are built once on the control thread, moved to the
//! engine with `InstallNodes` and from then on only reparametrized
//! (`SetStage`) or rewired (`SetChain`). Stages left out of the current chain
//! keep their parameters; a stage joining the chain starts from cleared state.

use crate::fx::chain::{Stage, StageSlot, MAX_STAGES};
use crate::fx::native::{
    DelayEffect, EqBandEffect, GateEffect, ImpulseResponse, LowpassEffect, ReverbEffect,
};
use crate::fx::{Effect, EqBand};
use crate::types::StereoBuffer;

/// Ordered set of connected stage slots
///
/// Fixed-size and `Copy` so it can travel through the command queue without
/// allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLayout {
    slots: [Option<StageSlot>; MAX_STAGES],
    len: usize,
    connected: bool,
}

impl Default for ChainLayout {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl ChainLayout {
    /// No stages, deck output muted
    pub fn disconnected() -> Self {
        Self {
            slots: [None; MAX_STAGES],
            len: 0,
            connected: false,
        }
    }

    /// Connected layout for a built chain, in chain order
    pub fn from_stages(stages: &[Stage]) -> Self {
        let mut layout = Self {
            slots: [None; MAX_STAGES],
            len: 0,
            connected: true,
        };
        for stage in stages.iter().take(MAX_STAGES) {
            layout.slots[layout.len] = Some(stage.slot());
            layout.len += 1;
        }
        layout
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, slot: StageSlot) -> bool {
        self.iter().any(|s| s == slot)
    }

    /// Connected slots in processing order
    pub fn iter(&self) -> impl Iterator<Item = StageSlot> + '_ {
        self.slots[..self.len].iter().flatten().copied()
    }
}

/// All stages of one deck plus its analysis tap producer
pub struct DeckNodes {
    gate: GateEffect,
    eq_low: EqBandEffect,
    eq_mid: EqBandEffect,
    eq_high: EqBandEffect,
    filter: LowpassEffect,
    delay: DelayEffect,
    /// `None` when the impulse could not be prepared
    reverb: Option<ReverbEffect>,
    analysis: rtrb::Producer<f32>,
    layout: ChainLayout,
}

impl DeckNodes {
    pub fn new(sample_rate: u32, impulse: &ImpulseResponse, analysis: rtrb::Producer<f32>) -> Self {
        let reverb = match ReverbEffect::new(impulse) {
            Ok(reverb) => Some(reverb),
            Err(e) => {
                log::error!("Graph: reverb unavailable, impulse FFT failed: {:?}", e);
                None
            }
        };
        Self {
            gate: GateEffect::new(sample_rate),
            eq_low: EqBandEffect::new(EqBand::Low, sample_rate),
            eq_mid: EqBandEffect::new(EqBand::Mid, sample_rate),
            eq_high: EqBandEffect::new(EqBand::High, sample_rate),
            filter: LowpassEffect::new(sample_rate),
            delay: DelayEffect::new(sample_rate),
            reverb,
            analysis,
            layout: ChainLayout::disconnected(),
        }
    }

    pub fn layout(&self) -> &ChainLayout {
        &self.layout
    }

    pub fn has_reverb(&self) -> bool {
        self.reverb.is_some()
    }

    /// Rewire the chain
    ///
    /// Stages that were not connected before are reset so a stale delay or
    /// reverb tail does not replay.
    pub fn set_layout(&mut self, layout: ChainLayout) {
        let previous = self.layout;
        for slot in layout.iter() {
            if !previous.contains(slot) {
                if let Some(stage) = self.stage_mut(slot) {
                    stage.reset();
                }
            }
        }
        self.layout = layout;
    }

    /// Apply a stage's parameters in place
    pub fn set_stage(&mut self, stage: &Stage) {
        match *stage {
            Stage::Gate { threshold_db } => self.gate.set_threshold_db(threshold_db),
            Stage::Eq { band, gain_db } => self.eq_band_mut(band).set_gain_db(gain_db),
            Stage::Filter { cutoff_hz } => self.filter.set_cutoff_hz(cutoff_hz),
            Stage::Delay { time_s, feedback } => {
                self.delay.set_time_secs(time_s);
                self.delay.set_feedback(feedback);
            }
            Stage::Reverb => {}
        }
    }

    fn eq_band_mut(&mut self, band: EqBand) -> &mut EqBandEffect {
        match band {
            EqBand::Low => &mut self.eq_low,
            EqBand::Mid => &mut self.eq_mid,
            EqBand::High => &mut self.eq_high,
        }
    }

    fn stage_mut(&mut self, slot: StageSlot) -> Option<&mut dyn Effect> {
        match slot {
            StageSlot::Gate => Some(&mut self.gate),
            StageSlot::Eq(band) => Some(self.eq_band_mut(band)),
            StageSlot::Filter => Some(&mut self.filter),
            StageSlot::Delay => Some(&mut self.delay),
            StageSlot::Reverb => self.reverb.as_mut().map(|r| r as &mut dyn Effect),
        }
    }

    /// Run the connected chain over a deck buffer and feed the analysis tap
    ///
    /// A disconnected deck is silenced. Analysis samples that do not fit in
    /// the tap ring are dropped.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.layout.connected {
            buffer.fill_silence();
            return;
        }

        let layout = self.layout;
        for slot in layout.iter() {
            if let Some(stage) = self.stage_mut(slot) {
                stage.process(buffer);
            }
        }

        for sample in buffer.iter() {
            if self.analysis.push(sample.to_mono()).is_err() {
                break;
            }
        }
    }
}
