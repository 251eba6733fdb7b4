//! Control events shared by every input surface
//!
//! UI text commands and MIDI both resolve to a [`ControlEvent`]; the console
//! routes it to one handler regardless of where it came from.

use crate::fx::EffectKind;
use crate::types::DeckId;

/// Where a control event originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSource {
    Ui,
    Midi,
}

/// What a control event asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    PlayPauseDeck(DeckId),
    ToggleEffect { deck: DeckId, kind: EffectKind },
    SetWet { deck: DeckId, kind: EffectKind },
    /// Value in 0-100
    SetCrossfader,
    /// Value in 0-100
    SetMaster,
    ToggleRecording,
    TapTempo(DeckId),
    SyncTempo(DeckId),
    SetPlaybackRate(DeckId),
}

/// A resolved control event
///
/// `value` carries the continuous amount for setters and is ignored by toggles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlEvent {
    pub source: ControlSource,
    pub action: ControlAction,
    pub value: f32,
}

impl ControlEvent {
    pub fn new(source: ControlSource, action: ControlAction, value: f32) -> Self {
        Self { source, action, value }
    }

    /// Event with no continuous value (toggles, taps)
    pub fn trigger(source: ControlSource, action: ControlAction) -> Self {
        Self::new(source, action, 0.0)
    }
}
