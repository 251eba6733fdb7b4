//! Logical action → MIDI code table

use serde::{Deserialize, Serialize};
use std::fmt;

use twindeck_core::control::ControlAction;
use twindeck_core::fx::EffectKind;
use twindeck_core::DeckId;

use crate::normalize::MIDI_MAX;

/// Which MIDI message type an action listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Note-on with non-zero velocity
    Note,
    /// Control change
    ControlChange,
}

/// The thirteen mappable logical actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiAction {
    PlayPause(DeckId),
    Crossfader,
    Master,
    ToggleEffect(DeckId, EffectKind),
    ToggleRecording,
}

impl MidiAction {
    /// Every action, in dispatch order
    pub const ALL: [MidiAction; 13] = [
        MidiAction::PlayPause(DeckId::A),
        MidiAction::PlayPause(DeckId::B),
        MidiAction::Crossfader,
        MidiAction::Master,
        MidiAction::ToggleEffect(DeckId::A, EffectKind::Reverb),
        MidiAction::ToggleEffect(DeckId::A, EffectKind::Delay),
        MidiAction::ToggleEffect(DeckId::A, EffectKind::Filter),
        MidiAction::ToggleEffect(DeckId::A, EffectKind::Gate),
        MidiAction::ToggleEffect(DeckId::B, EffectKind::Reverb),
        MidiAction::ToggleEffect(DeckId::B, EffectKind::Delay),
        MidiAction::ToggleEffect(DeckId::B, EffectKind::Filter),
        MidiAction::ToggleEffect(DeckId::B, EffectKind::Gate),
        MidiAction::ToggleRecording,
    ];

    pub fn kind(self) -> MessageKind {
        match self {
            MidiAction::Crossfader | MidiAction::Master => MessageKind::ControlChange,
            _ => MessageKind::Note,
        }
    }

    /// Settings key of this action
    pub fn name(self) -> &'static str {
        use DeckId::{A, B};
        use EffectKind::{Delay, Filter, Gate, Reverb};
        match self {
            MidiAction::PlayPause(A) => "playA",
            MidiAction::PlayPause(B) => "playB",
            MidiAction::Crossfader => "crossfader",
            MidiAction::Master => "master",
            MidiAction::ToggleEffect(A, Reverb) => "fxAReverb",
            MidiAction::ToggleEffect(A, Delay) => "fxADelay",
            MidiAction::ToggleEffect(A, Filter) => "fxAFilter",
            MidiAction::ToggleEffect(A, Gate) => "fxAGate",
            MidiAction::ToggleEffect(B, Reverb) => "fxBReverb",
            MidiAction::ToggleEffect(B, Delay) => "fxBDelay",
            MidiAction::ToggleEffect(B, Filter) => "fxBFilter",
            MidiAction::ToggleEffect(B, Gate) => "fxBGate",
            MidiAction::ToggleRecording => "record",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The console action this MIDI action triggers
    pub fn control_action(self) -> ControlAction {
        match self {
            MidiAction::PlayPause(deck) => ControlAction::PlayPauseDeck(deck),
            MidiAction::Crossfader => ControlAction::SetCrossfader,
            MidiAction::Master => ControlAction::SetMaster,
            MidiAction::ToggleEffect(deck, kind) => ControlAction::ToggleEffect { deck, kind },
            MidiAction::ToggleRecording => ControlAction::ToggleRecording,
        }
    }
}

impl fmt::Display for MidiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Note or CC number per logical action (settings shape: 13 integers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MidiMap {
    pub play_a: u8,
    pub play_b: u8,
    pub crossfader: u8,
    pub master: u8,
    pub fx_a_reverb: u8,
    pub fx_a_delay: u8,
    pub fx_a_filter: u8,
    pub fx_a_gate: u8,
    pub fx_b_reverb: u8,
    pub fx_b_delay: u8,
    pub fx_b_filter: u8,
    pub fx_b_gate: u8,
    pub record: u8,
}

impl Default for MidiMap {
    fn default() -> Self {
        Self {
            play_a: 11,
            play_b: 12,
            crossfader: 8,
            master: 7,
            fx_a_reverb: 20,
            fx_a_delay: 21,
            fx_a_filter: 22,
            fx_a_gate: 23,
            fx_b_reverb: 24,
            fx_b_delay: 25,
            fx_b_filter: 26,
            fx_b_gate: 27,
            record: 30,
        }
    }
}

impl MidiMap {
    fn field_mut(&mut self, action: MidiAction) -> &mut u8 {
        use DeckId::{A, B};
        use EffectKind::{Delay, Filter, Gate, Reverb};
        match action {
            MidiAction::PlayPause(A) => &mut self.play_a,
            MidiAction::PlayPause(B) => &mut self.play_b,
            MidiAction::Crossfader => &mut self.crossfader,
            MidiAction::Master => &mut self.master,
            MidiAction::ToggleEffect(A, Reverb) => &mut self.fx_a_reverb,
            MidiAction::ToggleEffect(A, Delay) => &mut self.fx_a_delay,
            MidiAction::ToggleEffect(A, Filter) => &mut self.fx_a_filter,
            MidiAction::ToggleEffect(A, Gate) => &mut self.fx_a_gate,
            MidiAction::ToggleEffect(B, Reverb) => &mut self.fx_b_reverb,
            MidiAction::ToggleEffect(B, Delay) => &mut self.fx_b_delay,
            MidiAction::ToggleEffect(B, Filter) => &mut self.fx_b_filter,
            MidiAction::ToggleEffect(B, Gate) => &mut self.fx_b_gate,
            MidiAction::ToggleRecording => &mut self.record,
        }
    }

    pub fn code(&self, action: MidiAction) -> u8 {
        use DeckId::{A, B};
        use EffectKind::{Delay, Filter, Gate, Reverb};
        match action {
            MidiAction::PlayPause(A) => self.play_a,
            MidiAction::PlayPause(B) => self.play_b,
            MidiAction::Crossfader => self.crossfader,
            MidiAction::Master => self.master,
            MidiAction::ToggleEffect(A, Reverb) => self.fx_a_reverb,
            MidiAction::ToggleEffect(A, Delay) => self.fx_a_delay,
            MidiAction::ToggleEffect(A, Filter) => self.fx_a_filter,
            MidiAction::ToggleEffect(A, Gate) => self.fx_a_gate,
            MidiAction::ToggleEffect(B, Reverb) => self.fx_b_reverb,
            MidiAction::ToggleEffect(B, Delay) => self.fx_b_delay,
            MidiAction::ToggleEffect(B, Filter) => self.fx_b_filter,
            MidiAction::ToggleEffect(B, Gate) => self.fx_b_gate,
            MidiAction::ToggleRecording => self.record,
        }
    }

    pub fn set_code(&mut self, action: MidiAction, code: u8) {
        *self.field_mut(action) = code;
    }

    /// First action of `kind` mapped to `code`, in [`MidiAction::ALL`] order
    pub fn lookup(&self, kind: MessageKind, code: u8) -> Option<MidiAction> {
        MidiAction::ALL
            .into_iter()
            .find(|action| action.kind() == kind && self.code(*action) == code)
    }

    /// Pairs of same-kind actions sharing a code
    pub fn conflicts(&self) -> Vec<(MidiAction, MidiAction, u8)> {
        let mut conflicts = Vec::new();
        for (i, first) in MidiAction::ALL.iter().enumerate() {
            for second in &MidiAction::ALL[i + 1..] {
                let code = self.code(*first);
                if first.kind() == second.kind() && code == self.code(*second) {
                    conflicts.push((*first, *second, code));
                }
            }
        }
        conflicts
    }

    /// Actions whose code is not a valid 7-bit value
    pub fn out_of_range(&self) -> Vec<(MidiAction, u8)> {
        MidiAction::ALL
            .into_iter()
            .map(|action| (action, self.code(action)))
            .filter(|(_, code)| *code > MIDI_MAX)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_codes() {
        let map = MidiMap::default();
        assert_eq!(map.code(MidiAction::PlayPause(DeckId::A)), 11);
        assert_eq!(map.code(MidiAction::Crossfader), 8);
        assert_eq!(
            map.code(MidiAction::ToggleEffect(DeckId::B, EffectKind::Gate)),
            27
        );
        assert!(map.conflicts().is_empty());
        assert!(map.out_of_range().is_empty());
    }

    #[test]
    fn test_names_round_trip() {
        for action in MidiAction::ALL {
            assert_eq!(MidiAction::from_name(action.name()), Some(action));
        }
        assert_eq!(
            MidiAction::from_name("FXAGATE"),
            Some(MidiAction::ToggleEffect(DeckId::A, EffectKind::Gate))
        );
        assert_eq!(MidiAction::from_name("pitch"), None);
    }

    #[test]
    fn test_lookup_respects_kind() {
        let mut map = MidiMap::default();
        // Note 8 and CC 8 are different controls
        map.set_code(MidiAction::ToggleRecording, 8);
        assert_eq!(map.lookup(MessageKind::Note, 8), Some(MidiAction::ToggleRecording));
        assert_eq!(map.lookup(MessageKind::ControlChange, 8), Some(MidiAction::Crossfader));
        assert!(map.conflicts().is_empty());
    }

    #[test]
    fn test_conflicts_reported() {
        let mut map = MidiMap::default();
        map.set_code(MidiAction::PlayPause(DeckId::B), 11);
        let conflicts = map.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].2, 11);
        // First in dispatch order wins
        assert_eq!(
            map.lookup(MessageKind::Note, 11),
            Some(MidiAction::PlayPause(DeckId::A))
        );
    }

    #[test]
    fn test_settings_keys() {
        let yaml = serde_yaml::to_string(&MidiMap::default()).unwrap();
        assert!(yaml.contains("playA: 11"));
        assert!(yaml.contains("fxBReverb: 24"));

        let partial: MidiMap = serde_yaml::from_str("record: 99").unwrap();
        assert_eq!(partial.record, 99);
        assert_eq!(partial.play_b, 12);
    }
}
