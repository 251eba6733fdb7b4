//! Raw MIDI message → console control event

use twindeck_core::control::{ControlEvent, ControlSource};

use crate::input::MidiInputEvent;
use crate::map::{MessageKind, MidiMap};
use crate::normalize::cc_to_percent;

/// Resolves MIDI input against the active [`MidiMap`]
///
/// - Note-on with velocity > 0: matched against note-mapped actions, yields a
///   trigger event
/// - Control change: matched against the crossfader and master codes, value
///   scaled to 0-100
/// - Anything else is ignored
///
/// When two actions share a code, the first in [`crate::MidiAction::ALL`]
/// order wins; [`crate::MappingStore`] refuses to save such maps.
#[derive(Debug, Default)]
pub struct MidiDispatcher {
    dispatched: u64,
    ignored: u64,
}

impl MidiDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and resolve a raw `[status, data1, data2]` message
    pub fn dispatch(&mut self, data: &[u8], map: &MidiMap) -> Option<ControlEvent> {
        match MidiInputEvent::parse(data) {
            Some(event) => self.dispatch_event(event, map),
            None => {
                self.ignored += 1;
                None
            }
        }
    }

    /// Resolve an already parsed event
    pub fn dispatch_event(&mut self, event: MidiInputEvent, map: &MidiMap) -> Option<ControlEvent> {
        let resolved = match event {
            MidiInputEvent::NoteOn { note, .. } => map
                .lookup(MessageKind::Note, note)
                .map(|action| ControlEvent::trigger(ControlSource::Midi, action.control_action())),
            MidiInputEvent::ControlChange { cc, value, .. } => {
                map.lookup(MessageKind::ControlChange, cc).map(|action| {
                    ControlEvent::new(
                        ControlSource::Midi,
                        action.control_action(),
                        cc_to_percent(value),
                    )
                })
            }
            MidiInputEvent::NoteOff { .. } => None,
        };

        match resolved {
            Some(event) => {
                self.dispatched += 1;
                log::debug!("MIDI: {:?}", event.action);
            }
            None => self.ignored += 1,
        }
        resolved
    }

    /// Messages that resolved to an action
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Messages dropped as unmapped or malformed
    pub fn ignored(&self) -> u64 {
        self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MidiAction;
    use twindeck_core::control::ControlAction;
    use twindeck_core::fx::EffectKind;
    use twindeck_core::DeckId;

    fn dispatch(data: &[u8]) -> Option<ControlEvent> {
        MidiDispatcher::new().dispatch(data, &MidiMap::default())
    }

    #[test]
    fn test_note_on_triggers_mapped_action() {
        let event = dispatch(&[0x90, 12, 1]).unwrap();
        assert_eq!(event.action, ControlAction::PlayPauseDeck(DeckId::B));
        assert_eq!(event.source, ControlSource::Midi);

        let event = dispatch(&[0x9F, 22, 127]).unwrap();
        assert_eq!(
            event.action,
            ControlAction::ToggleEffect { deck: DeckId::A, kind: EffectKind::Filter }
        );
        assert_eq!(dispatch(&[0x90, 30, 64]).unwrap().action, ControlAction::ToggleRecording);
    }

    #[test]
    fn test_zero_velocity_does_nothing() {
        let mut dispatcher = MidiDispatcher::new();
        assert!(dispatcher.dispatch(&[0x90, 11, 0], &MidiMap::default()).is_none());
        assert!(dispatcher.dispatch(&[0x80, 11, 64], &MidiMap::default()).is_none());
        assert_eq!(dispatcher.ignored(), 2);
        assert_eq!(dispatcher.dispatched(), 0);
    }

    #[test]
    fn test_cc_scaled_to_percent() {
        let event = dispatch(&[0xB0, 8, 127]).unwrap();
        assert_eq!(event.action, ControlAction::SetCrossfader);
        assert_eq!(event.value, 100.0);

        let event = dispatch(&[0xB0, 7, 32]).unwrap();
        assert_eq!(event.action, ControlAction::SetMaster);
        // 32 / 127 * 100 = 25.2
        assert_eq!(event.value, 25.0);
    }

    #[test]
    fn test_note_codes_do_not_match_cc() {
        // CC 11 is play A's note number, not a CC mapping
        assert!(dispatch(&[0xB0, 11, 100]).is_none());
        // Note 8 is the crossfader's CC number
        assert!(dispatch(&[0x90, 8, 100]).is_none());
    }

    #[test]
    fn test_malformed_and_other_commands_ignored() {
        assert!(dispatch(&[0x90, 11]).is_none());
        assert!(dispatch(&[]).is_none());
        assert!(dispatch(&[0xA0, 11, 100]).is_none());
        assert!(dispatch(&[0xC0, 11, 0]).is_none());
    }

    #[test]
    fn test_exactly_one_action_per_message() {
        let mut map = MidiMap::default();
        map.set_code(MidiAction::ToggleRecording, 11);
        let mut dispatcher = MidiDispatcher::new();
        let event = dispatcher.dispatch(&[0x90, 11, 90], &map).unwrap();
        assert_eq!(event.action, ControlAction::PlayPauseDeck(DeckId::A));
        assert_eq!(dispatcher.dispatched(), 1);
    }
}
