//! Control-layer deck state

use crate::tempo::clamp_rate;
use crate::types::DeckId;

/// Everything the control thread knows about one deck
///
/// `position` and `playing` mirror the audio thread's transport, refreshed
/// from the engine atomics on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckState {
    pub id: DeckId,
    /// Tempo estimate, `None` when unknown
    pub bpm: Option<u32>,
    /// Playback rate multiplier in [0.6, 1.5]
    pub rate: f32,
    /// Track duration in seconds (0 when nothing is loaded)
    pub duration: f64,
    /// A source is loaded and ready to play
    pub armed: bool,
    /// Transport position in seconds
    pub position: f64,
    pub playing: bool,
}

impl DeckState {
    pub fn new(id: DeckId) -> Self {
        Self {
            id,
            bpm: None,
            rate: 1.0,
            duration: 0.0,
            armed: false,
            position: 0.0,
            playing: false,
        }
    }

    /// Back to the freshly created state, keeping the identifier
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = clamp_rate(rate);
    }

    /// Remaining time in seconds at the current rate
    pub fn remaining_secs(&self) -> f64 {
        ((self.duration - self.position).max(0.0)) / self.rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_deck_is_empty() {
        let deck = DeckState::new(DeckId::B);
        assert_eq!(deck.id, DeckId::B);
        assert_eq!(deck.bpm, None);
        assert_eq!(deck.rate, 1.0);
        assert!(!deck.armed);
    }

    #[test]
    fn test_reset_keeps_id() {
        let mut deck = DeckState::new(DeckId::A);
        deck.bpm = Some(128);
        deck.duration = 200.0;
        deck.armed = true;
        deck.reset();
        assert_eq!(deck, DeckState::new(DeckId::A));
    }

    #[test]
    fn test_remaining_scales_with_rate() {
        let mut deck = DeckState::new(DeckId::A);
        deck.duration = 60.0;
        deck.position = 30.0;
        deck.set_rate(1.5);
        assert!((deck.remaining_secs() - 20.0).abs() < 1e-9);
    }
}
