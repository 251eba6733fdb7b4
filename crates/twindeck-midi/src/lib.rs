//! MIDI controller support for the twindeck mixing console
//!
//! This crate provides:
//! - MIDI port discovery and input via midir
//! - The logical action → code table ([`MidiMap`]) and its presets
//!   ([`MappingStore`])
//! - [`MidiDispatcher`], resolving raw messages to console control events
//!
//! # Architecture
//!
//! ```text
//! MIDI device → midir callback → flume (bounded) → control tick → MidiDispatcher → MixConsole
//! ```
//!
//! The callback only parses and enqueues. The control tick drains the queue
//! in delivery order, so mapping and handling always run on the control
//! thread.

mod connection;
mod dispatch;
mod input;
mod map;
mod normalize;
mod store;

pub use connection::{find_input_port, list_input_ports, MidiConnectionError};
pub use dispatch::MidiDispatcher;
pub use input::{MidiInputEvent, MidiInputHandler, INPUT_QUEUE_CAPACITY};
pub use map::{MessageKind, MidiAction, MidiMap};
pub use normalize::{cc_to_percent, MIDI_MAX};
pub use store::{validate, MappingError, MappingStore, DEFAULT_PRESET, PAD_GRID_PRESET};

use flume::{Receiver, Sender};

/// Availability of MIDI input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiStatus {
    /// Connected to an input port
    Ready,
    /// The platform MIDI subsystem could not be initialized
    Unsupported,
    /// MIDI works but no usable port was found
    Offline,
}

impl MidiStatus {
    pub fn label(self) -> &'static str {
        match self {
            MidiStatus::Ready => "ready",
            MidiStatus::Unsupported => "unsupported",
            MidiStatus::Offline => "offline",
        }
    }
}

/// Error type for MIDI controller operations
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("MIDI connection error: {0}")]
    ConnectionError(#[from] MidiConnectionError),

    #[error("MIDI mapping error: {0}")]
    MappingError(#[from] MappingError),
}

/// MIDI input front: connection status plus the event queue
pub struct MidiController {
    status: MidiStatus,
    event_tx: Sender<MidiInputEvent>,
    event_rx: Receiver<MidiInputEvent>,
    input_handler: Option<MidiInputHandler>,
}

impl MidiController {
    /// Controller with no device attached
    pub fn offline() -> Self {
        let (event_tx, event_rx) = flume::bounded(INPUT_QUEUE_CAPACITY);
        Self {
            status: MidiStatus::Offline,
            event_tx,
            event_rx,
            input_handler: None,
        }
    }

    /// Connect to a port matching `port_match` (or the first port)
    ///
    /// Never fails: problems are reflected in [`status`](Self::status).
    pub fn connect(port_match: Option<&str>) -> Self {
        let mut controller = Self::offline();
        match controller.try_connect(port_match) {
            Ok(()) => {}
            Err(MidiError::ConnectionError(MidiConnectionError::InputInitError(e))) => {
                log::warn!("MIDI: unsupported on this system: {}", e);
                controller.status = MidiStatus::Unsupported;
            }
            Err(e) => {
                log::info!("MIDI: {}, running without MIDI", e);
            }
        }
        controller
    }

    fn try_connect(&mut self, port_match: Option<&str>) -> Result<(), MidiError> {
        let handler = MidiInputHandler::connect(port_match, self.event_tx.clone())?;
        self.input_handler = Some(handler);
        self.status = MidiStatus::Ready;
        Ok(())
    }

    pub fn status(&self) -> MidiStatus {
        self.status
    }

    pub fn port_name(&self) -> Option<&str> {
        self.input_handler.as_ref().map(|h| h.port_name())
    }

    /// Events lost to a full queue since connecting
    pub fn dropped_events(&self) -> u64 {
        self.input_handler
            .as_ref()
            .map(|h| h.dropped_events())
            .unwrap_or(0)
    }

    /// Sender feeding the same queue as the device callback
    ///
    /// Lets virtual surfaces inject events alongside the hardware.
    pub fn sender(&self) -> Sender<MidiInputEvent> {
        self.event_tx.clone()
    }

    /// Try to receive a pending event (non-blocking)
    pub fn try_recv(&self) -> Option<MidiInputEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Drain all pending events in delivery order
    pub fn drain(&self) -> impl Iterator<Item = MidiInputEvent> + '_ {
        std::iter::from_fn(|| self.try_recv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_controller_is_empty() {
        let midi = MidiController::offline();
        assert_eq!(midi.status(), MidiStatus::Offline);
        assert!(midi.port_name().is_none());
        assert_eq!(midi.drain().count(), 0);
    }

    #[test]
    fn test_drain_preserves_order() {
        let midi = MidiController::offline();
        let tx = midi.sender();
        for note in [3, 1, 2] {
            tx.send(MidiInputEvent::NoteOn { channel: 0, note, velocity: 1 }).unwrap();
        }
        let notes: Vec<u8> = midi
            .drain()
            .map(|e| match e {
                MidiInputEvent::NoteOn { note, .. } => note,
                _ => 0,
            })
            .collect();
        assert_eq!(notes, vec![3, 1, 2]);
    }

    #[test]
    fn test_queue_is_bounded() {
        let midi = MidiController::offline();
        let tx = midi.sender();
        for _ in 0..INPUT_QUEUE_CAPACITY {
            tx.try_send(MidiInputEvent::NoteOff { channel: 0, note: 1 }).unwrap();
        }
        assert!(tx.try_send(MidiInputEvent::NoteOff { channel: 0, note: 1 }).is_err());
    }
}
