//! MIDI input handling
//!
//! The midir callback runs on the driver thread. It only parses the raw bytes
//! and pushes the event into a bounded flume channel; mapping to console
//! actions happens later, on the control tick, in delivery order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flume::{Sender, TrySendError};
use midir::MidiInputConnection;

use crate::connection::{find_input_port, MidiConnectionError};

/// Capacity of the input channel
pub const INPUT_QUEUE_CAPACITY: usize = 256;

/// Channel-voice message relevant to the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiInputEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note-off, or note-on with velocity 0
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiInputEvent {
    /// Parse a raw message
    ///
    /// Messages shorter than three bytes and anything other than note and
    /// control-change messages yield `None`. Bytes past the third are ignored.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let &[status, data1, data2, ..] = data else {
            return None;
        };
        let channel = status & 0x0F;

        match status & 0xF0 {
            0x80 => Some(Self::NoteOff { channel, note: data1 }),
            0x90 if data2 == 0 => Some(Self::NoteOff { channel, note: data1 }),
            0x90 => Some(Self::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            0xB0 => Some(Self::ControlChange {
                channel,
                cc: data1,
                value: data2,
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. } => *channel,
        }
    }
}

/// Callback data passed to midir
struct CallbackData {
    event_tx: Sender<MidiInputEvent>,
    dropped: Arc<AtomicU64>,
}

/// Owns the midir connection for one input port
pub struct MidiInputHandler {
    _connection: MidiInputConnection<CallbackData>,
    port_name: String,
    dropped: Arc<AtomicU64>,
}

impl MidiInputHandler {
    /// Connect to the first input port matching `port_match`, or the first
    /// port at all when `None`
    pub fn connect(
        port_match: Option<&str>,
        event_tx: Sender<MidiInputEvent>,
    ) -> Result<Self, MidiConnectionError> {
        let (midi_in, port, port_name) = find_input_port(port_match)?;
        let dropped = Arc::new(AtomicU64::new(0));

        let callback_data = CallbackData {
            event_tx,
            dropped: dropped.clone(),
        };

        let connection = midi_in
            .connect(&port, "twindeck-midi-input", Self::midi_callback, callback_data)
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Input handler connected to {}", port_name);

        Ok(Self {
            _connection: connection,
            port_name,
            dropped,
        })
    }

    /// Called from the MIDI driver thread for every inbound message
    fn midi_callback(_timestamp: u64, data: &[u8], callback_data: &mut CallbackData) {
        let Some(event) = MidiInputEvent::parse(data) else {
            return;
        };
        match callback_data.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                callback_data.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Events dropped because the control tick fell behind
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
