//! Lock-free command queue from the control thread to the audio thread
//!
//! The control thread pushes [`EngineCommand`]s into an `rtrb` SPSC ring; the
//! engine pops them at the start of every audio block. Pushing never blocks:
//! a full queue hands the command back so the caller can retry on a later
//! control tick.

use basedrop::Shared;

use super::nodes::{ChainLayout, DeckNodes};
use crate::fx::chain::Stage;
use crate::source::PcmBuffer;
use crate::types::{DeckId, NUM_DECKS};

/// Capacity of the command ring
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Commands sent from the control thread to the audio thread
pub enum EngineCommand {
    // Transport
    /// Replace the deck's source; playback stops and rewinds
    LoadSource { deck: DeckId, source: Shared<PcmBuffer> },
    UnloadSource { deck: DeckId },
    Play { deck: DeckId },
    Pause { deck: DeckId },
    Seek { deck: DeckId, seconds: f64 },
    /// Pitch-preserving rate, clamped by the engine to [0.6, 1.5]
    SetPlaybackRate { deck: DeckId, rate: f32 },

    // Stage graph
    /// Hand a deck its stage set; sent once per deck
    ///
    /// Boxed to keep the command small in the ring.
    InstallNodes { deck: DeckId, nodes: Box<DeckNodes> },
    /// Reparametrize one stage in place
    SetStage { deck: DeckId, stage: Stage },
    /// Rewire the deck's chain
    SetChain { deck: DeckId, layout: ChainLayout },
    /// Disconnect every stage; the deck goes silent
    DisconnectChain { deck: DeckId },

    // Mix bus
    /// Crossfader and master folded into per-deck gains
    SetDeckGains { gains: [f32; NUM_DECKS] },
    /// Start copying the master bus into the capture ring
    AttachCapture,
    DetachCapture,
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::LoadSource { deck, source } => {
                write!(f, "LoadSource({}, {} frames)", deck, source.len())
            }
            EngineCommand::UnloadSource { deck } => write!(f, "UnloadSource({})", deck),
            EngineCommand::Play { deck } => write!(f, "Play({})", deck),
            EngineCommand::Pause { deck } => write!(f, "Pause({})", deck),
            EngineCommand::Seek { deck, seconds } => write!(f, "Seek({}, {:.3}s)", deck, seconds),
            EngineCommand::SetPlaybackRate { deck, rate } => {
                write!(f, "SetPlaybackRate({}, {:.3})", deck, rate)
            }
            EngineCommand::InstallNodes { deck, .. } => write!(f, "InstallNodes({})", deck),
            EngineCommand::SetStage { deck, stage } => write!(f, "SetStage({}, {:?})", deck, stage),
            EngineCommand::SetChain { deck, layout } => {
                write!(f, "SetChain({}, {:?})", deck, layout.iter().collect::<Vec<_>>())
            }
            EngineCommand::DisconnectChain { deck } => write!(f, "DisconnectChain({})", deck),
            EngineCommand::SetDeckGains { gains } => write!(f, "SetDeckGains({:?})", gains),
            EngineCommand::AttachCapture => write!(f, "AttachCapture"),
            EngineCommand::DetachCapture => write!(f, "DetachCapture"),
        }
    }
}

/// Create the command ring
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
