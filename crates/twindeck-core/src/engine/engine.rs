//! Mix engine - the audio-thread side of the console
//!
//! Per block: drain commands, render each deck's source, run its connected
//! stage chain (which also feeds the deck's analysis tap), apply the
//! crossfader gains, sum to the master bus and copy the bus into the capture
//! ring while recording.

use std::sync::Arc;

use super::command::EngineCommand;
use super::deck::{DeckAtomics, DeckPlayer};
use super::mixer::{crossfader_gains, DEFAULT_CROSSFADER, DEFAULT_MASTER};
use super::nodes::DeckNodes;
use crate::types::{DeckId, StereoBuffer, StereoSample, NUM_DECKS};

/// Largest block processed in one pass; larger callbacks are split
pub const MAX_BUFFER_SIZE: usize = 8192;

/// The real-time engine
///
/// Owned by the audio callback. Everything it needs is allocated up front;
/// `process` does not allocate.
pub struct MixEngine {
    sample_rate: u32,
    commands: rtrb::Consumer<EngineCommand>,
    decks: [DeckPlayer; NUM_DECKS],
    nodes: [Option<Box<DeckNodes>>; NUM_DECKS],
    deck_buffers: [StereoBuffer; NUM_DECKS],
    gains: [f32; NUM_DECKS],
    capture: rtrb::Producer<StereoSample>,
    capturing: bool,
}

impl MixEngine {
    pub(crate) fn new(
        sample_rate: u32,
        commands: rtrb::Consumer<EngineCommand>,
        atomics: &[Arc<DeckAtomics>; NUM_DECKS],
        capture: rtrb::Producer<StereoSample>,
    ) -> Self {
        Self {
            sample_rate,
            commands,
            decks: std::array::from_fn(|i| DeckPlayer::new(sample_rate, atomics[i].clone())),
            nodes: [None, None],
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            gains: crossfader_gains(DEFAULT_CROSSFADER as f32, DEFAULT_MASTER as f32),
            capture,
            capturing: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Apply every pending command
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadSource { deck, source } => self.decks[deck.index()].load(source),
            EngineCommand::UnloadSource { deck } => self.decks[deck.index()].unload(),
            EngineCommand::Play { deck } => self.decks[deck.index()].play(),
            EngineCommand::Pause { deck } => self.decks[deck.index()].pause(),
            EngineCommand::Seek { deck, seconds } => self.decks[deck.index()].seek(seconds),
            EngineCommand::SetPlaybackRate { deck, rate } => {
                self.decks[deck.index()].set_rate(rate)
            }
            EngineCommand::InstallNodes { deck, nodes } => {
                let slot = &mut self.nodes[deck.index()];
                if slot.is_none() {
                    *slot = Some(nodes);
                }
            }
            EngineCommand::SetStage { deck, stage } => {
                if let Some(nodes) = self.nodes[deck.index()].as_mut() {
                    nodes.set_stage(&stage);
                }
            }
            EngineCommand::SetChain { deck, layout } => {
                if let Some(nodes) = self.nodes[deck.index()].as_mut() {
                    nodes.set_layout(layout);
                }
            }
            EngineCommand::DisconnectChain { deck } => {
                if let Some(nodes) = self.nodes[deck.index()].as_mut() {
                    nodes.set_layout(Default::default());
                }
            }
            EngineCommand::SetDeckGains { gains } => self.gains = gains,
            EngineCommand::AttachCapture => self.capturing = true,
            EngineCommand::DetachCapture => self.capturing = false,
        }
    }

    /// Render one block into `master`, overwriting it
    pub fn process(&mut self, master: &mut StereoBuffer) {
        self.process_commands();

        let total = master.len();
        let mut offset = 0;
        while offset < total {
            let len = (total - offset).min(MAX_BUFFER_SIZE);
            let out = &mut master.as_mut_slice()[offset..offset + len];
            out.fill(StereoSample::silence());

            for i in 0..NUM_DECKS {
                let buffer = &mut self.deck_buffers[i];
                buffer.set_len_from_capacity(len);
                self.decks[i].render(buffer);

                // Decks without nodes play dry
                if let Some(nodes) = self.nodes[i].as_mut() {
                    nodes.process(buffer);
                }

                let gain = self.gains[i];
                for (dst, src) in out.iter_mut().zip(buffer.iter()) {
                    *dst += *src * gain;
                }
            }

            if self.capturing {
                for sample in out.iter() {
                    if self.capture.push(*sample).is_err() {
                        break;
                    }
                }
            }

            offset += len;
        }
    }

    /// Chain layout currently realized for a deck, if its nodes are installed
    pub fn chain_layout(&self, deck: DeckId) -> Option<super::ChainLayout> {
        self.nodes[deck.index()].as_ref().map(|n| *n.layout())
    }

    pub fn has_nodes(&self, deck: DeckId) -> bool {
        self.nodes[deck.index()].is_some()
    }

    pub fn deck_gains(&self) -> [f32; NUM_DECKS] {
        self.gains
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn deck_rate(&self, deck: DeckId) -> f32 {
        self.decks[deck.index()].rate()
    }
}
