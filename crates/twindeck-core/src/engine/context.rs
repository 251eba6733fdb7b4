//! Control-side handle to the rendering engine
//!
//! A [`RenderContext`] and its [`MixEngine`] are created together, once, at
//! startup. The engine goes to the audio backend; the context stays on the
//! control thread and is passed explicitly to whatever needs to talk to the
//! audio graph. Code that receives `None` instead of a context has no live
//! rendering and degrades to a no-op.

use std::sync::Arc;

use basedrop::{Handle, Shared};

use super::command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
use super::deck::DeckAtomics;
use super::engine::MixEngine;
use super::gc::gc_handle;
use crate::types::{DeckId, StereoSample, NUM_DECKS};

/// Seconds of master audio the capture ring holds between drains
pub const CAPTURE_SECONDS: u32 = 2;

/// Control-thread side of the engine
pub struct RenderContext {
    sample_rate: u32,
    commands: rtrb::Producer<EngineCommand>,
    atomics: [Arc<DeckAtomics>; NUM_DECKS],
    capture: rtrb::Consumer<StereoSample>,
    gc: Handle,
}

impl RenderContext {
    /// Create the context and the engine it drives
    pub fn new(sample_rate: u32) -> (Self, MixEngine) {
        let sample_rate = sample_rate.max(1);
        let (cmd_tx, cmd_rx) = command_channel();
        let (capture_tx, capture_rx) =
            rtrb::RingBuffer::new((sample_rate * CAPTURE_SECONDS) as usize);
        let atomics: [Arc<DeckAtomics>; NUM_DECKS] =
            std::array::from_fn(|_| Arc::new(DeckAtomics::new()));

        let engine = MixEngine::new(sample_rate, cmd_rx, &atomics, capture_tx);
        let context = Self {
            sample_rate,
            commands: cmd_tx,
            atomics,
            capture: capture_rx,
            gc: gc_handle(),
        };

        log::info!("Render context created at {} Hz", sample_rate);
        (context, engine)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Queue a command for the audio thread
    ///
    /// A full queue hands the command back; callers treat that as a no-op to
    /// retry later.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.commands.push(cmd).map_err(|rtrb::PushError::Full(cmd)| {
            log::warn!("Engine command queue full, dropped {:?}", cmd);
            cmd
        })
    }

    /// Commands queued but not yet applied by the engine
    pub fn pending_commands(&self) -> usize {
        COMMAND_QUEUE_CAPACITY - self.commands.slots()
    }

    pub fn deck_atomics(&self, deck: DeckId) -> &DeckAtomics {
        &self.atomics[deck.index()]
    }

    /// Wrap a value for sharing with the audio thread
    pub fn share<T: Send + 'static>(&self, value: T) -> Shared<T> {
        Shared::new(&self.gc, value)
    }

    /// Move captured master frames into `out` as interleaved stereo
    ///
    /// Returns the number of frames moved.
    pub fn drain_capture(&mut self, out: &mut Vec<f32>) -> usize {
        let available = self.capture.slots();
        if available == 0 {
            return 0;
        }
        match self.capture.read_chunk(available) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                out.reserve(available * 2);
                for sample in first.iter().chain(second.iter()) {
                    out.push(sample.left);
                    out.push(sample.right);
                }
                chunk.commit_all();
                available
            }
            Err(_) => 0,
        }
    }

    /// Throw away anything left in the capture ring
    pub fn clear_capture(&mut self) {
        let available = self.capture.slots();
        if let Ok(chunk) = self.capture.read_chunk(available) {
            chunk.commit_all();
        }
    }
}
