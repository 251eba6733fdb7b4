//! Per-deck audio graph: realizes the control layer on the engine
//!
//! A [`DeckAudioGraph`] owns the control-side handles of one deck's stage
//! nodes. Nodes are created lazily, the first time a render context is
//! available, and from then on are only reparametrized and rewired. Every
//! call takes the render context explicitly; `None` means there is no live
//! rendering yet and the call is a retryable no-op.

use crate::engine::{ChainLayout, DeckNodes, EngineCommand, RenderContext};
use crate::fx::chain::{build_chain, Stage, MAX_STAGES};
use crate::fx::native::ImpulseResponse;
use crate::fx::{EqGains, FxState};
use crate::metering::AnalysisTap;
use crate::types::DeckId;

/// Analysis ring size in mono samples
///
/// Several visual ticks of audio at 48 kHz.
pub const ANALYSIS_RING_CAPACITY: usize = 4096;

/// Control-side view of a deck's installed nodes
pub struct DeckNodeHandles {
    analysis: AnalysisTap,
    reverb_ready: bool,
    /// Parameters last sent per stage slot
    params: [Option<Stage>; MAX_STAGES],
    /// Layout last sent to the engine
    layout: ChainLayout,
}

impl DeckNodeHandles {
    pub fn analysis_mut(&mut self) -> &mut AnalysisTap {
        &mut self.analysis
    }

    pub fn reverb_ready(&self) -> bool {
        self.reverb_ready
    }

    pub fn layout(&self) -> &ChainLayout {
        &self.layout
    }
}

/// Nodes built but not yet accepted by the engine queue
struct PendingInstall {
    nodes: Box<DeckNodes>,
    analysis: rtrb::Consumer<f32>,
}

/// Lazily created, never recreated processing graph of one deck
pub struct DeckAudioGraph {
    deck: DeckId,
    nodes: Option<DeckNodeHandles>,
    pending: Option<PendingInstall>,
}

impl DeckAudioGraph {
    pub fn new(deck: DeckId) -> Self {
        Self {
            deck,
            nodes: None,
            pending: None,
        }
    }

    pub fn deck(&self) -> DeckId {
        self.deck
    }

    pub fn has_nodes(&self) -> bool {
        self.nodes.is_some()
    }

    /// Node handles, creating and installing them on first use
    ///
    /// Returns `None` without a render context, or when the engine queue is
    /// full; both are retried on the next call. Nodes built for a rejected
    /// install are kept for the retry.
    pub fn ensure_nodes(&mut self, ctx: Option<&mut RenderContext>) -> Option<&mut DeckNodeHandles> {
        if self.nodes.is_none() {
            let ctx = ctx?;
            let PendingInstall { nodes, analysis } = match self.pending.take() {
                Some(pending) => pending,
                None => {
                    let sample_rate = ctx.sample_rate();
                    let (producer, consumer) = rtrb::RingBuffer::new(ANALYSIS_RING_CAPACITY);
                    let impulse = ImpulseResponse::generate(sample_rate);
                    log::info!(
                        "Graph: built nodes for deck {} ({} sample impulse)",
                        self.deck,
                        impulse.len()
                    );
                    PendingInstall {
                        nodes: Box::new(DeckNodes::new(sample_rate, &impulse, producer)),
                        analysis: consumer,
                    }
                }
            };
            let reverb_ready = nodes.has_reverb();

            match ctx.send(EngineCommand::InstallNodes { deck: self.deck, nodes }) {
                Ok(()) => {}
                Err(EngineCommand::InstallNodes { nodes, .. }) => {
                    log::warn!("Graph: deck {} node install deferred", self.deck);
                    self.pending = Some(PendingInstall { nodes, analysis });
                    return None;
                }
                Err(_) => return None,
            }

            log::debug!("Graph: deck {} nodes installed", self.deck);
            self.nodes = Some(DeckNodeHandles {
                analysis: AnalysisTap::new(analysis),
                reverb_ready,
                params: [None; MAX_STAGES],
                layout: ChainLayout::disconnected(),
            });
        }
        self.nodes.as_mut()
    }

    /// Recompute the deck's chain from the current control state and
    /// realize it
    ///
    /// Only parameters and wiring that differ from what the engine already
    /// has are sent, so repeated calls with unchanged state send nothing.
    /// Returns whether the engine is now up to date.
    pub fn apply_filters(
        &mut self,
        ctx: Option<&mut RenderContext>,
        fx: &FxState,
        eq: &EqGains,
    ) -> bool {
        let Some(ctx) = ctx else {
            return false;
        };
        let deck = self.deck;
        let Some(handles) = self.ensure_nodes(Some(&mut *ctx)) else {
            return false;
        };

        let stages = build_chain(fx, eq, handles.reverb_ready);
        for stage in &stages {
            let slot = stage.slot().position();
            if handles.params[slot] == Some(*stage) {
                continue;
            }
            if ctx.send(EngineCommand::SetStage { deck, stage: *stage }).is_err() {
                return false;
            }
            handles.params[slot] = Some(*stage);
        }

        let layout = ChainLayout::from_stages(&stages);
        if handles.layout != layout {
            if ctx.send(EngineCommand::SetChain { deck, layout }).is_err() {
                return false;
            }
            log::debug!("Graph: deck {} chain {:?}", deck, layout.iter().collect::<Vec<_>>());
            handles.layout = layout;
        }
        true
    }

    /// Disconnect every stage; nodes stay alive for reuse
    ///
    /// Returns whether the engine is now disconnected. A deck that never
    /// had nodes installed counts as disconnected.
    pub fn disconnect(&mut self, ctx: Option<&mut RenderContext>) -> bool {
        let Some(ctx) = ctx else {
            return false;
        };
        let Some(handles) = self.nodes.as_mut() else {
            return true;
        };
        if !handles.layout.is_connected() {
            return true;
        }
        if ctx
            .send(EngineCommand::DisconnectChain { deck: self.deck })
            .is_err()
        {
            return false;
        }
        handles.layout = ChainLayout::disconnected();
        handles.analysis.clear();
        log::debug!("Graph: deck {} disconnected", self.deck);
        true
    }

    pub fn layout(&self) -> Option<&ChainLayout> {
        self.nodes.as_ref().map(|n| &n.layout)
    }

    pub fn analysis(&self) -> Option<&AnalysisTap> {
        self.nodes.as_ref().map(|n| &n.analysis)
    }

    pub fn analysis_mut(&mut self) -> Option<&mut AnalysisTap> {
        self.nodes.as_mut().map(|n| &mut n.analysis)
    }
}
