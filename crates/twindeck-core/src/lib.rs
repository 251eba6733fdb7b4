//! Twindeck Core - audio graph, effects and control-domain services
//!
//! Two layers live here:
//! - **Control layer**: [`fx::FxState`], [`deck::DeckState`], tempo, metering
//!   and recording state, mutated from a single control thread.
//! - **Realization layer**: [`graph::DeckAudioGraph`] turns the control state
//!   into stage chains on the real-time [`engine::MixEngine`] through the
//!   injected [`engine::RenderContext`].

pub mod audio;
pub mod config;
pub mod control;
pub mod deck;
pub mod engine;
pub mod fx;
pub mod graph;
pub mod metering;
pub mod recording;
pub mod source;
pub mod tempo;
pub mod timestretch;
pub mod types;

pub use types::*;
