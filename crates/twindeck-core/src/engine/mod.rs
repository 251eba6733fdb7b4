//! Real-time engine: the realization layer
//!
//! - [`RenderContext`]: control-thread handle, injected wherever the audio
//!   graph is touched
//! - [`MixEngine`]: runs inside the audio callback
//! - [`EngineCommand`]: the lock-free messages between them

mod command;
mod context;
mod deck;
mod engine;
mod gc;
mod mixer;
mod nodes;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use context::{RenderContext, CAPTURE_SECONDS};
pub use deck::{DeckAtomics, DeckPlayer};
pub use engine::{MixEngine, MAX_BUFFER_SIZE};
pub use gc::gc_handle;
pub use mixer::{crossfader_gains, DEFAULT_CROSSFADER, DEFAULT_MASTER};
pub use nodes::{ChainLayout, DeckNodes};
