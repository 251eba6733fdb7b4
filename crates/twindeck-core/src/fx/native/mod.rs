//! Native Rust stages
//!
//! One module per stage kind in the deck chain.

mod delay;
mod eq;
mod filter;
mod gate;
mod reverb;

pub use delay::{DelayEffect, MAX_DELAY_SECONDS};
pub use eq::{EqBandEffect, EQ_HIGH_FREQ, EQ_LOW_FREQ, EQ_MID_FREQ};
pub use filter::LowpassEffect;
pub use gate::GateEffect;
pub use reverb::{ImpulseResponse, ReverbEffect, IMPULSE_DECAY, IMPULSE_SECONDS};
