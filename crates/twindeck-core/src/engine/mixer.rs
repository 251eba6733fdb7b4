//! Crossfader and master gain

use crate::types::NUM_DECKS;

/// Default crossfader position (centre)
pub const DEFAULT_CROSSFADER: u8 = 50;
/// Default master level
pub const DEFAULT_MASTER: u8 = 100;

/// Per-deck gains for a crossfader position and master level, both 0-100
///
/// `gainA = (1 - x/100) * m`, `gainB = (x/100) * m` with `m = master/100`.
pub fn crossfader_gains(crossfader: f32, master: f32) -> [f32; NUM_DECKS] {
    let x = crossfader.clamp(0.0, 100.0) / 100.0;
    let m = master.clamp(0.0, 100.0) / 100.0;
    [(1.0 - x) * m, x * m]
}
