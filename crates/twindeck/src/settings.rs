//! Session settings
//!
//! The in-memory mirror of the session store. The on-disk copy lives at
//! `~/.config/twindeck/settings.yaml`; the same shape renders to JSON for
//! external stores.
//!
//! ```yaml
//! midiMap:
//!   playA: 11
//!   playB: 12
//!   crossfader: 8
//!   # ...
//! fxA: { reverb: false, delay: true, filter: false, gate: false }
//! wetA: { reverb: 0.5, delay: 0.3, filter: 0.5, gate: 0.5 }
//! crossfader: 50
//! master: 100
//! beatSnap: false
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use twindeck_core::audio::AudioConfig;
use twindeck_core::config::{default_config_path, load_config, save_config};
use twindeck_core::engine::{DEFAULT_CROSSFADER, DEFAULT_MASTER};
use twindeck_core::fx::{EqGains, FxFlags, FxWet};
use twindeck_midi::MidiMap;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Default settings location
pub fn default_settings_path() -> PathBuf {
    default_config_path(SETTINGS_FILE)
}

/// Everything persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub midi_map: MidiMap,
    pub fx_a: FxFlags,
    pub fx_b: FxFlags,
    pub wet_a: FxWet,
    pub wet_b: FxWet,
    /// 0-100
    pub crossfader: u8,
    /// 0-100
    pub master: u8,
    pub beat_snap: bool,
    pub eq_a: EqGains,
    pub eq_b: EqGains,
    /// User MIDI presets by name (built-ins are not stored)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub midi_presets: BTreeMap<String, MidiMap>,
    /// Input port name pattern; first port when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midi_port: Option<String>,
    pub audio: AudioConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            midi_map: MidiMap::default(),
            fx_a: FxFlags::default(),
            fx_b: FxFlags::default(),
            wet_a: FxWet::default(),
            wet_b: FxWet::default(),
            crossfader: DEFAULT_CROSSFADER,
            master: DEFAULT_MASTER,
            beat_snap: false,
            eq_a: EqGains::default(),
            eq_b: EqGains::default(),
            midi_presets: BTreeMap::new(),
            midi_port: None,
            audio: AudioConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `path`, falling back to defaults, with values forced into
    /// range
    pub fn load(path: &Path) -> Self {
        load_config::<Settings>(path).sanitized()
    }

    /// Save to `path`
    ///
    /// A MIDI map with duplicate codes is written as is; the clashes were
    /// already reported when the map was loaded or edited.
    pub fn save(&self, path: &Path) -> Result<()> {
        let conflicts = self.midi_map.conflicts().len();
        if conflicts > 0 {
            log::warn!("Settings: saving MIDI map with {} duplicate code(s)", conflicts);
        }
        save_config(self, path)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize settings")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).context("Failed to parse settings JSON")?;
        Ok(settings.sanitized())
    }

    /// Copy with crossfader, master, wet amounts and EQ gains clamped
    pub fn sanitized(mut self) -> Self {
        self.crossfader = self.crossfader.min(100);
        self.master = self.master.min(100);
        for wet in [&mut self.wet_a, &mut self.wet_b] {
            for amount in [&mut wet.reverb, &mut wet.delay, &mut wet.filter, &mut wet.gate] {
                *amount = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, 1.0) };
            }
        }
        self.eq_a = self.eq_a.clamped();
        self.eq_b = self.eq_b.clamped();
        self
    }
}
