//! Active MIDI map plus named presets
//!
//! Two presets are built in and read-only: `"Default"` and `"Pad Grid"`. User
//! presets live alongside them and are persisted with the session settings.
//! Every map that becomes active or gets saved is validated: codes must be
//! 7-bit and no two actions of the same message kind may share a code.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::map::{MidiAction, MidiMap};
use crate::normalize::MIDI_MAX;

/// Name of the built-in factory mapping
pub const DEFAULT_PRESET: &str = "Default";
/// Name of the built-in pad-controller mapping
pub const PAD_GRID_PRESET: &str = "Pad Grid";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("MIDI code {code} is used by both {first} and {second}")]
    DuplicateCode {
        first: MidiAction,
        second: MidiAction,
        code: u8,
    },

    #[error("MIDI code {code} for {action} is outside 0-127")]
    OutOfRange { action: MidiAction, code: u8 },

    #[error("No MIDI preset named '{0}'")]
    UnknownPreset(String),

    #[error("MIDI preset '{0}' is built in and cannot be changed")]
    ReadOnlyPreset(String),

    #[error("MIDI preset name must not be empty")]
    EmptyName,
}

/// Check a map for out-of-range and duplicate codes
pub fn validate(map: &MidiMap) -> Result<(), MappingError> {
    if let Some((action, code)) = map.out_of_range().into_iter().next() {
        return Err(MappingError::OutOfRange { action, code });
    }
    if let Some((first, second, code)) = map.conflicts().into_iter().next() {
        return Err(MappingError::DuplicateCode {
            first,
            second,
            code,
        });
    }
    Ok(())
}

fn pad_grid_map() -> MidiMap {
    MidiMap {
        play_a: 36,
        play_b: 37,
        crossfader: 1,
        master: 2,
        fx_a_reverb: 40,
        fx_a_delay: 41,
        fx_a_filter: 42,
        fx_a_gate: 43,
        fx_b_reverb: 44,
        fx_b_delay: 45,
        fx_b_filter: 46,
        fx_b_gate: 47,
        record: 39,
    }
}

fn builtin_preset(name: &str) -> Option<MidiMap> {
    match name {
        DEFAULT_PRESET => Some(MidiMap::default()),
        PAD_GRID_PRESET => Some(pad_grid_map()),
        _ => None,
    }
}

/// The control mapping store
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    active: MidiMap,
    presets: BTreeMap<String, MidiMap>,
}

impl MappingStore {
    /// Build from persisted state
    ///
    /// Conflicting maps are kept as loaded, with a warning per conflict, so
    /// a hand-edited settings file never silently loses codes.
    pub fn from_settings(active: MidiMap, presets: BTreeMap<String, MidiMap>) -> Self {
        for (first, second, code) in active.conflicts() {
            log::warn!(
                "MIDI: code {} is mapped to both {} and {}, only {} will fire",
                code,
                first,
                second,
                first
            );
        }
        for (action, code) in active.out_of_range() {
            log::warn!("MIDI: code {} for {} is not a 7-bit value", code, action);
        }

        let presets = presets
            .into_iter()
            .filter(|(name, _)| {
                let builtin = builtin_preset(name).is_some();
                if builtin {
                    log::warn!("MIDI: ignoring user preset shadowing built-in '{}'", name);
                }
                !builtin
            })
            .collect();

        Self { active, presets }
    }

    pub fn active(&self) -> &MidiMap {
        &self.active
    }

    /// Replace the active map after validating it
    pub fn set_active(&mut self, map: MidiMap) -> Result<(), MappingError> {
        validate(&map)?;
        self.active = map;
        Ok(())
    }

    /// Assign one action's code (MIDI learn)
    pub fn learn(&mut self, action: MidiAction, code: u8) -> Result<(), MappingError> {
        if code > MIDI_MAX {
            return Err(MappingError::OutOfRange { action, code });
        }
        if let Some(other) = MidiAction::ALL.into_iter().find(|other| {
            *other != action && other.kind() == action.kind() && self.active.code(*other) == code
        }) {
            return Err(MappingError::DuplicateCode {
                first: other,
                second: action,
                code,
            });
        }
        self.active.set_code(action, code);
        log::info!("MIDI: learned {} = {}", action, code);
        Ok(())
    }

    /// Make a preset the active map
    pub fn apply_preset(&mut self, name: &str) -> Result<(), MappingError> {
        let map = self
            .preset(name)
            .ok_or_else(|| MappingError::UnknownPreset(name.to_string()))?;
        self.set_active(map)?;
        log::info!("MIDI: applied preset '{}'", name);
        Ok(())
    }

    /// Save the active map as a user preset, replacing one of the same name
    pub fn save_preset(&mut self, name: &str) -> Result<(), MappingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingError::EmptyName);
        }
        if builtin_preset(name).is_some() {
            return Err(MappingError::ReadOnlyPreset(name.to_string()));
        }
        validate(&self.active)?;
        self.presets.insert(name.to_string(), self.active);
        Ok(())
    }

    pub fn remove_preset(&mut self, name: &str) -> Result<MidiMap, MappingError> {
        if builtin_preset(name).is_some() {
            return Err(MappingError::ReadOnlyPreset(name.to_string()));
        }
        self.presets
            .remove(name)
            .ok_or_else(|| MappingError::UnknownPreset(name.to_string()))
    }

    pub fn preset(&self, name: &str) -> Option<MidiMap> {
        builtin_preset(name).or_else(|| self.presets.get(name).copied())
    }

    /// Built-in presets first, then user presets alphabetically
    pub fn preset_names(&self) -> Vec<String> {
        [DEFAULT_PRESET, PAD_GRID_PRESET]
            .into_iter()
            .map(str::to_string)
            .chain(self.presets.keys().cloned())
            .collect()
    }

    /// User presets, for persisting
    pub fn user_presets(&self) -> &BTreeMap<String, MidiMap> {
        &self.presets
    }
}
