//! Application state driven by the control tick
//!
//! Owns the console, the MIDI front and the mapping store. Each tick drains
//! pending MIDI input in delivery order before advancing the console, so a
//! burst of controller messages is applied within one visual frame.

use std::path::PathBuf;
use std::time::Instant;

use twindeck_core::metering::MeterFrame;
use twindeck_core::recording::RecordingState;
use twindeck_core::tempo::EnergyBeatDetector;
use twindeck_core::DeckId;
use twindeck_midi::{MappingStore, MidiController, MidiDispatcher};

use crate::commands::{Command, HELP};
use crate::console::MixConsole;
use crate::settings::Settings;

pub struct App {
    console: MixConsole,
    midi: MidiController,
    mappings: MappingStore,
    dispatcher: MidiDispatcher,
    detector: EnergyBeatDetector,
    settings: Settings,
    settings_path: PathBuf,
    frame: Option<MeterFrame>,
}

impl App {
    pub fn new(
        console: MixConsole,
        midi: MidiController,
        settings: Settings,
        settings_path: PathBuf,
    ) -> Self {
        let mappings =
            MappingStore::from_settings(settings.midi_map, settings.midi_presets.clone());
        Self {
            console,
            midi,
            mappings,
            dispatcher: MidiDispatcher::new(),
            detector: EnergyBeatDetector::default(),
            settings,
            settings_path,
            frame: None,
        }
    }

    pub fn console(&self) -> &MixConsole {
        &self.console
    }

    /// One visual-clock tick
    pub fn tick(&mut self, now: Instant) -> MeterFrame {
        for event in self.midi.drain() {
            if let Some(control) = self.dispatcher.dispatch_event(event, self.mappings.active()) {
                self.console.apply(control);
            }
        }
        let frame = self.console.tick(now);
        self.frame = Some(frame);
        frame
    }

    /// Load a WAV file onto a deck, reporting failures to the user
    pub fn load(&mut self, deck: DeckId, path: PathBuf) {
        match self.console.load_file(deck, &path, &self.detector) {
            Ok(true) => println!("Deck {}: {}", deck, path.display()),
            Ok(false) => println!("Deck {}: {} (no audio output)", deck, path.display()),
            Err(e) => println!("Deck {}: cannot load {}: {}", deck, path.display(), e),
        }
    }

    /// Run one text command; returns false when the app should exit
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Control(event) => self.console.apply(event),
            Command::Eq { deck, band, db } => {
                let gain = self.console.set_eq_gain(deck, band, db);
                println!("Deck {}: EQ {:?} {:+.1} dB", deck, band, gain);
            }
            Command::Snap(enabled) => self.console.set_beat_snap(enabled),
            Command::Load { deck, path } => self.load(deck, path),
            Command::Close(deck) => self.console.close_deck(deck),
            Command::Learn { action, code } => match self.mappings.learn(action, code) {
                Ok(()) => println!("MIDI: {} = {}", action, code),
                Err(e) => println!("MIDI: {}", e),
            },
            Command::ApplyPreset(name) => {
                if let Err(e) = self.mappings.apply_preset(&name) {
                    println!("MIDI: {}", e);
                }
            }
            Command::SavePreset(name) => match self.mappings.save_preset(&name) {
                Ok(()) => println!("MIDI: saved preset '{}'", name.trim()),
                Err(e) => println!("MIDI: {}", e),
            },
            Command::RemovePreset(name) => {
                if let Err(e) = self.mappings.remove_preset(&name) {
                    println!("MIDI: {}", e);
                }
            }
            Command::ListPresets => {
                for name in self.mappings.preset_names() {
                    println!("  {}", name);
                }
            }
            Command::Status => println!("{}", self.status()),
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    /// Human-readable snapshot of the console
    pub fn status(&self) -> String {
        let console = &self.console;
        let mut lines = Vec::new();

        for deck in DeckId::ALL {
            let state = console.deck(deck);
            let fx = console.fx(deck);
            let active: Vec<&str> = twindeck_core::fx::EffectKind::ALL
                .into_iter()
                .filter(|kind| fx.is_enabled(*kind))
                .map(|kind| kind.name())
                .collect();
            let eq = console.eq(deck);
            lines.push(format!(
                "Deck {}: {} {:>7.2}/{:.2}s  bpm {}  rate {:.2}  fx [{}]  eq {:+.0}/{:+.0}/{:+.0}",
                deck,
                if state.playing {
                    "playing"
                } else if state.armed {
                    "paused "
                } else {
                    "empty  "
                },
                state.position,
                state.duration,
                state.bpm.map(|b| b.to_string()).unwrap_or_else(|| "--".to_string()),
                state.rate,
                active.join(", "),
                eq.low,
                eq.mid,
                eq.high
            ));
        }

        lines.push(format!(
            "Crossfader {}  Master {}  Snap {}  Rec {}",
            console.crossfader(),
            console.master(),
            if console.beat_snap() { "on" } else { "off" },
            match console.recording_state() {
                RecordingState::Idle => "idle",
                RecordingState::Recording => "recording",
            }
        ));
        lines.push(format!(
            "MIDI: {}{}  ({} dispatched, {} ignored, {} dropped)",
            self.midi.status().label(),
            self.midi
                .port_name()
                .map(|name| format!(" on {}", name))
                .unwrap_or_default(),
            self.dispatcher.dispatched(),
            self.dispatcher.ignored(),
            self.midi.dropped_events()
        ));
        if let Some(frame) = self.frame {
            lines.push(format!(
                "Levels: A {:.2}  B {:.2}  pulse {:.2}",
                frame.levels[0], frame.levels[1], frame.pulse
            ));
        }
        lines.join("\n")
    }

    /// Tear down the console and persist the session
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(path) = self.console.shutdown() {
            println!("Recording saved to {}", path.display());
        }

        self.console.store_into(&mut self.settings);
        self.settings.midi_map = *self.mappings.active();
        self.settings.midi_presets = self.mappings.user_presets().clone();
        self.settings.save(&self.settings_path)
    }
}
