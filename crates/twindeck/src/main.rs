//! Twindeck - two-deck mixing console
//!
//! Starts the audio engine and MIDI input, then runs a 60 Hz control tick
//! that applies MIDI and text commands and advances the meters. Text commands
//! are read from stdin on a separate thread (`help` lists them).
//!
//! ## Command line
//!
//! ```text
//! twindeck [--midi-port <pattern>] [--settings <file>] [--list-devices] [deck-a.wav] [deck-b.wav]
//! ```

mod app;
mod commands;
mod console;
mod settings;

use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossbeam::channel::{self, Receiver};

use twindeck_core::audio::{open_output, output_device_names, AudioConfig, AudioHandle};
use twindeck_core::config::recordings_dir;
use twindeck_core::engine::RenderContext;
use twindeck_core::DeckId;
use twindeck_midi::{list_input_ports, MidiController};

use app::App;
use console::MixConsole;
use settings::{default_settings_path, Settings};

/// Control tick period (~60 Hz)
const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    midi_port: Option<String>,
    settings: Option<PathBuf>,
    list_devices: bool,
    tracks: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--midi-port" => match args.next() {
                Some(pattern) => cli.midi_port = Some(pattern),
                None => bail!("--midi-port needs a pattern"),
            },
            "--settings" => match args.next() {
                Some(path) => cli.settings = Some(PathBuf::from(path)),
                None => bail!("--settings needs a file"),
            },
            "--list-devices" => cli.list_devices = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            _ => {
                if cli.tracks.len() == DeckId::ALL.len() {
                    bail!("at most {} tracks can be loaded", DeckId::ALL.len());
                }
                cli.tracks.push(PathBuf::from(arg));
            }
        }
    }
    Ok(cli)
}

/// Open the output device and start the engine on it
///
/// Any failure leaves the console without a render context; it keeps
/// running with MIDI, tempo and settings but no sound.
fn start_audio(config: &AudioConfig) -> (Option<RenderContext>, Option<AudioHandle>) {
    let output = match open_output(config) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Warning: Could not open audio output: {}", e);
            eprintln!("Running without audio output");
            return (None, None);
        }
    };

    let (ctx, engine) = RenderContext::new(output.sample_rate());
    match output.start(engine) {
        Ok(handle) => {
            println!(
                "Audio: {} at {} Hz, {} frames ({:.1} ms)",
                handle.device_name(),
                handle.sample_rate(),
                handle.buffer_size(),
                handle.latency_ms()
            );
            (Some(ctx), Some(handle))
        }
        Err(e) => {
            eprintln!("Warning: Could not start audio stream: {}", e);
            eprintln!("Running without audio output");
            (None, None)
        }
    }
}

/// Read stdin lines on a background thread
///
/// The channel disconnects when stdin closes.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Cannot read commands from stdin: {}", e);
    }
    rx
}

fn list_devices() {
    println!("Audio outputs:");
    for name in output_device_names() {
        println!("  {}", name);
    }
    println!("MIDI inputs:");
    match list_input_ports() {
        Ok(ports) => ports.iter().for_each(|port| println!("  {}", port)),
        Err(e) => println!("  ({})", e),
    }
}

fn main() -> Result<()> {
    let cli = parse_args(std::env::args().skip(1))?;

    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if cli.list_devices {
        list_devices();
        return Ok(());
    }

    log::info!("twindeck starting up");
    println!("Twindeck - two-deck mixing console");
    println!();

    let settings_path = cli.settings.unwrap_or_else(default_settings_path);
    let mut settings = Settings::load(&settings_path);
    if cli.midi_port.is_some() {
        settings.midi_port = cli.midi_port;
    }

    let (ctx, audio_handle) = start_audio(&settings.audio);
    let midi = MidiController::connect(settings.midi_port.as_deref());
    println!("MIDI: {}", midi.status().label());

    let console = MixConsole::new(ctx, &settings, recordings_dir());
    if !console.has_audio() {
        println!("Decks will be analyzed but not played");
    }
    let mut app = App::new(console, midi, settings, settings_path);

    for (deck, path) in DeckId::ALL.into_iter().zip(cli.tracks) {
        app.load(deck, path);
    }

    println!("Type 'help' for commands");
    let lines = spawn_stdin_reader();
    let ticker = channel::tick(TICK_INTERVAL);

    loop {
        crossbeam::select! {
            recv(ticker) -> _ => {
                app.tick(Instant::now());
            }
            recv(lines) -> line => {
                let Ok(line) = line else {
                    log::info!("stdin closed, shutting down");
                    break;
                };
                match commands::parse(&line) {
                    Ok(Some(command)) => {
                        if !app.handle(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    let result = app.shutdown();
    drop(audio_handle);
    log::info!("twindeck stopped");
    result
}
