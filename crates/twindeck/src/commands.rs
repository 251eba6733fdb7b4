//! Text control surface
//!
//! One command per line on stdin. Control commands become the same
//! [`ControlEvent`]s MIDI produces; the rest (EQ, loading, presets) call the
//! console or mapping store directly.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use twindeck_core::control::{ControlAction, ControlEvent, ControlSource};
use twindeck_core::fx::{EffectKind, EqBand};
use twindeck_core::DeckId;
use twindeck_midi::MidiAction;

pub const HELP: &str = "\
Commands:
  play <a|b>                  play / pause a deck
  fx <a|b> <effect>           toggle reverb, delay, filter or gate
  wet <a|b> <effect> <0-1>    set an effect's wet amount
  eq <a|b> <low|mid|high> <dB>
  xf <0-100>                  crossfader
  master <0-100>              master level
  rec                         start / stop recording
  tap <a|b>                   tap tempo
  sync <a|b>                  match the other deck's tempo
  rate <a|b> <0.6-1.5>        playback rate
  snap <on|off>               beat snap on play
  load <a|b> <file.wav>
  close <a|b>
  learn <action> <0-127>      assign a MIDI code (playA, fxBDelay, record, ...)
  preset <name>               apply a MIDI preset
  preset save <name> | preset remove <name> | presets
  status | help | quit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Control(ControlEvent),
    Eq { deck: DeckId, band: EqBand, db: f32 },
    Snap(bool),
    Load { deck: DeckId, path: PathBuf },
    Close(DeckId),
    Learn { action: MidiAction, code: u8 },
    ApplyPreset(String),
    SavePreset(String),
    RemovePreset(String),
    ListPresets,
    Status,
    Help,
    Quit,
}

fn ui(action: ControlAction, value: f32) -> Command {
    Command::Control(ControlEvent::new(ControlSource::Ui, action, value))
}

fn trigger(action: ControlAction) -> Command {
    Command::Control(ControlEvent::trigger(ControlSource::Ui, action))
}

fn deck_arg(arg: Option<&str>) -> Result<DeckId> {
    let arg = arg.ok_or_else(|| anyhow!("missing deck (a or b)"))?;
    DeckId::from_label(arg).ok_or_else(|| anyhow!("unknown deck '{}'", arg))
}

fn effect_arg(arg: Option<&str>) -> Result<EffectKind> {
    let arg = arg.ok_or_else(|| anyhow!("missing effect"))?;
    EffectKind::from_name(arg).ok_or_else(|| anyhow!("unknown effect '{}'", arg))
}

fn number_arg(arg: Option<&str>, what: &str) -> Result<f32> {
    let arg = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    let value: f32 = arg
        .parse()
        .with_context(|| format!("invalid {} '{}'", what, arg))?;
    if !value.is_finite() {
        bail!("invalid {} '{}'", what, arg);
    }
    Ok(value)
}

/// Everything after the first `skip` words, as typed
fn rest_of_line(line: &str, skip: usize) -> String {
    line.split_whitespace()
        .skip(skip)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let command = match verb.as_str() {
        "play" | "p" => trigger(ControlAction::PlayPauseDeck(deck_arg(words.next())?)),
        "fx" => {
            let deck = deck_arg(words.next())?;
            let kind = effect_arg(words.next())?;
            trigger(ControlAction::ToggleEffect { deck, kind })
        }
        "wet" => {
            let deck = deck_arg(words.next())?;
            let kind = effect_arg(words.next())?;
            ui(ControlAction::SetWet { deck, kind }, number_arg(words.next(), "wet amount")?)
        }
        "eq" => {
            let deck = deck_arg(words.next())?;
            let band = words.next().ok_or_else(|| anyhow!("missing EQ band"))?;
            let band = EqBand::from_name(band).ok_or_else(|| anyhow!("unknown EQ band '{}'", band))?;
            Command::Eq {
                deck,
                band,
                db: number_arg(words.next(), "gain")?,
            }
        }
        "xf" | "crossfader" => ui(ControlAction::SetCrossfader, number_arg(words.next(), "position")?),
        "master" => ui(ControlAction::SetMaster, number_arg(words.next(), "level")?),
        "rec" | "record" => trigger(ControlAction::ToggleRecording),
        "tap" => trigger(ControlAction::TapTempo(deck_arg(words.next())?)),
        "sync" => trigger(ControlAction::SyncTempo(deck_arg(words.next())?)),
        "rate" => {
            let deck = deck_arg(words.next())?;
            ui(ControlAction::SetPlaybackRate(deck), number_arg(words.next(), "rate")?)
        }
        "snap" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("on") => Command::Snap(true),
            Some("off") => Command::Snap(false),
            _ => bail!("usage: snap <on|off>"),
        },
        "load" => {
            let deck = deck_arg(words.next())?;
            let path = rest_of_line(line, 2);
            if path.is_empty() {
                bail!("usage: load <a|b> <file.wav>");
            }
            Command::Load {
                deck,
                path: PathBuf::from(path),
            }
        }
        "close" => Command::Close(deck_arg(words.next())?),
        "learn" => {
            let name = words.next().ok_or_else(|| anyhow!("missing action name"))?;
            let action =
                MidiAction::from_name(name).ok_or_else(|| anyhow!("unknown action '{}'", name))?;
            let code = words.next().ok_or_else(|| anyhow!("missing MIDI code"))?;
            let code: u8 = code
                .parse()
                .with_context(|| format!("invalid MIDI code '{}'", code))?;
            Command::Learn { action, code }
        }
        "preset" => match words.next() {
            Some(sub) if sub.eq_ignore_ascii_case("save") => {
                Command::SavePreset(rest_of_line(line, 2))
            }
            Some(sub) if sub.eq_ignore_ascii_case("remove") => {
                Command::RemovePreset(rest_of_line(line, 2))
            }
            Some(_) => Command::ApplyPreset(rest_of_line(line, 1)),
            None => Command::ListPresets,
        },
        "presets" => Command::ListPresets,
        "status" | "s" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("unknown command '{}', try 'help'", other),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(line: &str) -> ControlEvent {
        match parse(line).unwrap() {
            Some(Command::Control(event)) => event,
            other => panic!("expected control event, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_and_toggles() {
        assert_eq!(control("play a").action, ControlAction::PlayPauseDeck(DeckId::A));
        assert_eq!(
            control("fx b delay").action,
            ControlAction::ToggleEffect {
                deck: DeckId::B,
                kind: EffectKind::Delay
            }
        );
        assert_eq!(control("rec").action, ControlAction::ToggleRecording);
        assert_eq!(control("TAP B").action, ControlAction::TapTempo(DeckId::B));
        assert_eq!(control("sync b").action, ControlAction::SyncTempo(DeckId::B));
        assert_eq!(control("rec").source, ControlSource::Ui);
    }

    #[test]
    fn test_valued_commands() {
        let wet = control("wet a filter 0.4");
        assert_eq!(
            wet.action,
            ControlAction::SetWet {
                deck: DeckId::A,
                kind: EffectKind::Filter
            }
        );
        assert!((wet.value - 0.4).abs() < 1e-6);

        assert_eq!(control("xf 30").value, 30.0);
        assert_eq!(control("master 80").action, ControlAction::SetMaster);
        let rate = control("rate a 1.1");
        assert_eq!(rate.action, ControlAction::SetPlaybackRate(DeckId::A));
        assert!((rate.value - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(
            parse("eq a low -6").unwrap(),
            Some(Command::Eq {
                deck: DeckId::A,
                band: EqBand::Low,
                db: -6.0
            })
        );
        assert_eq!(parse("snap on").unwrap(), Some(Command::Snap(true)));
        assert_eq!(parse("snap OFF").unwrap(), Some(Command::Snap(false)));
        assert_eq!(parse("close b").unwrap(), Some(Command::Close(DeckId::B)));
        assert_eq!(parse("quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_load_keeps_spaces_in_path() {
        assert_eq!(
            parse("load b  my tracks/intro mix.wav").unwrap(),
            Some(Command::Load {
                deck: DeckId::B,
                path: PathBuf::from("my tracks/intro mix.wav")
            })
        );
        assert!(parse("load a").is_err());
    }

    #[test]
    fn test_mapping_commands() {
        assert_eq!(
            parse("learn fxBGate 64").unwrap(),
            Some(Command::Learn {
                action: MidiAction::ToggleEffect(DeckId::B, EffectKind::Gate),
                code: 64
            })
        );
        assert!(parse("learn record 300").is_err());
        assert_eq!(
            parse("preset Pad Grid").unwrap(),
            Some(Command::ApplyPreset("Pad Grid".to_string()))
        );
        assert_eq!(
            parse("preset save Club Night").unwrap(),
            Some(Command::SavePreset("Club Night".to_string()))
        );
        assert_eq!(parse("preset").unwrap(), Some(Command::ListPresets));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("# warmup").unwrap(), None);
    }

    #[test]
    fn test_errors_name_the_problem() {
        let err = parse("play c").unwrap_err().to_string();
        assert!(err.contains("unknown deck"));
        assert!(parse("fx a chorus").is_err());
        assert!(parse("wet a delay lots").is_err());
        assert!(parse("xf nan").is_err());
        assert!(parse("dance").unwrap_err().to_string().contains("help"));
    }
}
