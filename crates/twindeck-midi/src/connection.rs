//! MIDI port discovery
//!
//! Uses midir for cross-platform MIDI input (ALSA on Linux, CoreMIDI on
//! macOS, WinMM on Windows).

use midir::{MidiInput, MidiInputPort};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("No MIDI input ports available")]
    NoInputPorts,

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// Find an input port by case-insensitive substring, or the first port
///
/// Returns the midir client so the caller can attach its callback.
pub fn find_input_port(
    port_match: Option<&str>,
) -> Result<(MidiInput, MidiInputPort, String), MidiConnectionError> {
    let midi_in = MidiInput::new("twindeck-midi-in")
        .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

    let in_ports = midi_in.ports();
    if in_ports.is_empty() {
        return Err(MidiConnectionError::NoInputPorts);
    }

    let port = match port_match {
        Some(pattern) => {
            let pattern = pattern.to_lowercase();
            in_ports
                .into_iter()
                .find(|port| {
                    midi_in
                        .port_name(port)
                        .map(|name| name.to_lowercase().contains(&pattern))
                        .unwrap_or(false)
                })
                .ok_or_else(|| MidiConnectionError::PortNotFound(pattern))?
        }
        None => in_ports
            .into_iter()
            .next()
            .ok_or(MidiConnectionError::NoInputPorts)?,
    };

    let port_name = midi_in
        .port_name(&port)
        .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;

    log::info!("MIDI: Found input port: {}", port_name);
    Ok((midi_in, port, port_name))
}

/// List all available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>, MidiConnectionError> {
    let midi_in = MidiInput::new("twindeck-midi-list")
        .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}
