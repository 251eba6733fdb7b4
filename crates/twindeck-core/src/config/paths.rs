//! Standard file locations

use std::path::PathBuf;

/// Settings directory: `~/.config/twindeck`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("twindeck")
}

/// A file inside the settings directory
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}

/// Where recordings are saved: `~/Music/twindeck/recordings`
pub fn recordings_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("twindeck")
        .join("recordings")
}
