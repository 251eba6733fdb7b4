//! YAML configuration I/O
//!
//! Loading never fails: a missing or unreadable file yields `T::default()`
//! so the console always starts. Saving reports errors to the caller.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a configuration file, falling back to defaults
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("load_config: {:?} not found, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("load_config: cannot read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: invalid YAML in {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save a configuration file, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        crossfader: u8,
        label: String,
    }

    #[test]
    fn test_missing_file_gives_default() {
        let loaded: Sample = load_config(Path::new("/nonexistent/twindeck/settings.yaml"));
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_save_creates_dirs_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        let config = Sample {
            crossfader: 30,
            label: "club".into(),
        };

        save_config(&config, &path).unwrap();
        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_yaml_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "crossfader: [not, a, number").unwrap();

        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, Sample::default());
    }
}
