//! Session configuration files
//!
//! YAML load/save helpers used for the console settings, and the standard
//! locations for settings and recordings.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path, recordings_dir};
