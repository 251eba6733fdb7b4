//! Output stream configuration

use serde::{Deserialize, Serialize};

use crate::engine::MAX_BUFFER_SIZE;

/// Buffer size used when none is requested (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest buffer size accepted from configuration (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Preferred stream sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = crate::types::SAMPLE_RATE;

/// Output stream settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfig {
    /// Output device name, `None` for the system default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Requested buffer size in frames, `None` for [`DEFAULT_BUFFER_SIZE`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
    /// Requested sample rate, `None` for [`DEFAULT_SAMPLE_RATE`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Buffer size in frames, clamped to what the engine can process
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_size
            .unwrap_or(DEFAULT_BUFFER_SIZE)
            .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// One-way output latency at a given rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        self.buffer_frames() as f32 / sample_rate.max(1) as f32 * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_frames_clamped() {
        let mut config = AudioConfig::default();
        assert_eq!(config.buffer_frames(), DEFAULT_BUFFER_SIZE);
        config.buffer_size = Some(16);
        assert_eq!(config.buffer_frames(), MIN_BUFFER_SIZE);
        config.buffer_size = Some(100_000);
        assert_eq!(config.buffer_frames(), MAX_BUFFER_SIZE as u32);
    }

    #[test]
    fn test_latency() {
        let config = AudioConfig {
            buffer_size: Some(480),
            ..Default::default()
        };
        assert!((config.latency_ms(48000) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_fields_default() {
        let config: AudioConfig = serde_yaml::from_str("device: Speakers").unwrap();
        assert_eq!(config.device.as_deref(), Some("Speakers"));
        assert_eq!(config.buffer_size, None);
    }
}
