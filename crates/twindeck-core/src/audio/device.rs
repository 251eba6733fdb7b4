//! Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};

use super::error::{AudioError, AudioResult};

/// Names of the default host's output devices
pub fn output_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::debug!("Could not enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

/// Default output device, or the first whose name contains `name`
/// (case-insensitive)
pub fn find_output_device(name: Option<&str>) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    let Some(name) = name else {
        return host.default_output_device().ok_or(AudioError::NoDevices);
    };

    let needle = name.to_lowercase();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    for device in devices {
        if device
            .name()
            .is_ok_and(|n| n.to_lowercase().contains(&needle))
        {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}
