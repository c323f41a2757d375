//! Input device enumeration and selection.

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::debug;

use super::error::CaptureError;

/// Name and input capability of one audio device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub max_input_channels: u16,
}

/// Select a device by case-insensitive substring match on its name.
/// First match wins.
pub fn match_device<'a>(
    devices: &'a [DeviceInfo],
    selector: &str,
) -> Result<&'a DeviceInfo, CaptureError> {
    let needle = selector.to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase().contains(&needle))
        .ok_or_else(|| CaptureError::DeviceNotFound(selector.to_string()))
}

/// List input devices on the default host with their channel capabilities.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    let mut out = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        out.push(DeviceInfo {
            max_input_channels: max_input_channels(&device),
            name,
        });
    }

    debug!("Found {} input devices", out.len());
    Ok(out)
}

/// Resolve a cpal input device. `selector` is a case-insensitive substring of
/// the device name; `None` uses the host default input.
pub(crate) fn find_cpal_device(
    selector: Option<&str>,
) -> Result<(cpal::Device, DeviceInfo), CaptureError> {
    let host = cpal::default_host();

    let Some(selector) = selector else {
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceNotFound("default input device".to_string())
        })?;
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string());
        let info = DeviceInfo {
            max_input_channels: max_input_channels(&device),
            name,
        };
        return Ok((device, info));
    };

    let needle = selector.to_lowercase();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;
    for device in devices {
        let Ok(name) = device.name() else { continue };
        if name.to_lowercase().contains(&needle) {
            let info = DeviceInfo {
                max_input_channels: max_input_channels(&device),
                name,
            };
            return Ok((device, info));
        }
    }

    Err(CaptureError::DeviceNotFound(selector.to_string()))
}

fn max_input_channels(device: &cpal::Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}
