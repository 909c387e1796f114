//! Geraete-Auswahl fuer Mikrofon und Lautsprecher
//!
//! Geraete werden ueber einen Namensausschnitt gewaehlt; ohne Namen gilt
//! das Standardgeraet des cpal-Hosts.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Richtung eines Audio-Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Eingabe,
    Ausgabe,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eingabe => write!(f, "Eingabe"),
            Self::Ausgabe => write!(f, "Ausgabe"),
        }
    }
}

/// Beschreibung eines Geraets fuer die Auflistung
#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub is_default: bool,
    /// Kleinste und groesste unterstuetzte Abtastrate
    pub sample_rate_range: Option<(u32, u32)>,
    pub max_channels: u16,
}

impl AudioDevice {
    /// Prueft, ob das Geraet die Abtastrate anbietet
    pub fn unterstuetzt_rate(&self, rate: u32) -> bool {
        self.sample_rate_range
            .map(|(min, max)| min <= rate && rate <= max)
            .unwrap_or(false)
    }
}

/// Listet alle Geraete einer Richtung auf
pub fn list_devices(kind: DeviceKind) -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = match kind {
        DeviceKind::Eingabe => host.default_input_device(),
        DeviceKind::Ausgabe => host.default_output_device(),
    }
    .and_then(|d| d.name().ok());

    let devices: Vec<Device> = match kind {
        DeviceKind::Eingabe => host.input_devices().map(|d| d.collect()),
        DeviceKind::Ausgabe => host.output_devices().map(|d| d.collect()),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut result = Vec::with_capacity(devices.len());
    for device in devices {
        match describe(&device, kind) {
            Ok(mut ad) => {
                ad.is_default = default_name.as_deref() == Some(ad.name.as_str());
                result.push(ad);
            }
            Err(e) => warn!("{}geraet konnte nicht gelesen werden: {}", kind, e),
        }
    }
    debug!("Gefundene {}geraete: {}", kind, result.len());
    Ok(result)
}

/// Listet alle Mikrofone auf
pub fn list_input_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(DeviceKind::Eingabe)
}

/// Listet alle Lautsprecher auf
pub fn list_output_devices() -> AudioResult<Vec<AudioDevice>> {
    list_devices(DeviceKind::Ausgabe)
}

/// Laedt ein cpal-Eingabegeraet (Namensausschnitt oder Standard)
pub fn load_cpal_input_device(name: Option<&str>) -> AudioResult<Device> {
    load_device(DeviceKind::Eingabe, name)
}

/// Laedt ein cpal-Ausgabegeraet (Namensausschnitt oder Standard)
pub fn load_cpal_output_device(name: Option<&str>) -> AudioResult<Device> {
    load_device(DeviceKind::Ausgabe, name)
}

fn load_device(kind: DeviceKind, name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    let Some(wanted) = name.filter(|n| !n.trim().is_empty()) else {
        return match kind {
            DeviceKind::Eingabe => host
                .default_input_device()
                .ok_or(AudioError::KeinStandardEingabegeraet),
            DeviceKind::Ausgabe => host
                .default_output_device()
                .ok_or(AudioError::KeinStandardAusgabegeraet),
        };
    };

    let mut devices = match kind {
        DeviceKind::Eingabe => host.input_devices().map(|d| d.collect::<Vec<_>>()),
        DeviceKind::Ausgabe => host.output_devices().map(|d| d.collect::<Vec<_>>()),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?
    .into_iter();

    devices
        .find(|d| d.name().map(|n| matches_name(&n, wanted)).unwrap_or(false))
        .ok_or_else(|| AudioError::GeraetNichtGefunden(wanted.to_string()))
}

/// Namensvergleich ohne Gross-/Kleinschreibung, Ausschnitt genuegt
fn matches_name(device_name: &str, wanted: &str) -> bool {
    device_name
        .to_lowercase()
        .contains(&wanted.trim().to_lowercase())
}

fn describe(device: &Device, kind: DeviceKind) -> AudioResult<AudioDevice> {
    let name = device
        .name()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let ranges: Vec<(u32, u32, u16)> = match kind {
        DeviceKind::Eingabe => device.supported_input_configs().map(|c| {
            c.map(|r| (r.min_sample_rate().0, r.max_sample_rate().0, r.channels()))
                .collect()
        }),
        DeviceKind::Ausgabe => device.supported_output_configs().map(|c| {
            c.map(|r| (r.min_sample_rate().0, r.max_sample_rate().0, r.channels()))
                .collect()
        }),
    }
    .unwrap_or_default();

    let sample_rate_range = ranges.iter().fold(None, |acc: Option<(u32, u32)>, r| {
        Some(match acc {
            None => (r.0, r.1),
            Some((min, max)) => (min.min(r.0), max.max(r.1)),
        })
    });
    let max_channels = ranges.iter().map(|r| r.2).max().unwrap_or(1);

    Ok(AudioDevice {
        name,
        kind,
        is_default: false,
        sample_rate_range,
        max_channels,
    })
}
