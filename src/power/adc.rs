/// Raw battery ADC sources
use std::fs;
use std::path::PathBuf;

use crate::error::StationError;

pub trait BatteryAdc {
    fn read_raw(&mut self) -> Result<u32, StationError>;
}

/// Linux IIO channel exposed through sysfs, e.g. `in_voltage0_raw`
pub struct IioAdc {
    path: PathBuf,
}

impl IioAdc {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IioAdc { path: path.into() }
    }
}

impl BatteryAdc for IioAdc {
    fn read_raw(&mut self) -> Result<u32, StationError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            StationError::BatteryUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        text.trim().parse::<u32>().map_err(|e| {
            StationError::BatteryUnavailable(format!(
                "{}: invalid count '{}': {}",
                self.path.display(),
                text.trim(),
                e
            ))
        })
    }
}

/// Fixed cell voltage behind the configured divider
pub struct SimulatedAdc {
    raw: u32,
}

impl SimulatedAdc {
    pub fn new(cell_voltage: f64, adc_reference: f64, adc_max_value: u32, divider_ratio: f64) -> Self {
        let raw = cell_voltage / divider_ratio * adc_max_value as f64 / adc_reference;
        SimulatedAdc {
            raw: raw.clamp(0.0, adc_max_value as f64) as u32,
        }
    }
}

impl BatteryAdc for SimulatedAdc {
    fn read_raw(&mut self) -> Result<u32, StationError> {
        Ok(self.raw)
    }
}
