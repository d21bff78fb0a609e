use std::env;
use std::str::FromStr;

use log::info;

use crate::power::{BatteryConfig, BatteryCurve, ScheduleConfig};
use crate::sensor::compensation::STANDARD_SEA_LEVEL_HPA;

const MAX_ELEVATION_M: f64 = 44_330.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub station_name: String,
    pub database_url: String,
    pub base_interval_secs: u64,
    pub schedule: ScheduleConfig,
    pub buffer_capacity: usize,
    pub battery: BatteryConfig,
    pub battery_adc_path: Option<String>,
    /// Multimeter reading used once to calibrate the battery channel
    pub battery_actual_voltage: Option<f64>,
    pub elevation: f64,
    pub sea_level_reference: f64,
    pub offsets: Offsets,
    pub max_sensor_failures: u32,
    pub debug_mode: bool,
}

/// Site calibration added after compensation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offsets {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

impl StationConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::from_lookup(|key| env::var(key).ok())?;

        info!("Station: {}", config.station_name);
        info!("Read interval: {}s", config.base_interval_secs);
        info!(
            "Sleep bounds: {}s..{}s",
            config.schedule.min_sleep_secs, config.schedule.max_sleep_secs
        );
        info!("Buffer capacity: {}", config.buffer_capacity);
        info!("Elevation: {} m", config.elevation);
        Ok(config)
    }

    /// Build a configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or("DATABASE_URL environment variable not set")?;

        let defaults = BatteryConfig::default();
        let curve = match lookup("BATTERY_CURVE") {
            Some(text) => parse_curve(&text)?,
            None => defaults.curve.clone(),
        };

        let config = StationConfig {
            station_name: lookup("STATION_NAME").unwrap_or_else(|| "Weather Station".to_string()),
            database_url,
            base_interval_secs: parse_or(&lookup, "SENSOR_READ_INTERVAL", 300)?,
            schedule: ScheduleConfig {
                min_sleep_secs: parse_or(&lookup, "MIN_SLEEP_SECS", 60)?,
                max_sleep_secs: parse_or(&lookup, "MAX_SLEEP_SECS", 3600)?,
                low_multiplier: parse_or(&lookup, "LOW_BATTERY_MULTIPLIER", 2.0)?,
                critical_multiplier: parse_or(&lookup, "CRITICAL_BATTERY_MULTIPLIER", 4.0)?,
            },
            buffer_capacity: parse_or(&lookup, "DATA_BUFFER_SIZE", 50)?,
            battery: BatteryConfig {
                adc_reference: parse_or(&lookup, "VREF", defaults.adc_reference)?,
                adc_max_value: parse_or(&lookup, "ADC_MAX_VALUE", defaults.adc_max_value)?,
                divider_ratio: parse_or(
                    &lookup,
                    "BATTERY_VOLTAGE_DIVIDER_RATIO",
                    defaults.divider_ratio,
                )?,
                curve,
                low_voltage: parse_or(&lookup, "BATTERY_LOW_VOLTAGE", defaults.low_voltage)?,
                critical_voltage: parse_or(
                    &lookup,
                    "BATTERY_CRITICAL_VOLTAGE",
                    defaults.critical_voltage,
                )?,
            },
            battery_adc_path: lookup("BATTERY_ADC_PATH").filter(|p| !p.trim().is_empty()),
            battery_actual_voltage: match lookup("BATTERY_ACTUAL_VOLTAGE") {
                Some(value) => Some(value.trim().parse().map_err(|e| {
                    format!("Invalid value '{}' for BATTERY_ACTUAL_VOLTAGE: {}", value, e)
                })?),
                None => None,
            },
            elevation: parse_or(&lookup, "STATION_ELEVATION", 190.0)?,
            sea_level_reference: parse_or(&lookup, "SEA_LEVEL_REFERENCE", STANDARD_SEA_LEVEL_HPA)?,
            offsets: Offsets {
                temperature: parse_or(&lookup, "TEMP_OFFSET", 0.0)?,
                humidity: parse_or(&lookup, "HUMIDITY_OFFSET", 0.0)?,
                pressure: parse_or(&lookup, "PRESSURE_OFFSET", 0.0)?,
            },
            max_sensor_failures: parse_or(&lookup, "MAX_SENSOR_READ_FAILURES", 5)?,
            debug_mode: parse_or(&lookup, "DEBUG_MODE", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.schedule.min_sleep_secs > self.schedule.max_sleep_secs {
            return Err(format!(
                "MIN_SLEEP_SECS ({}) exceeds MAX_SLEEP_SECS ({})",
                self.schedule.min_sleep_secs, self.schedule.max_sleep_secs
            ));
        }
        if self.buffer_capacity == 0 {
            return Err("DATA_BUFFER_SIZE must be at least 1".into());
        }
        if self.schedule.low_multiplier < 1.0 || self.schedule.critical_multiplier < 1.0 {
            return Err("Battery sleep multipliers must be at least 1.0".into());
        }
        if self.battery.critical_voltage >= self.battery.low_voltage {
            return Err(format!(
                "BATTERY_CRITICAL_VOLTAGE ({}) must be below BATTERY_LOW_VOLTAGE ({})",
                self.battery.critical_voltage, self.battery.low_voltage
            ));
        }
        if self.battery.adc_max_value == 0 {
            return Err("ADC_MAX_VALUE must be positive".into());
        }
        if let Some(actual) = self.battery_actual_voltage {
            if !actual.is_finite() || actual <= 0.0 {
                return Err(format!("Invalid BATTERY_ACTUAL_VOLTAGE: {}", actual));
            }
        }
        // Pressure reduction is undefined at and above the model atmosphere's top
        if !self.elevation.is_finite() || self.elevation >= MAX_ELEVATION_M {
            return Err(format!(
                "STATION_ELEVATION ({}) must be below {} m",
                self.elevation, MAX_ELEVATION_M
            ));
        }
        if !self.sea_level_reference.is_finite() || self.sea_level_reference <= 0.0 {
            return Err(format!(
                "Invalid SEA_LEVEL_REFERENCE: {}",
                self.sea_level_reference
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value '{}' for {}: {}", value, key, e)),
        None => Ok(default),
    }
}

/// Parse `volts:percent` pairs such as `3.0:0,3.7:50,4.2:100`
fn parse_curve(text: &str) -> Result<BatteryCurve, String> {
    let mut points = Vec::new();
    for pair in text.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (voltage, percent) = pair
            .split_once(':')
            .ok_or_else(|| format!("Invalid BATTERY_CURVE breakpoint '{}'", pair))?;
        let voltage: f64 = voltage
            .trim()
            .parse()
            .map_err(|_| format!("Invalid voltage in BATTERY_CURVE breakpoint '{}'", pair))?;
        let percent: f64 = percent
            .trim()
            .parse()
            .map_err(|_| format!("Invalid percentage in BATTERY_CURVE breakpoint '{}'", pair))?;
        points.push((voltage, percent));
    }
    BatteryCurve::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StationConfig::from_lookup(lookup_from(&[(
            "DATABASE_URL",
            "postgres://db/weather?sslrootcert=ca.pem",
        )]))
        .unwrap();
        assert_eq!(config.base_interval_secs, 300);
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.battery, BatteryConfig::default());
        assert_eq!(config.battery_adc_path, None);
        assert_eq!(config.battery_actual_voltage, None);
        assert_eq!(config.elevation, 190.0);
        assert_eq!(config.offsets, Offsets::default());
        assert!(!config.debug_mode);
    }

    #[test]
    fn test_overrides() {
        let config = StationConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/weather?sslrootcert=ca.pem"),
            ("SENSOR_READ_INTERVAL", "120"),
            ("DATA_BUFFER_SIZE", "3"),
            ("BATTERY_CURVE", "3.2:0, 3.8:60, 4.1:100"),
            ("TEMP_OFFSET", "-0.5"),
            ("DEBUG_MODE", "true"),
            ("BATTERY_ACTUAL_VOLTAGE", "3.92"),
            ("BATTERY_ADC_PATH", "/sys/bus/iio/devices/iio:device0/in_voltage0_raw"),
        ]))
        .unwrap();
        assert_eq!(config.base_interval_secs, 120);
        assert_eq!(config.buffer_capacity, 3);
        assert_eq!(config.battery.curve.percentage(3.8), 60.0);
        assert_eq!(config.offsets.temperature, -0.5);
        assert!(config.debug_mode);
        assert!(config.battery_adc_path.is_some());
        assert_eq!(config.battery_actual_voltage, Some(3.92));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let url = ("DATABASE_URL", "postgres://db/weather?sslrootcert=ca.pem");
        assert!(StationConfig::from_lookup(lookup_from(&[])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("SENSOR_READ_INTERVAL", "soon")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("MIN_SLEEP_SECS", "7200")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("DATA_BUFFER_SIZE", "0")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_CURVE", "4.2:100,3.0:0")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_CURVE", "3.0-0")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_LOW_VOLTAGE", "3.2")])).is_err());
    }

    #[test]
    fn test_curve_must_span_full_range() {
        let url = ("DATABASE_URL", "postgres://db/weather?sslrootcert=ca.pem");
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_CURVE", "3.2:5,4.1:95")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_CURVE", "3.2:0,4.1:95")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_CURVE", "3.2:0,4.1:100")])).is_ok());
    }

    #[test]
    fn test_rejects_unusable_calibration_voltage() {
        let url = ("DATABASE_URL", "postgres://db/weather?sslrootcert=ca.pem");
        for value in ["NaN", "inf", "0", "-3.9"] {
            assert!(
                StationConfig::from_lookup(lookup_from(&[url, ("BATTERY_ACTUAL_VOLTAGE", value)]))
                    .is_err(),
                "accepted {}",
                value
            );
        }
    }

    #[test]
    fn test_elevation_must_be_below_model_ceiling() {
        let url = ("DATABASE_URL", "postgres://db/weather?sslrootcert=ca.pem");
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("STATION_ELEVATION", "44330")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("STATION_ELEVATION", "NaN")])).is_err());
        assert!(StationConfig::from_lookup(lookup_from(&[url, ("SEA_LEVEL_REFERENCE", "0")])).is_err());
        let config =
            StationConfig::from_lookup(lookup_from(&[url, ("STATION_ELEVATION", "-30")])).unwrap();
        assert_eq!(config.elevation, -30.0);
    }
}
