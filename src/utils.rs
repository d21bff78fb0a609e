/// Utility functions for formatting and reporting
use log::info;
use time::{format_description, OffsetDateTime};

use crate::models::{BatteryState, CompensatedReading, ScheduleDecision};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]")
        .ok()
        .and_then(|format| dt.format(&format).ok())
        .unwrap_or_else(|| dt.to_string())
}

/// Round to a fixed number of decimal places for storage and display
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Log the per-cycle summary
pub fn log_reading(reading: &CompensatedReading, battery: &BatteryState) {
    info!(
        "Reading #{} at {}:",
        reading.sequence,
        format_datetime(&reading.captured_at)
    );
    info!("  Temperature: {:.2}°C", reading.temperature);
    info!("  Humidity: {:.1}%", reading.humidity);
    if reading.pressure_is_valid() {
        info!("  Pressure: {:.2} hPa", reading.pressure);
        info!("  Sea level pressure: {:.2} hPa", reading.sea_level_pressure);
        info!("  Altitude: {:.1} m", reading.altitude);
    } else {
        info!("  Pressure: invalid (compensation denominator was zero)");
    }
    match reading.dew_point {
        Some(dew_point) => info!("  Dew point: {:.2}°C", dew_point),
        None => info!("  Dew point: undefined (dry sample)"),
    }
    info!(
        "  Battery: {:.2}V ({} counts), {:.1}%, {}",
        battery.voltage,
        battery.raw_adc,
        battery.percentage,
        battery.level.as_str()
    );
}

pub fn log_decision(decision: &ScheduleDecision) {
    info!(
        "Next cycle in {} s (transmission {})",
        decision.sleep_secs,
        if decision.skip_transmission {
            "skipped"
        } else {
            "enabled"
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_format_datetime() {
        let dt = datetime!(2024-03-07 05:04:09 UTC);
        assert_eq!(format_datetime(&dt), "07.03.2024 - 05:04:09");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(25.0849, 2), 25.08);
        assert_eq!(round_to(71.8955, 1), 71.9);
        assert_eq!(round_to(-3.25, 0), -3.0);
    }
}
