/// Fixed-point compensation for the BME280 pressure/temperature/humidity sensor
///
/// The integer sequences follow the manufacturer reference arithmetic step for
/// step, with truncating division everywhere. Pressure and humidity take the
/// fine temperature intermediate, never the rounded centi-degree output.
///
/// Temperature and humidity intermediates are carried in i64. Wherever the
/// 32-bit reference does not overflow the results are identical, and out of
/// range register values cannot panic. Pressure stays in i64 with checked
/// steps; leaving that range yields the same 0 sentinel as a zero denominator.
use crate::models::Calibration;

const RAW_20BIT_MAX: i32 = 0xF_FFFF;
const RAW_16BIT_MAX: i32 = 0xFFFF;

/// Humidity ceiling in Q22.10 before the final scaling step
const HUMIDITY_Q_MAX: i64 = 419_430_400;

/// Standard atmosphere at sea level in hPa
pub const STANDARD_SEA_LEVEL_HPA: f64 = 1013.25;

// Magnus coefficients for water over a liquid surface
const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Physical values from one raw sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Degrees Celsius
    pub temperature: f64,
    /// hPa, or `0.0` when the pressure denominator was zero
    pub pressure: f64,
    /// Relative humidity in percent, always within [0, 100]
    pub humidity: f64,
}

/// Compensate one set of raw registers into physical units
pub fn compensate(
    raw_temp: i32,
    raw_pressure: i32,
    raw_humidity: i32,
    calibration: &Calibration,
) -> Measurement {
    let (centi_celsius, t_fine) = compensate_temperature(raw_temp, calibration);
    let pressure_q24_8 = compensate_pressure(raw_pressure, t_fine, calibration);
    let humidity_q22_10 = compensate_humidity(raw_humidity, t_fine, calibration);

    Measurement {
        temperature: centi_celsius as f64 / 100.0,
        pressure: pressure_q24_8 as f64 / 256.0 / 100.0,
        humidity: (humidity_q22_10 as f64 / 1024.0).clamp(0.0, 100.0),
    }
}

/// Returns (temperature in 0.01 °C, t_fine)
pub fn compensate_temperature(raw_temp: i32, cal: &Calibration) -> (i32, i32) {
    let adc_t = raw_temp.clamp(0, RAW_20BIT_MAX) as i64;
    let t1 = cal.dig_t1 as i64;

    let var1 = ((adc_t / 8 - t1 * 2) * cal.dig_t2 as i64) / 2048;
    let var2 = adc_t / 16 - t1;
    let var2 = (((var2 * var2) / 4096) * cal.dig_t3 as i64) / 16384;

    let t_fine = var1 + var2;
    let temperature = (t_fine * 5 + 128) / 256;
    (temperature as i32, t_fine as i32)
}

/// Returns pressure in Pa as unsigned Q24.8
///
/// 0 when the denominator is zero or an intermediate leaves the 64-bit range.
pub fn compensate_pressure(raw_pressure: i32, t_fine: i32, cal: &Calibration) -> u32 {
    pressure_q24_8(raw_pressure.clamp(0, RAW_20BIT_MAX) as i64, t_fine as i64, cal).unwrap_or(0)
}

fn pressure_q24_8(adc_p: i64, t_fine: i64, cal: &Calibration) -> Option<u32> {
    let (p1, p2, p3) = (cal.dig_p1 as i64, cal.dig_p2 as i64, cal.dig_p3 as i64);
    let (p4, p5, p6) = (cal.dig_p4 as i64, cal.dig_p5 as i64, cal.dig_p6 as i64);
    let (p7, p8, p9) = (cal.dig_p7 as i64, cal.dig_p8 as i64, cal.dig_p9 as i64);

    let var1 = t_fine - 128_000;
    let var2 = var1.checked_mul(var1)?.checked_mul(p6)?;
    let var2 = var2.checked_add(var1.checked_mul(p5)?.checked_mul(131_072)?)?;
    let var2 = var2.checked_add(p4 * 34_359_738_368)?;
    let var1 = (var1.checked_mul(var1)?.checked_mul(p3)? / 256)
        .checked_add(var1.checked_mul(p2)?.checked_mul(4096)?)?;
    let var1 = (1_i64 << 47).checked_add(var1)?.checked_mul(p1)? / 8_589_934_592;

    if var1 == 0 {
        return None;
    }

    let p = 1_048_576 - adc_p;
    let p = p
        .checked_mul(2_147_483_648)?
        .checked_sub(var2)?
        .checked_mul(3125)?
        .checked_div(var1)?;
    let var1 = p9.checked_mul(p / 8192)?.checked_mul(p / 8192)? / 33_554_432;
    let var2 = p8.checked_mul(p)? / 524_288;
    let p = p.checked_add(var1)?.checked_add(var2)? / 256 + p7 * 16;

    u32::try_from(p).ok()
}

/// Returns relative humidity as unsigned Q22.10 (value / 1024 = %RH)
pub fn compensate_humidity(raw_humidity: i32, t_fine: i32, cal: &Calibration) -> u32 {
    let adc_h = raw_humidity.clamp(0, RAW_16BIT_MAX) as i64;

    let var1 = t_fine as i64 - 76_800;
    let var2 = adc_h * 16_384;
    let var3 = cal.dig_h4 as i64 * 1_048_576;
    let var4 = cal.dig_h5 as i64 * var1;
    let var5 = (var2 - var3 - var4 + 16_384) / 32_768;

    let var2 = (var1 * cal.dig_h6 as i64) / 1024;
    let var3 = (var1 * cal.dig_h3 as i64) / 2048;
    let var4 = (var2 * (var3 + 32_768)) / 1024 + 2_097_152;
    let var2 = (var4 * cal.dig_h2 as i64 + 8192) / 16_384;
    // Saturating from here on so extreme coefficients pin to the clamp bounds
    let var3 = var5.saturating_mul(var2);
    let var4 = (var3 / 32_768).saturating_mul(var3 / 32_768) / 128;
    let var5 = var3
        .saturating_sub(var4.saturating_mul(cal.dig_h1 as i64) / 16)
        .clamp(0, HUMIDITY_Q_MAX);

    (var5 / 4096) as u32
}

/// Dew point in °C using the Magnus approximation
///
/// `None` for a completely dry sample, where the logarithm is undefined.
pub fn dew_point(temperature: f64, humidity: f64) -> Option<f64> {
    if humidity <= 0.0 {
        return None;
    }
    let gamma = (MAGNUS_A * temperature) / (MAGNUS_B + temperature) + (humidity / 100.0).ln();
    let dew_point = (MAGNUS_B * gamma) / (MAGNUS_A - gamma);
    dew_point.is_finite().then_some(dew_point)
}

/// Reduce station pressure to sea level for a station at `elevation` meters
pub fn sea_level_pressure(pressure: f64, elevation: f64) -> f64 {
    let base = 1.0 - elevation / 44_330.0;
    if pressure <= 0.0 || base <= 0.0 {
        return 0.0;
    }
    pressure / base.powf(5.255)
}

/// Altitude in meters implied by `pressure` against a sea-level reference
pub fn altitude(pressure: f64, sea_level_reference: f64) -> f64 {
    if pressure <= 0.0 || sea_level_reference <= 0.0 {
        return 0.0;
    }
    44_330.0 * (1.0 - (pressure / sea_level_reference).powf(0.1903))
}
