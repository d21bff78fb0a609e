/// Battery voltage, charge estimate and level classification from raw ADC counts
use log::{info, warn};

use crate::models::{BatteryLevel, BatteryState};

/// Ordered (voltage, percentage) breakpoints of a cell discharge curve
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryCurve {
    points: Vec<(f64, f64)>,
}

impl BatteryCurve {
    /// Voltages must strictly increase and percentages must climb from 0 to 100
    /// without ever decreasing
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, String> {
        if points.len() < 2 {
            return Err("battery curve needs at least two breakpoints".into());
        }
        if points.iter().any(|(v, p)| !v.is_finite() || !p.is_finite()) {
            return Err("battery curve breakpoints must be finite".into());
        }
        let (_, first_p) = points[0];
        let (_, last_p) = points[points.len() - 1];
        if first_p != 0.0 || last_p != 100.0 {
            return Err(format!(
                "battery curve must run from 0% to 100% (got {}% to {}%)",
                first_p, last_p
            ));
        }
        for pair in points.windows(2) {
            let ((v0, p0), (v1, p1)) = (pair[0], pair[1]);
            if v1 <= v0 {
                return Err(format!(
                    "battery curve voltages must increase ({:.3}V then {:.3}V)",
                    v0, v1
                ));
            }
            if p1 < p0 {
                return Err(format!(
                    "battery curve percentages must not decrease ({}% then {}%)",
                    p0, p1
                ));
            }
        }
        Ok(BatteryCurve { points })
    }

    /// Piecewise-linear lookup, clamped to the first and last breakpoint
    pub fn percentage(&self, voltage: f64) -> f64 {
        let (first_v, _) = self.points[0];
        let (last_v, _) = self.points[self.points.len() - 1];
        if voltage.is_nan() || voltage <= first_v {
            return 0.0;
        }
        if voltage >= last_v {
            return 100.0;
        }

        for pair in self.points.windows(2) {
            let ((v0, p0), (v1, p1)) = (pair[0], pair[1]);
            if voltage <= v1 {
                let pct = p0 + (voltage - v0) / (v1 - v0) * (p1 - p0);
                return pct.clamp(0.0, 100.0);
            }
        }
        100.0
    }
}

impl Default for BatteryCurve {
    fn default() -> Self {
        BatteryCurve {
            points: vec![(3.0, 0.0), (3.7, 50.0), (4.2, 100.0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryConfig {
    pub adc_reference: f64,
    pub adc_max_value: u32,
    pub divider_ratio: f64,
    pub curve: BatteryCurve,
    pub low_voltage: f64,
    pub critical_voltage: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        BatteryConfig {
            adc_reference: 3.3,
            adc_max_value: 65535,
            divider_ratio: 2.0,
            curve: BatteryCurve::default(),
            low_voltage: 3.6,
            critical_voltage: 3.4,
        }
    }
}

pub struct BatteryModel {
    config: BatteryConfig,
    calibration_factor: f64,
    last_raw: Option<u32>,
}

impl BatteryModel {
    pub fn new(config: BatteryConfig) -> Self {
        BatteryModel {
            config,
            calibration_factor: 1.0,
            last_raw: None,
        }
    }

    pub fn calibration_factor(&self) -> f64 {
        self.calibration_factor
    }

    pub fn read(&mut self, raw_adc: u32) -> BatteryState {
        self.last_raw = Some(raw_adc);
        let voltage = self.uncalibrated_voltage(raw_adc) * self.calibration_factor;

        BatteryState {
            raw_adc,
            voltage,
            percentage: self.config.curve.percentage(voltage),
            level: self.classify(voltage),
        }
    }

    /// Scale future readings so the last raw sample maps to `actual_voltage`
    ///
    /// Returns the new factor, or `None` when there is no usable sample yet or
    /// `actual_voltage` is not a positive finite value.
    /// The factor lives for the process lifetime only.
    pub fn calibrate(&mut self, actual_voltage: f64) -> Option<f64> {
        if !actual_voltage.is_finite() || actual_voltage <= 0.0 {
            warn!("Cannot calibrate battery to {}V", actual_voltage);
            return None;
        }
        let measured = self.last_raw.map(|raw| self.uncalibrated_voltage(raw))?;
        if measured <= 0.0 {
            warn!("Cannot calibrate battery: measured voltage is 0");
            return None;
        }
        self.calibration_factor = actual_voltage / measured;
        info!(
            "Battery calibration factor set to {:.4}",
            self.calibration_factor
        );
        Some(self.calibration_factor)
    }

    fn uncalibrated_voltage(&self, raw_adc: u32) -> f64 {
        raw_adc as f64 * self.config.adc_reference / self.config.adc_max_value as f64
            * self.config.divider_ratio
    }

    fn classify(&self, voltage: f64) -> BatteryLevel {
        if !voltage.is_finite() || voltage < self.config.critical_voltage {
            BatteryLevel::Critical
        } else if voltage < self.config.low_voltage {
            BatteryLevel::Low
        } else {
            BatteryLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_for(voltage: f64) -> u32 {
        (voltage / 2.0 * 65535.0 / 3.3).round() as u32
    }

    #[test]
    fn test_interpolates_between_breakpoints() {
        let mut model = BatteryModel::new(BatteryConfig::default());
        let state = model.read(32768);
        assert!((state.voltage - 3.3).abs() < 0.001);
        assert!((state.percentage - 21.4).abs() < 0.1, "{}", state.percentage);
        assert_eq!(state.level, BatteryLevel::Critical);
    }

    #[test]
    fn test_percentage_clamps_outside_curve() {
        let curve = BatteryCurve::default();
        assert_eq!(curve.percentage(2.5), 0.0);
        assert_eq!(curve.percentage(3.0), 0.0);
        assert_eq!(curve.percentage(4.2), 100.0);
        assert_eq!(curve.percentage(5.0), 100.0);
        assert!((curve.percentage(3.7) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_is_monotonic() {
        let curve = BatteryCurve::default();
        let mut previous = 0.0;
        for step in 0..=200 {
            let voltage = 2.8 + step as f64 * 0.01;
            let pct = curve.percentage(voltage);
            assert!(pct >= previous, "{}% at {}V after {}%", pct, voltage, previous);
            previous = pct;
        }
    }

    #[test]
    fn test_classification_thresholds() {
        let mut model = BatteryModel::new(BatteryConfig::default());
        assert_eq!(model.read(raw_for(3.3)).level, BatteryLevel::Critical);
        assert_eq!(model.read(raw_for(3.5)).level, BatteryLevel::Low);
        assert_eq!(model.read(raw_for(3.9)).level, BatteryLevel::Normal);
    }

    #[test]
    fn test_calibrate_scales_later_readings() {
        let mut model = BatteryModel::new(BatteryConfig::default());
        assert_eq!(model.calibrate(3.8), None);

        let raw = raw_for(3.6);
        model.read(raw);
        let factor = model.calibrate(3.96).unwrap();
        assert!((factor - 1.1).abs() < 0.001);

        let state = model.read(raw);
        assert!((state.voltage - 3.96).abs() < 0.001);
        assert_eq!(state.level, BatteryLevel::Normal);
    }

    #[test]
    fn test_calibrate_rejects_unusable_voltage() {
        let mut model = BatteryModel::new(BatteryConfig::default());
        let raw = raw_for(3.9);
        model.read(raw);
        for actual in [f64::NAN, f64::INFINITY, 0.0, -3.7] {
            assert_eq!(model.calibrate(actual), None, "accepted {}", actual);
        }
        assert_eq!(model.calibration_factor(), 1.0);
        assert_eq!(model.read(raw).level, BatteryLevel::Normal);
    }

    #[test]
    fn test_non_finite_voltage_is_critical() {
        let model = BatteryModel::new(BatteryConfig::default());
        assert_eq!(model.classify(f64::NAN), BatteryLevel::Critical);
        assert_eq!(model.classify(f64::INFINITY), BatteryLevel::Critical);
        assert_eq!(BatteryCurve::default().percentage(f64::NAN), 0.0);
    }

    #[test]
    fn test_calibrate_rejects_zero_reading() {
        let mut model = BatteryModel::new(BatteryConfig::default());
        model.read(0);
        assert_eq!(model.calibrate(3.7), None);
        assert_eq!(model.calibration_factor(), 1.0);
    }

    #[test]
    fn test_curve_validation() {
        assert!(BatteryCurve::new(vec![(3.0, 0.0)]).is_err());
        assert!(BatteryCurve::new(vec![(3.7, 0.0), (3.0, 100.0)]).is_err());
        assert!(BatteryCurve::new(vec![(3.0, 60.0), (3.7, 50.0)]).is_err());
        assert!(BatteryCurve::new(vec![(3.2, 5.0), (4.1, 95.0)]).is_err());
        assert!(BatteryCurve::new(vec![(3.0, 0.0), (f64::NAN, 50.0), (4.2, 100.0)]).is_err());
        assert!(BatteryCurve::new(vec![(3.0, 0.0), (4.2, 100.0)]).is_ok());
    }
}
