/// Sleep interval and duty selection from the current battery level
use crate::models::{BatteryLevel, BatteryState, ScheduleDecision};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
    pub low_multiplier: f64,
    pub critical_multiplier: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            min_sleep_secs: 60,
            max_sleep_secs: 3600,
            low_multiplier: 2.0,
            critical_multiplier: 4.0,
        }
    }
}

pub struct PowerScheduler {
    config: ScheduleConfig,
}

impl PowerScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        PowerScheduler { config }
    }

    /// NORMAL runs everything, LOW stretches the interval and drops diagnostics,
    /// CRITICAL stretches further and keeps the radio off
    pub fn decide(&self, battery: &BatteryState, base_interval: u64) -> ScheduleDecision {
        match battery.level {
            BatteryLevel::Normal => ScheduleDecision {
                sleep_secs: self.clamp(base_interval as f64),
                skip_transmission: false,
                run_diagnostics: true,
            },
            BatteryLevel::Low => ScheduleDecision {
                sleep_secs: self.clamp(base_interval as f64 * self.config.low_multiplier),
                skip_transmission: false,
                run_diagnostics: false,
            },
            BatteryLevel::Critical => ScheduleDecision {
                sleep_secs: self.clamp(base_interval as f64 * self.config.critical_multiplier),
                skip_transmission: true,
                run_diagnostics: false,
            },
        }
    }

    /// Decision for a cycle that never produced a measurement
    ///
    /// `backoff` stretches the interval after a failed sensor recovery.
    pub fn fallback(&self, base_interval: u64, backoff: bool) -> ScheduleDecision {
        let factor = if backoff { 2.0 } else { 1.0 };
        ScheduleDecision {
            sleep_secs: self.clamp(base_interval as f64 * factor),
            skip_transmission: true,
            run_diagnostics: false,
        }
    }

    fn clamp(&self, secs: f64) -> u64 {
        let secs = if secs.is_finite() { secs.round() } else { f64::MAX };
        // float-to-int casts saturate
        (secs as u64).clamp(self.config.min_sleep_secs, self.config.max_sleep_secs)
    }
}
