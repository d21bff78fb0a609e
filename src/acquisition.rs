/// One measurement cycle: sample, compensate, schedule, buffer and relay
use std::time::Instant;

use log::{error, info, warn};
use time::OffsetDateTime;

use crate::config::StationConfig;
use crate::error::StationError;
use crate::models::{BatteryState, BufferedEntry, CompensatedReading, ScheduleDecision};
use crate::power::{BatteryAdc, BatteryModel, PowerScheduler};
use crate::sensor::compensation::{self, Measurement};
use crate::sensor::SensorBus;
use crate::transmission::{TransmissionBuffer, Transport};
use crate::utils::format_datetime;

/// Outcome of one cycle, handed to the outer loop
#[derive(Debug)]
pub struct CycleReport {
    pub decision: ScheduleDecision,
    pub reading: Result<CompensatedReading, StationError>,
    pub battery: Option<BatteryState>,
    pub delivered: usize,
}

pub struct AcquisitionLoop<'a, S: SensorBus, A: BatteryAdc> {
    config: &'a StationConfig,
    sensor: S,
    adc: A,
    battery: BatteryModel,
    scheduler: PowerScheduler,
    buffer: TransmissionBuffer,
    next_sequence: u64,
    consecutive_failures: u32,
    failed_cycles: u64,
    started_at: Instant,
}

impl<'a, S: SensorBus, A: BatteryAdc> AcquisitionLoop<'a, S, A> {
    pub fn new(config: &'a StationConfig, sensor: S, adc: A) -> Self {
        AcquisitionLoop {
            config,
            sensor,
            adc,
            battery: BatteryModel::new(config.battery.clone()),
            scheduler: PowerScheduler::new(config.schedule),
            buffer: TransmissionBuffer::new(config.buffer_capacity),
            next_sequence: 0,
            consecutive_failures: 0,
            failed_cycles: 0,
            started_at: Instant::now(),
        }
    }

    /// Run one cycle to completion; never sleeps
    pub async fn run_cycle<T: Transport>(&mut self, transport: &mut T) -> CycleReport {
        let raw = match self.sensor.read_raw_registers() {
            Ok(raw) => raw,
            Err(e) => return self.abort_cycle(e),
        };
        let raw_adc = match self.adc.read_raw() {
            Ok(raw_adc) => raw_adc,
            Err(e) => return self.abort_cycle(e),
        };
        self.consecutive_failures = 0;

        let measurement = compensation::compensate(
            raw.temperature,
            raw.pressure,
            raw.humidity,
            &raw.calibration,
        );
        let reading = self.build_reading(&measurement);
        let battery = self.battery.read(raw_adc);
        let decision = self
            .scheduler
            .decide(&battery, self.config.base_interval_secs);

        let mut delivered = 0;
        if decision.skip_transmission {
            warn!(
                "Battery {} at {:.2}V, transmission skipped",
                battery.level.as_str(),
                battery.voltage
            );
        } else {
            self.buffer.enqueue(BufferedEntry {
                reading: reading.clone(),
                battery,
                error_count: self.failed_cycles,
                uptime_secs: self.started_at.elapsed().as_secs(),
                enqueued_at: OffsetDateTime::now_utc(),
            });
            delivered = self.buffer.flush(transport).await;
            if self.buffer.size() > 0 {
                info!(
                    "Delivered {} readings, {} still buffered",
                    delivered,
                    self.buffer.size()
                );
            }
        }

        if decision.run_diagnostics && self.config.debug_mode {
            self.log_diagnostics();
        }

        CycleReport {
            decision,
            reading: Ok(reading),
            battery: Some(battery),
            delivered,
        }
    }

    /// Final delivery pass before shutdown
    pub async fn drain<T: Transport>(&mut self, transport: &mut T) -> usize {
        if self.buffer.size() == 0 {
            return 0;
        }
        info!("Attempting to send {} buffered readings", self.buffer.size());
        self.buffer.flush(transport).await
    }

    pub fn calibrate_battery(&mut self, actual_voltage: f64) -> Option<f64> {
        self.battery.calibrate(actual_voltage)
    }

    pub fn buffer(&self) -> &TransmissionBuffer {
        &self.buffer
    }

    fn build_reading(&mut self, m: &Measurement) -> CompensatedReading {
        let offsets = &self.config.offsets;
        let temperature = m.temperature + offsets.temperature;
        let humidity = (m.humidity + offsets.humidity).clamp(0.0, 100.0);
        // Keep the invalid-pressure sentinel intact
        let pressure = if m.pressure > 0.0 {
            m.pressure + offsets.pressure
        } else {
            0.0
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        CompensatedReading {
            sequence,
            captured_at: OffsetDateTime::now_utc(),
            temperature,
            pressure,
            humidity,
            dew_point: compensation::dew_point(temperature, humidity),
            sea_level_pressure: compensation::sea_level_pressure(pressure, self.config.elevation),
            altitude: compensation::altitude(pressure, self.config.sea_level_reference),
        }
    }

    fn abort_cycle(&mut self, e: StationError) -> CycleReport {
        self.consecutive_failures += 1;
        self.failed_cycles += 1;
        error!(
            "Cycle aborted ({} consecutive failures): {}",
            self.consecutive_failures, e
        );

        let mut backoff = false;
        if self.consecutive_failures >= self.config.max_sensor_failures {
            warn!("Too many sensor failures, attempting sensor reset");
            match self.sensor.reset() {
                Ok(()) => {
                    info!("Sensor reset succeeded");
                    self.consecutive_failures = 0;
                }
                Err(reset_err) => {
                    error!("Sensor reset failed: {}", reset_err);
                    backoff = true;
                }
            }
        }

        CycleReport {
            decision: self
                .scheduler
                .fallback(self.config.base_interval_secs, backoff),
            reading: Err(e),
            battery: None,
            delivered: 0,
        }
    }

    fn log_diagnostics(&self) {
        info!("Diagnostics:");
        info!(
            "  Buffer: {}/{} (full: {})",
            self.buffer.size(),
            self.buffer.capacity(),
            self.buffer.is_full()
        );
        if let Some(oldest) = self.buffer.iter().next() {
            info!(
                "  Oldest pending: #{} queued at {}",
                oldest.reading.sequence,
                format_datetime(&oldest.enqueued_at)
            );
        }
        info!("  Evicted on overflow: {}", self.buffer.evicted());
        info!("  Delivered since start: {}", self.buffer.delivered());
        info!("  Readings taken: {}", self.next_sequence);
        info!("  Failed cycles: {}", self.failed_cycles);
        info!(
            "  Battery calibration factor: {:.4}",
            self.battery.calibration_factor()
        );
    }
}
