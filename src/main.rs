mod acquisition;
mod config;
mod error;
mod models;
mod power;
mod sensor;
mod transmission;
mod utils;

use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

use acquisition::AcquisitionLoop;
use config::StationConfig;
use power::{BatteryAdc, IioAdc, SimulatedAdc};
use sensor::{Bme280, SensorBus, SimulatedRegisters};
use transmission::PostgresCollector;
use utils::{log_decision, log_reading};

// Cell voltage reported when no ADC channel is configured
const SIMULATED_CELL_VOLTAGE: f64 = 3.9;

async fn main_loop<S: SensorBus, A: BatteryAdc>(
    config: &StationConfig,
    sensor: S,
    adc: A,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting weather station relay");

    let mut station = AcquisitionLoop::new(config, sensor, adc);
    let mut collector = PostgresCollector::new(&config.station_name, &config.database_url);
    let mut pending_calibration = config.battery_actual_voltage;

    loop {
        let report = station.run_cycle(&mut collector).await;

        match (&report.reading, &report.battery) {
            (Ok(reading), Some(battery)) => {
                log_reading(reading, battery);
                if report.delivered > 0 {
                    info!("Delivered {} readings to collector", report.delivered);
                }
                if let Some(actual) = pending_calibration.take() {
                    if station.calibrate_battery(actual).is_none() {
                        warn!("Battery calibration to {:.3}V skipped", actual);
                    }
                }
            }
            (Err(e), _) => warn!("No reading this cycle: {}", e),
            (Ok(_), None) => {}
        }
        log_decision(&report.decision);

        // Wait until next cycle, or flush what we can and leave
        tokio::select! {
            _ = sleep(Duration::from_secs(report.decision.sleep_secs)) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested");
                let sent = station.drain(&mut collector).await;
                info!(
                    "Sent {} buffered readings, {} left unsent",
                    sent,
                    station.buffer().size()
                );
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let sensor = match Bme280::open(SimulatedRegisters::new()) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("Failed to initialize BME280: {}", e);
            return Err(e.into());
        }
    };

    debug!("BME280 calibration: {:?}", sensor.calibration());

    // Handle Ctrl+C gracefully
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the station is not shut down
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });

    let result = match &config.battery_adc_path {
        Some(path) => {
            info!("Reading battery from {}", path);
            main_loop(&config, sensor, IioAdc::new(path), rx).await
        }
        None => {
            info!("No BATTERY_ADC_PATH set, simulating a {:.1}V cell", SIMULATED_CELL_VOLTAGE);
            let adc = SimulatedAdc::new(
                SIMULATED_CELL_VOLTAGE,
                config.battery.adc_reference,
                config.battery.adc_max_value,
                config.battery.divider_ratio,
            );
            main_loop(&config, sensor, adc, rx).await
        }
    };

    match result {
        Ok(_) => info!("Program terminated by user. Exiting gracefully."),
        Err(e) => error!("Fatal error: {}", e),
    }

    Ok(())
}
