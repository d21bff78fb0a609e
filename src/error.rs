/// Error kinds surfaced by one acquisition cycle
///
/// None of these is fatal to the process. The outer control loop logs them
/// and carries on with the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum StationError {
    /// Register bus failed or the device did not identify as expected
    SensorUnavailable(String),
    /// Battery ADC could not be sampled
    BatteryUnavailable(String),
    /// Collector rejected or never acknowledged an entry
    TransmissionFailure(String),
}

impl std::fmt::Display for StationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationError::SensorUnavailable(e) => write!(f, "Sensor unavailable: {}", e),
            StationError::BatteryUnavailable(e) => write!(f, "Battery ADC unavailable: {}", e),
            StationError::TransmissionFailure(e) => write!(f, "Transmission failure: {}", e),
        }
    }
}

impl std::error::Error for StationError {}
