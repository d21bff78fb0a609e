pub mod bme280;
pub mod compensation;
pub mod simulated;

pub use bme280::Bme280;
pub use simulated::SimulatedRegisters;

use crate::error::StationError;
use crate::models::RawSample;

/// Byte-level access to a register-mapped device
pub trait RegisterIo {
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), StationError>;
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), StationError>;
}

/// Source of raw sensor samples for the acquisition loop
pub trait SensorBus {
    /// Read one raw sample along with the calibration it must be compensated with
    fn read_raw_registers(&mut self) -> Result<RawSample, StationError>;

    /// Attempt to recover a misbehaving device
    fn reset(&mut self) -> Result<(), StationError>;
}
