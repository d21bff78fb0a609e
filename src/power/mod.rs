pub mod adc;
pub mod battery;
pub mod scheduler;

pub use adc::{BatteryAdc, IioAdc, SimulatedAdc};
pub use battery::{BatteryConfig, BatteryCurve, BatteryModel};
pub use scheduler::{PowerScheduler, ScheduleConfig};
