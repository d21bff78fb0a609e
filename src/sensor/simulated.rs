/// In-memory BME280 register bank for running the station without hardware
use crate::error::StationError;
use crate::models::Calibration;
use crate::sensor::RegisterIo;

const BASE_RAW_TEMPERATURE: i32 = 519_888; // ~25 °C
const BASE_RAW_PRESSURE: i32 = 415_148; // ~1006 hPa
const BASE_RAW_HUMIDITY: i32 = 28_672;

// Drift period in bursts; raw values wander in a triangle wave around the base
const DRIFT_PERIOD: u32 = 48;

pub struct SimulatedRegisters {
    registers: [u8; 256],
    bursts: u32,
}

impl SimulatedRegisters {
    pub fn new() -> Self {
        let mut bank = SimulatedRegisters {
            registers: [0u8; 256],
            bursts: 0,
        };
        bank.registers[0xD0] = 0x60;
        bank.load_calibration(&typical_calibration());
        bank
    }

    #[cfg(test)]
    pub fn calibration(&self) -> Calibration {
        typical_calibration()
    }

    #[cfg(test)]
    pub fn set_register(&mut self, reg: u8, value: u8) {
        self.registers[reg as usize] = value;
    }

    #[cfg(test)]
    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    fn load_calibration(&mut self, cal: &Calibration) {
        let words: [u16; 12] = [
            cal.dig_t1,
            cal.dig_t2 as u16,
            cal.dig_t3 as u16,
            cal.dig_p1,
            cal.dig_p2 as u16,
            cal.dig_p3 as u16,
            cal.dig_p4 as u16,
            cal.dig_p5 as u16,
            cal.dig_p6 as u16,
            cal.dig_p7 as u16,
            cal.dig_p8 as u16,
            cal.dig_p9 as u16,
        ];
        for (i, word) in words.iter().enumerate() {
            let [lo, hi] = word.to_le_bytes();
            self.registers[0x88 + i * 2] = lo;
            self.registers[0x89 + i * 2] = hi;
        }

        self.registers[0xA1] = cal.dig_h1;
        let [lo, hi] = (cal.dig_h2 as u16).to_le_bytes();
        self.registers[0xE1] = lo;
        self.registers[0xE2] = hi;
        self.registers[0xE3] = cal.dig_h3;
        let h4 = cal.dig_h4 as u16 & 0x0FFF;
        let h5 = cal.dig_h5 as u16 & 0x0FFF;
        self.registers[0xE4] = (h4 >> 4) as u8;
        self.registers[0xE5] = (h4 & 0x0F) as u8 | ((h5 & 0x0F) << 4) as u8;
        self.registers[0xE6] = (h5 >> 4) as u8;
        self.registers[0xE7] = cal.dig_h6 as u8;
    }

    fn next_burst(&mut self) -> [u8; 8] {
        let phase = (self.bursts % DRIFT_PERIOD) as i32;
        let half = (DRIFT_PERIOD / 2) as i32;
        let ramp = if phase < half {
            phase
        } else {
            DRIFT_PERIOD as i32 - phase
        };
        let drift = ramp - half / 2;
        self.bursts = self.bursts.wrapping_add(1);

        let temperature = BASE_RAW_TEMPERATURE + drift * 40;
        let pressure = BASE_RAW_PRESSURE - drift * 20;
        let humidity = BASE_RAW_HUMIDITY + drift * 25;

        [
            (pressure >> 12) as u8,
            (pressure >> 4) as u8,
            ((pressure << 4) & 0xF0) as u8,
            (temperature >> 12) as u8,
            (temperature >> 4) as u8,
            ((temperature << 4) & 0xF0) as u8,
            (humidity >> 8) as u8,
            humidity as u8,
        ]
    }
}

impl Default for SimulatedRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for SimulatedRegisters {
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> Result<(), StationError> {
        if start as usize + buf.len() > self.registers.len() {
            return Err(StationError::SensorUnavailable(format!(
                "read of {} bytes at 0x{:02X} runs past the register map",
                buf.len(),
                start
            )));
        }
        if start == 0xF7 && buf.len() == 8 {
            buf.copy_from_slice(&self.next_burst());
            return Ok(());
        }
        let start = start as usize;
        buf.copy_from_slice(&self.registers[start..start + buf.len()]);
        Ok(())
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), StationError> {
        self.registers[reg as usize] = value;
        Ok(())
    }
}

/// Coefficients from the manufacturer's worked example
fn typical_calibration() -> Calibration {
    Calibration {
        dig_t1: 27504,
        dig_t2: 26435,
        dig_t3: -1000,
        dig_p1: 36477,
        dig_p2: -10685,
        dig_p3: 3024,
        dig_p4: 2855,
        dig_p5: 140,
        dig_p6: -7,
        dig_p7: 15500,
        dig_p8: -14600,
        dig_p9: 6000,
        dig_h1: 75,
        dig_h2: 370,
        dig_h3: 0,
        dig_h4: 313,
        dig_h5: 50,
        dig_h6: 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::compensation::compensate;
    use crate::sensor::{Bme280, SensorBus};

    #[test]
    fn test_simulated_readings_are_plausible() {
        let mut sensor = Bme280::open(SimulatedRegisters::new()).unwrap();
        for _ in 0..DRIFT_PERIOD * 2 {
            let raw = sensor.read_raw_registers().unwrap();
            let m = compensate(raw.temperature, raw.pressure, raw.humidity, &raw.calibration);
            assert!(m.temperature > 20.0 && m.temperature < 30.0, "{:?}", m);
            assert!(m.pressure > 990.0 && m.pressure < 1020.0, "{:?}", m);
            assert!(m.humidity > 30.0 && m.humidity < 90.0, "{:?}", m);
        }
    }
}
