/// BME280 register map decoding on top of an abstract register bus
use log::{debug, info};

use crate::error::StationError;
use crate::models::{Calibration, RawSample};
use crate::sensor::{RegisterIo, SensorBus};

const REG_CALIB_T_P: u8 = 0x88; // dig_T1 .. dig_P9, 24 bytes
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_H2: u8 = 0xE1; // dig_H2 .. dig_H6, 7 bytes
const REG_CHIP_ID: u8 = 0xD0;
const REG_SOFT_RESET: u8 = 0xE0;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7; // press[3] temp[3] hum[2]

const CHIP_ID: u8 = 0x60;
const SOFT_RESET_WORD: u8 = 0xB6;

const OVERSAMPLE_X1: u8 = 0x01;
const OVERSAMPLE_X2: u8 = 0x02;
const OVERSAMPLE_X16: u8 = 0x05;
const MODE_NORMAL: u8 = 0x03;
const CONFIG_STANDBY_1000MS: u8 = 0xA0;

/// An opened BME280 with its factory calibration
pub struct Bme280<I: RegisterIo> {
    io: I,
    calibration: Calibration,
}

impl<I: RegisterIo> Bme280<I> {
    /// Verify the chip ID, load calibration and start normal-mode sampling
    pub fn open(mut io: I) -> Result<Self, StationError> {
        let mut id = [0u8; 1];
        io.read_registers(REG_CHIP_ID, &mut id)?;
        if id[0] != CHIP_ID {
            return Err(StationError::SensorUnavailable(format!(
                "unexpected chip ID 0x{:02X}, expected 0x{:02X}",
                id[0], CHIP_ID
            )));
        }

        let calibration = read_calibration(&mut io)?;
        debug!("BME280 calibration: {:?}", calibration);

        let mut sensor = Bme280 { io, calibration };
        sensor.configure()?;
        info!("BME280 ready");
        Ok(sensor)
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    fn configure(&mut self) -> Result<(), StationError> {
        // ctrl_hum only latches after a write to ctrl_meas
        self.io.write_register(REG_CTRL_HUM, OVERSAMPLE_X1)?;
        self.io.write_register(
            REG_CTRL_MEAS,
            (OVERSAMPLE_X2 << 5) | (OVERSAMPLE_X16 << 2) | MODE_NORMAL,
        )?;
        self.io.write_register(REG_CONFIG, CONFIG_STANDBY_1000MS)
    }
}

impl<I: RegisterIo> SensorBus for Bme280<I> {
    fn read_raw_registers(&mut self) -> Result<RawSample, StationError> {
        let mut data = [0u8; 8];
        self.io.read_registers(REG_DATA, &mut data)?;
        Ok(unpack_sample(&data, self.calibration))
    }

    fn reset(&mut self) -> Result<(), StationError> {
        self.io.write_register(REG_SOFT_RESET, SOFT_RESET_WORD)?;
        self.configure()
    }
}

fn read_calibration<I: RegisterIo>(io: &mut I) -> Result<Calibration, StationError> {
    let mut tp = [0u8; 24];
    io.read_registers(REG_CALIB_T_P, &mut tp)?;
    let mut h1 = [0u8; 1];
    io.read_registers(REG_CALIB_H1, &mut h1)?;
    let mut h = [0u8; 7];
    io.read_registers(REG_CALIB_H2, &mut h)?;
    Ok(decode_calibration(&tp, h1[0], &h))
}

/// Decode the two calibration blocks into coefficients
///
/// H4 and H5 are 12-bit signed values sharing the nibbles of 0xE5.
pub fn decode_calibration(tp: &[u8; 24], h1: u8, h: &[u8; 7]) -> Calibration {
    let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
    let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

    Calibration {
        dig_t1: u16_at(0),
        dig_t2: i16_at(2),
        dig_t3: i16_at(4),
        dig_p1: u16_at(6),
        dig_p2: i16_at(8),
        dig_p3: i16_at(10),
        dig_p4: i16_at(12),
        dig_p5: i16_at(14),
        dig_p6: i16_at(16),
        dig_p7: i16_at(18),
        dig_p8: i16_at(20),
        dig_p9: i16_at(22),
        dig_h1: h1,
        dig_h2: i16::from_le_bytes([h[0], h[1]]),
        dig_h3: h[2],
        dig_h4: sign_extend_12((h[3] as u16) << 4 | (h[4] & 0x0F) as u16),
        dig_h5: sign_extend_12((h[5] as u16) << 4 | (h[4] >> 4) as u16),
        dig_h6: h[6] as i8,
    }
}

fn sign_extend_12(value: u16) -> i16 {
    ((value << 4) as i16) >> 4
}

/// Unpack the 8-byte data burst: 20-bit pressure and temperature, 16-bit humidity
pub fn unpack_sample(data: &[u8; 8], calibration: Calibration) -> RawSample {
    let pressure = (data[0] as i32) << 12 | (data[1] as i32) << 4 | (data[2] as i32) >> 4;
    let temperature = (data[3] as i32) << 12 | (data[4] as i32) << 4 | (data[5] as i32) >> 4;
    let humidity = (data[6] as i32) << 8 | data[7] as i32;

    RawSample {
        temperature,
        pressure,
        humidity,
        calibration,
    }
}
