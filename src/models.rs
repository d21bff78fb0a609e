use time::OffsetDateTime;

/// Factory calibration coefficients, read once when the sensor is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

/// One burst of raw register values plus the coefficients they belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub temperature: i32,
    pub pressure: i32,
    pub humidity: i32,
    pub calibration: Calibration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompensatedReading {
    pub sequence: u64,
    pub captured_at: OffsetDateTime,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    /// `None` for a completely dry sample
    pub dew_point: Option<f64>,
    pub sea_level_pressure: f64,
    pub altitude: f64,
}

impl CompensatedReading {
    /// `false` when pressure compensation hit its zero-denominator sentinel
    pub fn pressure_is_valid(&self) -> bool {
        self.pressure > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    Normal,
    Low,
    Critical,
}

impl BatteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryLevel::Normal => "NORMAL",
            BatteryLevel::Low => "LOW",
            BatteryLevel::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    pub raw_adc: u32,
    pub voltage: f64,
    pub percentage: f64,
    pub level: BatteryLevel,
}

/// A reading waiting in the transmission buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedEntry {
    pub reading: CompensatedReading,
    pub battery: BatteryState,
    /// Failed cycles since startup, as of this reading
    pub error_count: u64,
    pub uptime_secs: u64,
    pub enqueued_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub sleep_secs: u64,
    pub skip_transmission: bool,
    pub run_diagnostics: bool,
}
