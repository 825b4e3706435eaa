use crate::direction::{Direction, DirectionMap};
use crate::error::AppError;

pub mod mock;
pub mod vl53l1x;

// VL53L1X default is 0x52 in 8-bit notation; use 0x29 for 7-bit addressing.
pub const DEFAULT_I2C_ADDRESS_7BIT: u8 = 0x29;
pub const ADDRESS_BASE_7BIT: u8 = 0x30;
pub const I2C_7BIT_MAX: u8 = 0x77;

/// Raw range reading for one approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRange {
    Echo { distance_mm: u16 },
    NoEcho,
}

/// Source of raw range readings, one per approach.
pub trait RangeSensor {
    /// Never fails: anything unusable is reported as [`RawRange::NoEcho`].
    fn read_range(&mut self, direction: Direction) -> RawRange;
}

impl<T: RangeSensor + ?Sized> RangeSensor for Box<T> {
    fn read_range(&mut self, direction: Direction) -> RawRange {
        (**self).read_range(direction)
    }
}

#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub direction: Direction,
    pub xshut_pin: u8,
}

#[derive(Debug, Clone)]
pub enum SensorStatus {
    Ready,
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub direction: Direction,
    pub xshut_pin: u8,
    pub i2c_address: u8,
    pub status: SensorStatus,
}

/// Driver-reported quality of a ranging result, folded into the cases the
/// controller distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeQuality {
    Valid,
    /// Too little return signal; usually nothing in range.
    NoTarget,
    /// Result outside what the sensor can resolve.
    OutOfRange,
    Failure,
}

impl RangeQuality {
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceMeasurement {
    pub distance_mm: u16,
    pub quality: RangeQuality,
}

pub trait SensorDriver {
    fn init_default(&mut self) -> Result<(), AppError>;
    fn set_address(&mut self, new_address: u8) -> Result<(), AppError>;
    fn verify(&mut self) -> Result<(), AppError>;
    /// Start continuous ranging mode. Must be called after init before reading distances.
    fn start_ranging(&mut self) -> Result<(), AppError>;
    fn read_distance(&mut self) -> Result<DistanceMeasurement, AppError>;
}

pub trait SensorDriverFactory {
    type Driver: SensorDriver;

    fn create_default(&mut self) -> Result<Self::Driver, AppError>;
    fn create_for_address(&mut self, address: u8) -> Result<Self::Driver, AppError>;
}

/// Sensor configs in direction order from the per-direction XSHUT pins.
pub fn build_sensor_configs(xshut_pins: &DirectionMap<u8>) -> Vec<SensorConfig> {
    xshut_pins
        .iter()
        .map(|(direction, pin)| SensorConfig {
            direction,
            xshut_pin: *pin,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_configs_follow_direction_order() {
        let pins = DirectionMap::from_fn(|direction| 17 + direction.index() as u8);
        let configs = build_sensor_configs(&pins);

        assert_eq!(configs.len(), Direction::COUNT);
        assert_eq!(configs[2].direction, Direction::East);
        assert_eq!(configs[2].xshut_pin, 19);
    }
}
