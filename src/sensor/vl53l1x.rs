//! VL53L1X time-of-flight driver on the Raspberry Pi I2C bus.

use crate::error::AppError;
use crate::sensor::{DistanceMeasurement, SensorDriver, SensorDriverFactory};

#[cfg(target_os = "linux")]
use crate::sensor::{DEFAULT_I2C_ADDRESS_7BIT, RangeQuality};
#[cfg(target_os = "linux")]
use rppal::i2c::I2c;
#[cfg(target_os = "linux")]
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::sync::{Arc, Mutex};
#[cfg(target_os = "linux")]
use vl53l1x_uld::{IOVoltage, RangeStatus, VL53L1X};

#[cfg(target_os = "linux")]
type SharedDevice = Arc<Mutex<VL53L1X<I2c>>>;

/// Creates drivers and keeps one device handle per assigned address, so the
/// control loop does not reopen the bus on every read.
#[cfg(target_os = "linux")]
pub struct Vl53l1xFactory {
    io_voltage: IOVoltage,
    cache: HashMap<u8, SharedDevice>,
}

#[cfg(target_os = "linux")]
impl Vl53l1xFactory {
    pub fn new(io_voltage: IOVoltage) -> Self {
        Self {
            io_voltage,
            cache: HashMap::new(),
        }
    }

    fn open(address: u8) -> Result<SharedDevice, AppError> {
        let i2c = I2c::new().map_err(|err| AppError::I2c(err.to_string()))?;
        Ok(Arc::new(Mutex::new(VL53L1X::new(i2c, address))))
    }
}

#[cfg(target_os = "linux")]
impl Default for Vl53l1xFactory {
    fn default() -> Self {
        Self::new(IOVoltage::Volt2_8)
    }
}

#[cfg(target_os = "linux")]
pub struct Vl53l1xDriver {
    device: SharedDevice,
    io_voltage: IOVoltage,
}

#[cfg(target_os = "linux")]
impl Vl53l1xDriver {
    fn with_device<T, E, F>(&self, operation: &str, f: F) -> Result<T, AppError>
    where
        E: std::fmt::Debug,
        F: FnOnce(&mut VL53L1X<I2c>) -> Result<T, E>,
    {
        let mut device = self
            .device
            .lock()
            .map_err(|_| AppError::Sensor("sensor driver lock poisoned".to_string()))?;
        f(&mut *device).map_err(|err| AppError::Sensor(format!("{operation}: {err:?}")))
    }
}

#[cfg(target_os = "linux")]
impl SensorDriver for Vl53l1xDriver {
    fn init_default(&mut self) -> Result<(), AppError> {
        let io_voltage = self.io_voltage;
        self.with_device("init", |device| device.init(io_voltage))
    }

    fn set_address(&mut self, new_address: u8) -> Result<(), AppError> {
        self.with_device("set_address", |device| device.set_address(new_address))
    }

    fn verify(&mut self) -> Result<(), AppError> {
        self.with_device("get_sensor_id", |device| device.get_sensor_id().map(|_| ()))
    }

    fn start_ranging(&mut self) -> Result<(), AppError> {
        self.with_device("start_ranging", |device| device.start_ranging())
    }

    fn read_distance(&mut self) -> Result<DistanceMeasurement, AppError> {
        let result = self.with_device("get_result", |device| device.get_result())?;
        // Clear interrupt to trigger next measurement
        self.with_device("clear_interrupt", |device| device.clear_interrupt())?;
        Ok(DistanceMeasurement {
            distance_mm: result.distance_mm,
            quality: RangeQuality::from(result.status),
        })
    }
}

#[cfg(target_os = "linux")]
impl SensorDriverFactory for Vl53l1xFactory {
    type Driver = Vl53l1xDriver;

    fn create_default(&mut self) -> Result<Self::Driver, AppError> {
        Ok(Vl53l1xDriver {
            device: Self::open(DEFAULT_I2C_ADDRESS_7BIT)?,
            io_voltage: self.io_voltage,
        })
    }

    fn create_for_address(&mut self, address: u8) -> Result<Self::Driver, AppError> {
        let device = match self.cache.get(&address) {
            Some(device) => Arc::clone(device),
            None => {
                let device = Self::open(address)?;
                self.cache.insert(address, Arc::clone(&device));
                device
            }
        };
        Ok(Vl53l1xDriver {
            device,
            io_voltage: self.io_voltage,
        })
    }
}

#[cfg(target_os = "linux")]
impl From<RangeStatus> for RangeQuality {
    fn from(status: RangeStatus) -> Self {
        match status {
            RangeStatus::Valid => Self::Valid,
            RangeStatus::SigmaFailure | RangeStatus::SignalFailure | RangeStatus::LackOfSignal => {
                Self::NoTarget
            }
            RangeStatus::OutOfBounds
            | RangeStatus::MinRangeClipped
            | RangeStatus::MinRangeFail
            | RangeStatus::WrapCheckFail
            | RangeStatus::Wraparound
            | RangeStatus::InvalidRange => Self::OutOfRange,
            _ => Self::Failure,
        }
    }
}

#[cfg(not(target_os = "linux"))]
const UNSUPPORTED: &str = "VL53L1X driver requires Linux/Raspberry Pi";

#[cfg(not(target_os = "linux"))]
#[derive(Default)]
pub struct Vl53l1xFactory;

#[cfg(not(target_os = "linux"))]
pub struct Vl53l1xDriver;

#[cfg(not(target_os = "linux"))]
impl SensorDriver for Vl53l1xDriver {
    fn init_default(&mut self) -> Result<(), AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }

    fn set_address(&mut self, _new_address: u8) -> Result<(), AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }

    fn verify(&mut self) -> Result<(), AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }

    fn start_ranging(&mut self) -> Result<(), AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }

    fn read_distance(&mut self) -> Result<DistanceMeasurement, AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }
}

#[cfg(not(target_os = "linux"))]
impl SensorDriverFactory for Vl53l1xFactory {
    type Driver = Vl53l1xDriver;

    fn create_default(&mut self) -> Result<Self::Driver, AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }

    fn create_for_address(&mut self, _address: u8) -> Result<Self::Driver, AppError> {
        Err(AppError::Sensor(UNSUPPORTED.to_string()))
    }
}
