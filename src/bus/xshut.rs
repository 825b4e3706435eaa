//! XSHUT sequencing: the four VL53L1X sensors share one I2C bus and boot on
//! the same default address, so they are released one at a time and moved to
//! a unique address each.

use crate::direction::{Direction, DirectionMap};
use crate::error::AppError;
use crate::sensor::{
    ADDRESS_BASE_7BIT, DEFAULT_I2C_ADDRESS_7BIT, I2C_7BIT_MAX, SensorConfig, SensorDriver,
    SensorDriverFactory, SensorInfo, SensorStatus,
};
use std::time::Duration;
use tracing::{debug, info, warn};

// VL53L1X boot time after XSHUT release
const SENSOR_BOOT_DELAY: Duration = Duration::from_millis(2);

pub trait XshutController {
    fn set_all_low(&mut self) -> Result<(), AppError>;
    fn set_high(&mut self, pin: u8) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct AddressedSensor {
    pub direction: Direction,
    pub xshut_pin: u8,
    pub i2c_address: u8,
}

/// Allocate deterministic 7-bit I2C addresses using a base + offset strategy.
pub fn allocate_addresses(
    base_address: u8,
    sensors: &[SensorConfig],
) -> Result<Vec<AddressedSensor>, AppError> {
    if base_address > I2C_7BIT_MAX {
        return Err(AppError::InvalidAddress(base_address));
    }

    sensors
        .iter()
        .enumerate()
        .map(|(offset, sensor)| {
            let address = u8::try_from(offset)
                .ok()
                .and_then(|offset| base_address.checked_add(offset))
                .filter(|address| *address <= I2C_7BIT_MAX)
                .ok_or(AppError::AddressAllocationOverflow)?;
            Ok(AddressedSensor {
                direction: sensor.direction,
                xshut_pin: sensor.xshut_pin,
                i2c_address: address,
            })
        })
        .collect()
}

/// Bring every sensor up on its own address. A sensor that fails any step is
/// reported with an error status; the others are still brought up.
pub fn discover_and_address_sensors<X, F>(
    xshut: &mut X,
    factory: &mut F,
    sensors: &[SensorConfig],
) -> Result<Vec<SensorInfo>, AppError>
where
    X: XshutController,
    F: SensorDriverFactory,
{
    let addressed = allocate_addresses(ADDRESS_BASE_7BIT, sensors)?;
    xshut.set_all_low()?;
    info!(
        count = addressed.len(),
        default_address = format_args!("{DEFAULT_I2C_ADDRESS_7BIT:#04x}"),
        base_address = format_args!("{ADDRESS_BASE_7BIT:#04x}"),
        "Starting XSHUT sequencing"
    );

    let mut results = Vec::with_capacity(addressed.len());
    for sensor in addressed {
        xshut.set_high(sensor.xshut_pin)?;
        std::thread::sleep(SENSOR_BOOT_DELAY);
        debug!(
            direction = %sensor.direction,
            xshut_pin = sensor.xshut_pin,
            "Sensor XSHUT enabled"
        );

        let status = match bring_up(factory, &sensor) {
            Ok(()) => SensorStatus::Ready,
            Err(err) => {
                warn!(
                    direction = %sensor.direction,
                    address = format_args!("{:#04x}", sensor.i2c_address),
                    error = %err,
                    "Sensor bring-up failed"
                );
                SensorStatus::Error {
                    message: err.to_string(),
                }
            }
        };

        results.push(SensorInfo {
            direction: sensor.direction,
            xshut_pin: sensor.xshut_pin,
            i2c_address: sensor.i2c_address,
            status,
        });
    }

    Ok(results)
}

fn bring_up<F>(factory: &mut F, sensor: &AddressedSensor) -> Result<(), AppError>
where
    F: SensorDriverFactory,
{
    let mut driver = factory.create_default()?;
    driver.init_default()?;
    driver.set_address(sensor.i2c_address)?;
    driver.verify()?;
    driver.start_ranging()
}

/// Addresses of the sensors that came up, by direction.
pub fn ready_addresses(sensors: &[SensorInfo]) -> DirectionMap<Option<u8>> {
    DirectionMap::from_fn(|direction| {
        sensors
            .iter()
            .find(|sensor| {
                sensor.direction == direction && matches!(sensor.status, SensorStatus::Ready)
            })
            .map(|sensor| sensor.i2c_address)
    })
}

#[cfg(target_os = "linux")]
pub struct RppalXshutController {
    pins: std::collections::HashMap<u8, rppal::gpio::OutputPin>,
}

#[cfg(target_os = "linux")]
impl RppalXshutController {
    pub fn new(pins: impl IntoIterator<Item = u8>) -> Result<Self, AppError> {
        let gpio = rppal::gpio::Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
        let mut map = std::collections::HashMap::new();
        for pin in pins {
            let output = gpio
                .get(pin)
                .map_err(|err| AppError::Gpio(err.to_string()))?
                .into_output();
            map.insert(pin, output);
        }
        Ok(Self { pins: map })
    }
}

#[cfg(target_os = "linux")]
impl XshutController for RppalXshutController {
    fn set_all_low(&mut self) -> Result<(), AppError> {
        for pin in self.pins.values_mut() {
            pin.set_low();
        }
        Ok(())
    }

    fn set_high(&mut self, pin: u8) -> Result<(), AppError> {
        let output = self
            .pins
            .get_mut(&pin)
            .ok_or_else(|| AppError::Xshut(format!("missing XSHUT pin {pin}")))?;
        output.set_high();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::build_sensor_configs;
    use crate::sensor::mock::{MockFailure, MockSensorBehavior, MockSensorFactory};

    #[derive(Default)]
    struct MockXshut {
        actions: Vec<String>,
    }

    impl XshutController for MockXshut {
        fn set_all_low(&mut self) -> Result<(), AppError> {
            self.actions.push("all_low".to_string());
            Ok(())
        }

        fn set_high(&mut self, pin: u8) -> Result<(), AppError> {
            self.actions.push(format!("high:{pin}"));
            Ok(())
        }
    }

    fn intersection_sensors() -> Vec<SensorConfig> {
        build_sensor_configs(&DirectionMap::from_fn(|direction| match direction {
            Direction::North => 17,
            Direction::South => 27,
            Direction::East => 22,
            Direction::West => 23,
        }))
    }

    #[test]
    fn address_allocation_is_unique() -> Result<(), AppError> {
        let sensors = intersection_sensors();

        let addressed = allocate_addresses(ADDRESS_BASE_7BIT, &sensors)?;
        let mut addresses: Vec<u8> = addressed.iter().map(|sensor| sensor.i2c_address).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), sensors.len());
        Ok(())
    }

    #[test]
    fn address_allocation_rejects_overflow() {
        let result = allocate_addresses(I2C_7BIT_MAX - 1, &intersection_sensors());
        assert!(matches!(result, Err(AppError::AddressAllocationOverflow)));
    }

    #[test]
    fn address_allocation_rejects_invalid_base() {
        let result = allocate_addresses(0x80, &intersection_sensors());
        assert!(matches!(result, Err(AppError::InvalidAddress(0x80))));
    }

    #[test]
    fn sequencing_continues_on_sensor_error() -> Result<(), AppError> {
        let mut factory = MockSensorFactory::new(vec![
            MockSensorBehavior::ok(),
            MockSensorBehavior::failing(MockFailure::Init),
            MockSensorBehavior::failing(MockFailure::Verify),
            MockSensorBehavior::ok(),
        ]);
        let mut xshut = MockXshut::default();

        let results = discover_and_address_sensors(&mut xshut, &mut factory, &intersection_sensors())?;

        assert_eq!(results.len(), 4);
        assert!(matches!(results[0].status, SensorStatus::Ready));
        assert!(matches!(results[1].status, SensorStatus::Error { .. }));
        assert!(matches!(results[2].status, SensorStatus::Error { .. }));
        assert!(matches!(results[3].status, SensorStatus::Ready));
        assert_eq!(
            xshut.actions,
            vec!["all_low", "high:17", "high:27", "high:22", "high:23"]
        );
        Ok(())
    }

    #[test]
    fn ready_addresses_skip_failed_sensors() -> Result<(), AppError> {
        let mut factory = MockSensorFactory::new(vec![
            MockSensorBehavior::ok(),
            MockSensorBehavior::failing(MockFailure::SetAddress),
        ]);
        let mut xshut = MockXshut::default();
        let results = discover_and_address_sensors(&mut xshut, &mut factory, &intersection_sensors())?;

        let addresses = ready_addresses(&results);

        assert_eq!(addresses[Direction::North], Some(ADDRESS_BASE_7BIT));
        assert_eq!(addresses[Direction::South], None);
        assert_eq!(addresses[Direction::East], Some(ADDRESS_BASE_7BIT + 2));
        assert_eq!(addresses[Direction::West], Some(ADDRESS_BASE_7BIT + 3));
        Ok(())
    }
}
