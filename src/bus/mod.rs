pub mod readings;
pub mod xshut;

use crate::direction::{Direction, DirectionMap};
use crate::error::AppError;
use crate::sensor::{
    RangeSensor, RawRange, SensorDriverFactory, SensorStatus, build_sensor_configs,
};
use readings::BusRangeSensor;
use tracing::info;
use xshut::{XshutController, discover_and_address_sensors, ready_addresses};

/// Range sensors addressed on the shared bus. Owns the XSHUT lines so the
/// sensors stay powered while they are being read.
pub struct AddressedBus<X, F> {
    _xshut: X,
    sensor: BusRangeSensor<F>,
}

impl<X, F> RangeSensor for AddressedBus<X, F>
where
    F: SensorDriverFactory,
{
    fn read_range(&mut self, direction: Direction) -> RawRange {
        self.sensor.read_range(direction)
    }
}

/// Sequence the sensors wired to `xshut_pins` onto unique addresses.
///
/// Fails only when no sensor at all came up; individual failures leave that
/// approach reading as no echo.
pub fn open_range_bus<X, F>(
    mut xshut: X,
    mut factory: F,
    xshut_pins: &DirectionMap<u8>,
) -> Result<AddressedBus<X, F>, AppError>
where
    X: XshutController,
    F: SensorDriverFactory,
{
    let sensors = discover_and_address_sensors(
        &mut xshut,
        &mut factory,
        &build_sensor_configs(xshut_pins),
    )?;
    let ready = sensors
        .iter()
        .filter(|sensor| matches!(sensor.status, SensorStatus::Ready))
        .count();
    info!(
        total = sensors.len(),
        ready,
        errors = sensors.len() - ready,
        "Sensor discovery complete"
    );
    if ready == 0 {
        return Err(AppError::Sensor("no range sensor came up".to_string()));
    }

    Ok(AddressedBus {
        _xshut: xshut,
        sensor: BusRangeSensor::new(factory, ready_addresses(&sensors)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::RangeQuality;
    use crate::sensor::mock::{MockFailure, MockSensorBehavior, MockSensorFactory};

    struct NoopXshut;

    impl XshutController for NoopXshut {
        fn set_all_low(&mut self) -> Result<(), AppError> {
            Ok(())
        }

        fn set_high(&mut self, _pin: u8) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn pins() -> DirectionMap<u8> {
        DirectionMap::from_fn(|direction| 17 + direction.index() as u8)
    }

    #[test]
    fn failed_sensor_reads_as_no_echo() -> Result<(), AppError> {
        let factory = MockSensorFactory::new(vec![
            MockSensorBehavior::ok(),
            MockSensorBehavior::failing(MockFailure::Verify),
            MockSensorBehavior::ok(),
            MockSensorBehavior::ok(),
            MockSensorBehavior::with_reading(80, RangeQuality::Valid),
        ]);
        let mut bus = open_range_bus(NoopXshut, factory, &pins())?;

        assert_eq!(
            bus.read_range(Direction::North),
            RawRange::Echo { distance_mm: 80 }
        );
        assert_eq!(bus.read_range(Direction::South), RawRange::NoEcho);
        Ok(())
    }

    #[test]
    fn no_ready_sensor_is_an_error() {
        let factory = MockSensorFactory::new(vec![
            MockSensorBehavior::failing(MockFailure::Init);
            Direction::COUNT
        ]);
        let result = open_range_bus(NoopXshut, factory, &pins());
        assert!(matches!(result, Err(AppError::Sensor(_))));
    }
}
