use crate::direction::{Direction, DirectionMap};
use crate::error::AppError;
use crate::sensor::{RangeQuality, RangeSensor, RawRange, SensorDriver, SensorDriverFactory};
use tracing::{debug, warn};

pub const MIN_DISTANCE_MM: u16 = 40;
pub const MAX_DISTANCE_MM: u16 = 4000;

/// Range sensor backed by one addressed ranging driver per direction.
///
/// A direction whose sensor failed discovery always reads as no echo.
pub struct BusRangeSensor<F> {
    factory: F,
    addresses: DirectionMap<Option<u8>>,
}

impl<F> BusRangeSensor<F>
where
    F: SensorDriverFactory,
{
    pub fn new(factory: F, addresses: DirectionMap<Option<u8>>) -> Self {
        Self { factory, addresses }
    }

    fn read_measurement(&mut self, direction: Direction) -> Result<RawRange, AppError> {
        let address = self.addresses[direction].ok_or(AppError::MissingSensor(direction))?;
        let mut driver = self.factory.create_for_address(address)?;
        let measurement = driver.read_distance()?;
        let range = validate_measurement(measurement.distance_mm, measurement.quality);
        if range == RawRange::NoEcho {
            debug!(
                %direction,
                distance_mm = measurement.distance_mm,
                quality = ?measurement.quality,
                "Reading discarded as no echo"
            );
        }
        Ok(range)
    }
}

impl<F> RangeSensor for BusRangeSensor<F>
where
    F: SensorDriverFactory,
{
    fn read_range(&mut self, direction: Direction) -> RawRange {
        match self.read_measurement(direction) {
            Ok(range) => range,
            Err(AppError::MissingSensor(_)) => RawRange::NoEcho,
            Err(err) => {
                warn!(%direction, error = %err, "Failed to read distance");
                RawRange::NoEcho
            }
        }
    }
}

/// Anything the sensor cannot vouch for is treated as an empty approach.
/// A valid reading closer than the minimum range is pinned to it, so a
/// vehicle right at the sensor still counts as present.
pub fn validate_measurement(distance_mm: u16, quality: RangeQuality) -> RawRange {
    if !quality.is_valid() || distance_mm > MAX_DISTANCE_MM {
        return RawRange::NoEcho;
    }
    RawRange::Echo {
        distance_mm: distance_mm.max(MIN_DISTANCE_MM),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::mock::{MockFailure, MockSensorBehavior, MockSensorFactory};

    fn all_addressed() -> DirectionMap<Option<u8>> {
        DirectionMap::from_fn(|direction| Some(0x30 + direction.index() as u8))
    }

    #[test]
    fn valid_reading_is_an_echo() {
        let factory =
            MockSensorFactory::new(vec![MockSensorBehavior::with_reading(120, RangeQuality::Valid)]);
        let mut sensor = BusRangeSensor::new(factory, all_addressed());

        assert_eq!(
            sensor.read_range(Direction::East),
            RawRange::Echo { distance_mm: 120 }
        );
        assert_eq!(sensor.factory.created_addresses(), &[0x32]);
    }

    #[test]
    fn invalid_readings_become_no_echo() {
        let factory = MockSensorFactory::new(vec![
            MockSensorBehavior::with_reading(20, RangeQuality::NoTarget),
            MockSensorBehavior::with_reading(200, RangeQuality::NoTarget),
            MockSensorBehavior::with_reading(4500, RangeQuality::Valid),
        ]);
        let mut sensor = BusRangeSensor::new(factory, all_addressed());

        assert_eq!(sensor.read_range(Direction::North), RawRange::NoEcho);
        assert_eq!(sensor.read_range(Direction::South), RawRange::NoEcho);
        assert_eq!(sensor.read_range(Direction::West), RawRange::NoEcho);
    }

    #[test]
    fn driver_errors_become_no_echo() {
        let factory = MockSensorFactory::new(vec![
            MockSensorBehavior::failing(MockFailure::Create),
            MockSensorBehavior::failing(MockFailure::ReadDistance),
            MockSensorBehavior::with_reading(250, RangeQuality::Valid),
        ]);
        let mut sensor = BusRangeSensor::new(factory, all_addressed());

        assert_eq!(sensor.read_range(Direction::North), RawRange::NoEcho);
        assert_eq!(sensor.read_range(Direction::North), RawRange::NoEcho);
        assert_eq!(
            sensor.read_range(Direction::North),
            RawRange::Echo { distance_mm: 250 }
        );
    }

    #[test]
    fn missing_sensor_reads_no_echo_without_touching_the_bus() {
        let mut addresses = all_addressed();
        addresses[Direction::West] = None;
        let mut sensor = BusRangeSensor::new(MockSensorFactory::new(Vec::new()), addresses);

        assert_eq!(sensor.read_range(Direction::West), RawRange::NoEcho);
        assert!(sensor.factory.created_addresses().is_empty());
    }

    #[test]
    fn range_limits_are_inclusive() {
        assert_eq!(
            validate_measurement(MIN_DISTANCE_MM, RangeQuality::Valid),
            RawRange::Echo { distance_mm: MIN_DISTANCE_MM }
        );
        assert_eq!(
            validate_measurement(MAX_DISTANCE_MM, RangeQuality::Valid),
            RawRange::Echo { distance_mm: MAX_DISTANCE_MM }
        );
        assert_eq!(validate_measurement(MAX_DISTANCE_MM + 1, RangeQuality::Valid), RawRange::NoEcho);
    }

    #[test]
    fn too_close_reading_is_pinned_to_minimum_range() {
        let factory =
            MockSensorFactory::new(vec![MockSensorBehavior::with_reading(12, RangeQuality::Valid)]);
        let mut sensor = BusRangeSensor::new(factory, all_addressed());

        assert_eq!(
            sensor.read_range(Direction::South),
            RawRange::Echo { distance_mm: MIN_DISTANCE_MM }
        );
        assert_eq!(validate_measurement(0, RangeQuality::Valid), RawRange::Echo {
            distance_mm: MIN_DISTANCE_MM
        });
    }
}
