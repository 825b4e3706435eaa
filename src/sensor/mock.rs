use crate::direction::{Direction, DirectionMap};
use crate::error::AppError;
use crate::sensor::{
    DistanceMeasurement, RangeQuality, RawRange, RangeSensor, SensorDriver, SensorDriverFactory,
};
use std::collections::VecDeque;

/// Step of the driver lifecycle a mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Create,
    Init,
    SetAddress,
    Verify,
    ReadDistance,
}

#[derive(Debug, Clone, Copy)]
pub struct MockSensorBehavior {
    pub failure: Option<MockFailure>,
    pub distance_mm: u16,
    pub quality: RangeQuality,
}

impl MockSensorBehavior {
    pub fn ok() -> Self {
        Self {
            failure: None,
            distance_mm: 0,
            quality: RangeQuality::Valid,
        }
    }

    pub fn failing(step: MockFailure) -> Self {
        Self {
            failure: Some(step),
            ..Self::ok()
        }
    }

    pub fn with_reading(distance_mm: u16, quality: RangeQuality) -> Self {
        Self {
            distance_mm,
            quality,
            ..Self::ok()
        }
    }

    fn check(&self, step: MockFailure) -> Result<(), AppError> {
        if self.failure == Some(step) {
            Err(AppError::Sensor(format!("mock {step:?} failed")))
        } else {
            Ok(())
        }
    }
}

/// Hands out drivers with one scripted behavior per creation, then `ok()`.
pub struct MockSensorFactory {
    behaviors: VecDeque<MockSensorBehavior>,
    created_addresses: Vec<u8>,
}

impl MockSensorFactory {
    pub fn new(behaviors: Vec<MockSensorBehavior>) -> Self {
        Self {
            behaviors: behaviors.into(),
            created_addresses: Vec::new(),
        }
    }

    /// Addresses passed to `create_for_address`, in call order.
    pub fn created_addresses(&self) -> &[u8] {
        &self.created_addresses
    }
}

pub struct MockSensorDriver {
    behavior: MockSensorBehavior,
}

impl SensorDriver for MockSensorDriver {
    fn init_default(&mut self) -> Result<(), AppError> {
        self.behavior.check(MockFailure::Init)
    }

    fn set_address(&mut self, _new_address: u8) -> Result<(), AppError> {
        self.behavior.check(MockFailure::SetAddress)
    }

    fn verify(&mut self) -> Result<(), AppError> {
        self.behavior.check(MockFailure::Verify)
    }

    fn start_ranging(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    fn read_distance(&mut self) -> Result<DistanceMeasurement, AppError> {
        self.behavior.check(MockFailure::ReadDistance)?;
        Ok(DistanceMeasurement {
            distance_mm: self.behavior.distance_mm,
            quality: self.behavior.quality,
        })
    }
}

impl SensorDriverFactory for MockSensorFactory {
    type Driver = MockSensorDriver;

    fn create_default(&mut self) -> Result<Self::Driver, AppError> {
        let behavior = self.behaviors.pop_front().unwrap_or_else(MockSensorBehavior::ok);
        behavior.check(MockFailure::Create)?;
        Ok(MockSensorDriver { behavior })
    }

    fn create_for_address(&mut self, address: u8) -> Result<Self::Driver, AppError> {
        self.created_addresses.push(address);
        self.create_default()
    }
}

/// Range sensor replaying scripted readings per direction.
///
/// Once a direction's script runs dry it keeps returning its fallback
/// reading, which starts as `NoEcho`.
#[derive(Debug, Clone)]
pub struct MockRangeSensor {
    scripts: DirectionMap<VecDeque<RawRange>>,
    fallback: DirectionMap<RawRange>,
    reads: usize,
}

impl MockRangeSensor {
    pub fn new() -> Self {
        Self {
            scripts: DirectionMap::from_fn(|_| VecDeque::new()),
            fallback: DirectionMap::splat(RawRange::NoEcho),
            reads: 0,
        }
    }

    /// Report a vehicle at `distance_mm` on `direction` from now on.
    pub fn set_vehicle(&mut self, direction: Direction, distance_mm: u16) {
        self.scripts[direction].clear();
        self.fallback[direction] = RawRange::Echo { distance_mm };
    }

    pub fn clear_vehicle(&mut self, direction: Direction) {
        self.scripts[direction].clear();
        self.fallback[direction] = RawRange::NoEcho;
    }

    pub fn push_reading(&mut self, direction: Direction, reading: RawRange) {
        self.scripts[direction].push_back(reading);
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Default for MockRangeSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeSensor for MockRangeSensor {
    fn read_range(&mut self, direction: Direction) -> RawRange {
        self.reads += 1;
        self.scripts[direction]
            .pop_front()
            .unwrap_or(self.fallback[direction])
    }
}
