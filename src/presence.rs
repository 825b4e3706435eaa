//! Vehicle presence filter: a per-direction median over the last few range
//! samples, compared against a detection threshold.

use crate::direction::{Direction, DirectionMap};
use crate::sensor::RawRange;

/// Samples kept per direction.
pub const WINDOW_SIZE: usize = 5;
/// Default detection threshold (10 cm).
pub const DEFAULT_DETECTION_THRESHOLD_MM: u16 = 100;

/// Filtered distance in millimetres. "No echo" is stored as [`DistanceSample::NO_ECHO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DistanceSample(u16);

impl DistanceSample {
    pub const NO_ECHO: DistanceSample = DistanceSample(u16::MAX);

    pub fn from_mm(distance_mm: u16) -> Self {
        Self(distance_mm)
    }

    pub fn mm(self) -> u16 {
        self.0
    }
}

impl From<RawRange> for DistanceSample {
    fn from(raw: RawRange) -> Self {
        match raw {
            RawRange::Echo { distance_mm } => DistanceSample::from_mm(distance_mm),
            RawRange::NoEcho => DistanceSample::NO_ECHO,
        }
    }
}

/// Ring buffer of the last [`WINDOW_SIZE`] samples for one direction.
#[derive(Debug, Clone)]
pub struct DistanceHistory {
    samples: [DistanceSample; WINDOW_SIZE],
    next_slot: usize,
}

impl DistanceHistory {
    pub fn new() -> Self {
        Self {
            samples: [DistanceSample::NO_ECHO; WINDOW_SIZE],
            next_slot: 0,
        }
    }

    /// Overwrite the oldest slot.
    pub fn push(&mut self, sample: DistanceSample) {
        self.samples[self.next_slot] = sample;
        self.next_slot = (self.next_slot + 1) % WINDOW_SIZE;
    }

    pub fn median(&self) -> DistanceSample {
        let mut sorted = self.samples;
        sorted.sort_unstable();
        sorted[WINDOW_SIZE / 2]
    }

    pub fn samples(&self) -> &[DistanceSample; WINDOW_SIZE] {
        &self.samples
    }
}

impl Default for DistanceHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct PresenceFilter {
    threshold: DistanceSample,
    histories: DirectionMap<DistanceHistory>,
    present: DirectionMap<bool>,
}

impl PresenceFilter {
    pub fn new(detection_threshold_mm: u16) -> Self {
        Self {
            threshold: DistanceSample::from_mm(detection_threshold_mm),
            histories: DirectionMap::from_fn(|_| DistanceHistory::new()),
            present: DirectionMap::splat(false),
        }
    }

    /// Record a raw reading for `direction` and recompute its presence flag.
    pub fn update(&mut self, direction: Direction, raw: RawRange) -> bool {
        let history = &mut self.histories[direction];
        history.push(DistanceSample::from(raw));
        let median = history.median();
        let present = median.mm() > 0 && median < self.threshold;
        self.present[direction] = present;
        present
    }

    pub fn is_present(&self, direction: Direction) -> bool {
        self.present[direction]
    }

    pub fn presence(&self) -> DirectionMap<bool> {
        self.present
    }

    pub fn active_count(&self) -> usize {
        self.present.values().filter(|present| **present).count()
    }

    pub fn median(&self, direction: Direction) -> DistanceSample {
        self.histories[direction].median()
    }

    pub fn history(&self, direction: Direction) -> &DistanceHistory {
        &self.histories[direction]
    }
}

impl Default for PresenceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DETECTION_THRESHOLD_MM)
    }
}
