//! Adaptive green time: the more approaches are waiting, the shorter each green.

pub const DEFAULT_MIN_GREEN_MS: u64 = 3_000;
pub const DEFAULT_MAX_GREEN_MS: u64 = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveTiming {
    min_green_ms: u64,
    max_green_ms: u64,
    green_ms: u64,
}

impl AdaptiveTiming {
    /// Bounds are reordered if given inverted.
    pub fn new(min_green_ms: u64, max_green_ms: u64) -> Self {
        let (min_green_ms, max_green_ms) = if min_green_ms <= max_green_ms {
            (min_green_ms, max_green_ms)
        } else {
            (max_green_ms, min_green_ms)
        };
        Self {
            min_green_ms,
            max_green_ms,
            green_ms: max_green_ms,
        }
    }

    pub fn green_duration_for(&self, active_directions: usize) -> u64 {
        let share = self.max_green_ms / active_directions.max(1) as u64;
        share.clamp(self.min_green_ms, self.max_green_ms)
    }

    pub fn update(&mut self, active_directions: usize) -> u64 {
        self.green_ms = self.green_duration_for(active_directions);
        self.green_ms
    }

    pub fn green_ms(&self) -> u64 {
        self.green_ms
    }
}

impl Default for AdaptiveTiming {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GREEN_MS, DEFAULT_MAX_GREEN_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn green_splits_max_across_waiting_directions() {
        let timing = AdaptiveTiming::new(3_000, 8_000);
        assert_eq!(timing.green_duration_for(0), 8_000);
        assert_eq!(timing.green_duration_for(1), 8_000);
        assert_eq!(timing.green_duration_for(2), 4_000);
        assert_eq!(timing.green_duration_for(4), 3_000);
    }

    #[test]
    fn update_keeps_no_history() {
        let mut timing = AdaptiveTiming::default();
        timing.update(4);
        assert_eq!(timing.update(0), 8_000);
        assert_eq!(timing.green_ms(), 8_000);
    }

    #[test]
    fn inverted_bounds_are_reordered() {
        let timing = AdaptiveTiming::new(8_000, 3_000);
        assert_eq!(timing.green_duration_for(2), 4_000);
    }
}
