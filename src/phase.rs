//! Normal-mode phase state machine.
//!
//! Each direction gets a Green then a Yellow phase, followed by an all-red
//! clearance before the next Green. The controller is pure: it reports
//! transitions and the caller drives the lights.

use crate::direction::{Direction, DirectionMap, LightColor};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

pub const DEFAULT_YELLOW_MS: u64 = 2_000;
pub const DEFAULT_ALL_RED_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "direction", rename_all = "snake_case")]
pub enum Phase {
    Green(Direction),
    Yellow(Direction),
    /// Clearance after `served`'s yellow; every light is red.
    AllRed(Direction),
}

impl Phase {
    pub const INITIAL: Phase = Phase::Green(Direction::North);

    /// The single non-red light of this phase, if any.
    pub fn signal(self) -> Option<(Direction, LightColor)> {
        match self {
            Phase::Green(direction) => Some((direction, LightColor::Green)),
            Phase::Yellow(direction) => Some((direction, LightColor::Yellow)),
            Phase::AllRed(_) => None,
        }
    }

    pub fn lights(self) -> DirectionMap<LightColor> {
        let mut lights = DirectionMap::splat(LightColor::Red);
        if let Some((direction, color)) = self.signal() {
            lights[direction] = color;
        }
        lights
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Green(direction) => write!(f, "{direction}-green"),
            Phase::Yellow(direction) => write!(f, "{direction}-yellow"),
            Phase::AllRed(direction) => write!(f, "all-red after {direction}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSettings {
    pub yellow_ms: u64,
    pub all_red_ms: u64,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            yellow_ms: DEFAULT_YELLOW_MS,
            all_red_ms: DEFAULT_ALL_RED_MS,
        }
    }
}

/// Pick the next direction to serve after `last_served`.
///
/// Scans the other directions in rotation order (ending on `last_served`
/// itself) and returns the first with a waiting vehicle. With no demand
/// anywhere it advances one position, so every direction is revisited within
/// one rotation.
pub fn select_next_green(last_served: Direction, presence: &DirectionMap<bool>) -> Direction {
    (1..=Direction::COUNT)
        .map(|offset| Direction::from_ordinal(last_served.index() + offset))
        .find(|direction| presence[*direction])
        .unwrap_or_else(|| last_served.next())
}

#[derive(Debug, Clone)]
pub struct PhaseController {
    settings: PhaseSettings,
    phase: Phase,
    entered_at_ms: u64,
    last_served: Direction,
}

impl PhaseController {
    pub fn new(settings: PhaseSettings, now_ms: u64) -> Self {
        Self {
            settings,
            phase: Phase::INITIAL,
            entered_at_ms: now_ms,
            last_served: Direction::North,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_served(&self) -> Direction {
        self.last_served
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_at_ms)
    }

    /// True while holding the all-red clearance.
    pub fn is_clearing(&self) -> bool {
        matches!(self.phase, Phase::AllRed(_))
    }

    /// Back to North-Green, as at power-on.
    pub fn reset(&mut self, now_ms: u64) -> Phase {
        self.phase = Phase::INITIAL;
        self.entered_at_ms = now_ms;
        self.last_served = Direction::North;
        self.phase
    }

    /// Advance the state machine. Returns the new phase when a transition happened.
    ///
    /// A green with a waiting vehicle is held past `green_ms` until the
    /// approach empties.
    pub fn tick(
        &mut self,
        now_ms: u64,
        green_ms: u64,
        presence: &DirectionMap<bool>,
    ) -> Option<Phase> {
        let elapsed = self.elapsed_ms(now_ms);
        let next = match self.phase {
            Phase::Green(direction) => {
                if elapsed < green_ms {
                    return None;
                }
                if presence[direction] {
                    debug!(%direction, elapsed_ms = elapsed, "Green extended by waiting vehicle");
                    return None;
                }
                Phase::Yellow(direction)
            }
            Phase::Yellow(direction) if elapsed >= self.settings.yellow_ms => {
                Phase::AllRed(direction)
            }
            Phase::AllRed(served) if elapsed >= self.settings.all_red_ms => {
                let next = select_next_green(served, presence);
                self.last_served = next;
                Phase::Green(next)
            }
            Phase::Yellow(_) | Phase::AllRed(_) => return None,
        };

        info!(from = %self.phase, to = %next, elapsed_ms = elapsed, "Phase transition");
        self.phase = next;
        self.entered_at_ms = now_ms;
        Some(next)
    }
}
