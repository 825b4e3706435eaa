//! Periodic snapshot of the controller, logged as one JSON line.

use crate::direction::{DirectionMap, LightColor};
use crate::emergency::EmergencySession;
use crate::phase::Phase;
use crate::state::IntersectionState;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SirenSnapshot {
    pub frequency_hz: f32,
    pub magnitude: f32,
    pub noise_floor: f32,
    pub hysteresis_count: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub timestamp: String,
    pub uptime_ms: u64,
    pub phase: Phase,
    pub green_ms: u64,
    pub presence: DirectionMap<bool>,
    pub medians_mm: DirectionMap<u16>,
    pub siren: SirenSnapshot,
    pub emergency: Option<EmergencySession>,
    pub lights: DirectionMap<LightColor>,
}

impl DiagnosticReport {
    pub fn capture(state: &IntersectionState, now_ms: u64) -> Self {
        let peak = state.siren.peak();
        Self {
            timestamp: format_timestamp(OffsetDateTime::now_utc()),
            uptime_ms: now_ms,
            phase: state.phase.phase(),
            green_ms: state.timing.green_ms(),
            presence: state.presence.presence(),
            medians_mm: DirectionMap::from_fn(|direction| state.presence.median(direction).mm()),
            siren: SirenSnapshot {
                frequency_hz: peak.frequency_hz,
                magnitude: peak.magnitude,
                noise_floor: state.siren.noise_floor(),
                hysteresis_count: state.siren.hysteresis_count(),
            },
            emergency: state.emergency.session().copied(),
            lights: state.lights(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn log(&self) {
        match self.to_json() {
            Ok(json) => info!(report = %json, "Diagnostics"),
            Err(err) => warn!(error = %err, "Failed to serialize diagnostics"),
        }
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSettings;
    use crate::direction::Direction;
    use crate::sensor::RawRange;

    #[test]
    fn report_serializes_controller_snapshot() -> Result<(), Box<dyn std::error::Error>> {
        let mut state = IntersectionState::new(ControllerSettings::default(), 0);
        for _ in 0..5 {
            state
                .presence
                .update(Direction::West, RawRange::Echo { distance_mm: 60 });
        }

        let report = DiagnosticReport::capture(&state, 1_500);
        let value: serde_json::Value = serde_json::from_str(&report.to_json()?)?;

        assert_eq!(value["uptime_ms"], 1_500);
        assert_eq!(value["phase"]["state"], "green");
        assert_eq!(value["phase"]["direction"], "north");
        assert_eq!(value["presence"][3], true);
        assert_eq!(value["presence"][0], false);
        assert_eq!(value["medians_mm"][3], 60);
        assert_eq!(value["medians_mm"][0], u16::MAX);
        assert!(value["emergency"].is_null());
        Ok(())
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let formatted = format_timestamp(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(formatted, "1970-01-01T00:00:00Z");
    }
}
