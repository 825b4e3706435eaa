//! Emergency arbitration: RFID- and siren-triggered override sessions.

use crate::direction::Direction;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_ALERT_DURATION_MS: u64 = 10_000;

/// Tag identifier prefixes with a dedicated direction. Any other prefix falls
/// back to `prefix mod 4`.
pub const TAG_DIRECTIONS: [(u8, Direction); 4] = [
    (0xB6, Direction::North),
    (0xA2, Direction::South),
    (0xC1, Direction::East),
    (0xD3, Direction::West),
];

/// Raw identifier bytes read from a presented tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagId(Vec<u8>);

impl TagId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// First identifier byte. An empty identifier reads as zero.
    pub fn prefix(&self) -> u8 {
        self.0.first().copied().unwrap_or(0)
    }
}

pub fn direction_for_tag(tag: &TagId) -> Direction {
    let prefix = tag.prefix();
    TAG_DIRECTIONS
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|(_, direction)| *direction)
        .unwrap_or_else(|| Direction::from_ordinal(prefix as usize))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyKind {
    Rfid,
    Siren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmergencySession {
    pub kind: EmergencyKind,
    pub direction: Direction,
    pub started_at_ms: u64,
}

impl EmergencySession {
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

/// What a trigger did to the arbitrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    Activated(EmergencySession),
    /// A session was already running; the trigger was dropped.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct EmergencyArbitrator {
    alert_duration_ms: u64,
    siren_direction: Direction,
    session: Option<EmergencySession>,
}

impl EmergencyArbitrator {
    pub fn new(alert_duration_ms: u64, siren_direction: Direction) -> Self {
        Self {
            alert_duration_ms,
            siren_direction,
            session: None,
        }
    }

    pub fn alert_duration_ms(&self) -> u64 {
        self.alert_duration_ms
    }

    pub fn session(&self) -> Option<&EmergencySession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the current session is still inside its alert window at `now_ms`.
    pub fn is_active_at(&self, now_ms: u64) -> bool {
        self.session
            .is_some_and(|session| session.elapsed_ms(now_ms) < self.alert_duration_ms)
    }

    pub fn on_tag(&mut self, tag: &TagId, now_ms: u64) -> Arbitration {
        let direction = direction_for_tag(tag);
        debug!(
            prefix = format_args!("{:#04x}", tag.prefix()),
            %direction,
            "RFID tag resolved"
        );
        self.activate(EmergencyKind::Rfid, direction, now_ms)
    }

    /// Siren confidence reached its cap. The classifier has no direction
    /// information, so this always favors the configured siren direction.
    pub fn on_siren(&mut self, now_ms: u64) -> Arbitration {
        self.activate(EmergencyKind::Siren, self.siren_direction, now_ms)
    }

    fn activate(&mut self, kind: EmergencyKind, direction: Direction, now_ms: u64) -> Arbitration {
        if let Some(active) = self.session {
            debug!(
                ?kind,
                %direction,
                active_kind = ?active.kind,
                active_direction = %active.direction,
                "Emergency trigger ignored, session already active"
            );
            return Arbitration::Suppressed;
        }

        let session = EmergencySession {
            kind,
            direction,
            started_at_ms: now_ms,
        };
        self.session = Some(session);
        warn!(?kind, %direction, "Emergency override activated");
        Arbitration::Activated(session)
    }

    /// End the session once its alert window has elapsed. Returns the ended session.
    pub fn expire(&mut self, now_ms: u64) -> Option<EmergencySession> {
        let session = self.session?;
        if session.elapsed_ms(now_ms) < self.alert_duration_ms {
            return None;
        }
        self.session = None;
        info!(
            kind = ?session.kind,
            direction = %session.direction,
            duration_ms = session.elapsed_ms(now_ms),
            "Emergency override expired"
        );
        Some(session)
    }
}

impl Default for EmergencyArbitrator {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_DURATION_MS, Direction::East)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_prefixes_map_to_fixed_directions() {
        assert_eq!(direction_for_tag(&TagId::new([0xB6, 0x01])), Direction::North);
        assert_eq!(direction_for_tag(&TagId::new([0xA2])), Direction::South);
        assert_eq!(direction_for_tag(&TagId::new([0xC1, 0xFF, 0x00])), Direction::East);
        assert_eq!(direction_for_tag(&TagId::new([0xD3])), Direction::West);
    }

    #[test]
    fn unknown_prefixes_fall_back_to_modulo() {
        for byte in 0..=u8::MAX {
            if TAG_DIRECTIONS.iter().any(|(known, _)| *known == byte) {
                continue;
            }
            let expected = Direction::ALL[(byte % 4) as usize];
            assert_eq!(direction_for_tag(&TagId::new([byte])), expected, "byte {byte:#04x}");
        }
    }

    #[test]
    fn empty_tag_reads_as_prefix_zero() {
        assert_eq!(direction_for_tag(&TagId::new(Vec::new())), Direction::North);
    }

    #[test]
    fn session_times_out_exactly_at_alert_duration() {
        let mut arbitrator = EmergencyArbitrator::new(10_000, Direction::East);
        let start = 5_000;
        arbitrator.on_tag(&TagId::new([0xA2]), start);

        assert!(arbitrator.is_active_at(start + 9_999));
        assert!(arbitrator.expire(start + 9_999).is_none());
        assert!(!arbitrator.is_active_at(start + 10_000));

        let ended = arbitrator.expire(start + 10_000);
        assert_eq!(ended.map(|s| s.direction), Some(Direction::South));
        assert!(!arbitrator.is_active());
    }

    #[test]
    fn first_trigger_wins() {
        let mut arbitrator = EmergencyArbitrator::default();
        let first = arbitrator.on_tag(&TagId::new([0xD3]), 0);
        let second = arbitrator.on_siren(10);

        assert!(matches!(first, Arbitration::Activated(s) if s.direction == Direction::West));
        assert_eq!(second, Arbitration::Suppressed);
        assert_eq!(arbitrator.session().map(|s| s.kind), Some(EmergencyKind::Rfid));
    }

    #[test]
    fn siren_uses_configured_direction() {
        let mut arbitrator = EmergencyArbitrator::new(1_000, Direction::West);
        match arbitrator.on_siren(42) {
            Arbitration::Activated(session) => {
                assert_eq!(session.kind, EmergencyKind::Siren);
                assert_eq!(session.direction, Direction::West);
                assert_eq!(session.started_at_ms, 42);
            }
            Arbitration::Suppressed => panic!("expected activation"),
        }
    }

    #[test]
    fn new_session_allowed_after_expiry() {
        let mut arbitrator = EmergencyArbitrator::new(100, Direction::East);
        arbitrator.on_siren(0);
        arbitrator.expire(100);
        assert!(matches!(
            arbitrator.on_tag(&TagId::new([0xB6]), 150),
            Arbitration::Activated(_)
        ));
    }
}
