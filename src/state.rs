use crate::config::ControllerSettings;
use crate::direction::{Direction, DirectionMap, LightColor};
use crate::emergency::EmergencyArbitrator;
use crate::peripheral::{LightBoard, show_exclusive};
use crate::phase::PhaseController;
use crate::presence::PresenceFilter;
use crate::siren::SirenClassifier;
use crate::timing::AdaptiveTiming;
use tokio::sync::watch;

/// Colors currently shown on the four heads.
pub type LightFrame = DirectionMap<LightColor>;

/// Everything the control loop owns. Passed by `&mut` through each tick;
/// components never reach into each other.
#[derive(Debug)]
pub struct IntersectionState {
    pub settings: ControllerSettings,
    pub presence: PresenceFilter,
    pub siren: SirenClassifier,
    pub emergency: EmergencyArbitrator,
    pub timing: AdaptiveTiming,
    pub phase: PhaseController,
    lights: LightFrame,
    lights_tx: watch::Sender<LightFrame>,
    last_sensing_ms: Option<u64>,
    last_diagnostics_ms: Option<u64>,
}

impl IntersectionState {
    pub fn new(settings: ControllerSettings, now_ms: u64) -> Self {
        let lights = DirectionMap::splat(LightColor::Red);
        let (lights_tx, _lights_rx) = watch::channel(lights);
        Self {
            presence: PresenceFilter::new(settings.detection_threshold_mm),
            siren: SirenClassifier::new(settings.siren.clone()),
            emergency: EmergencyArbitrator::new(
                settings.alert_duration_ms,
                settings.siren_direction,
            ),
            timing: AdaptiveTiming::new(settings.min_green_ms, settings.max_green_ms),
            phase: PhaseController::new(settings.phase, now_ms),
            settings,
            lights,
            lights_tx,
            last_sensing_ms: None,
            last_diagnostics_ms: None,
        }
    }

    pub fn lights(&self) -> LightFrame {
        self.lights
    }

    pub fn subscribe_lights(&self) -> watch::Receiver<LightFrame> {
        self.lights_tx.subscribe()
    }

    /// Drive the board to show only `signal` (all red when `None`) and publish
    /// the resulting frame.
    pub fn actuate<L>(&mut self, board: &mut L, signal: Option<(Direction, LightColor)>)
    where
        L: LightBoard + ?Sized,
    {
        show_exclusive(board, signal);
        let mut frame = DirectionMap::splat(LightColor::Red);
        if let Some((direction, color)) = signal {
            frame[direction] = color;
        }
        self.lights = frame;
        self.lights_tx.send_replace(frame);
    }

    pub fn sensing_due(&mut self, now_ms: u64) -> bool {
        take_if_due(&mut self.last_sensing_ms, self.settings.sensing_interval_ms, now_ms)
    }

    pub fn diagnostics_due(&mut self, now_ms: u64) -> bool {
        take_if_due(
            &mut self.last_diagnostics_ms,
            self.settings.diagnostics_interval_ms,
            now_ms,
        )
    }
}

fn take_if_due(last: &mut Option<u64>, interval_ms: u64, now_ms: u64) -> bool {
    let due = last.is_none_or(|last| now_ms.saturating_sub(last) >= interval_ms);
    if due {
        *last = Some(now_ms);
    }
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::mock::RecordingLightBoard;

    #[test]
    fn actuate_updates_board_state_and_watch() {
        let mut state = IntersectionState::new(ControllerSettings::default(), 0);
        let mut receiver = state.subscribe_lights();
        let mut board = RecordingLightBoard::new();

        state.actuate(&mut board, Some((Direction::South, LightColor::Yellow)));

        assert!(receiver.has_changed().unwrap_or(false));
        let published = *receiver.borrow_and_update();
        assert_eq!(published[Direction::South], LightColor::Yellow);
        assert_eq!(published[Direction::North], LightColor::Red);
        assert_eq!(state.lights(), published);
        assert_eq!(board.colors(), published);
    }

    #[test]
    fn actuate_without_subscribers_still_records_frame() {
        let mut state = IntersectionState::new(ControllerSettings::default(), 0);
        let mut board = RecordingLightBoard::new();

        state.actuate(&mut board, Some((Direction::East, LightColor::Green)));

        assert_eq!(state.lights()[Direction::East], LightColor::Green);
    }

    #[test]
    fn rate_limit_fires_first_time_then_per_interval() {
        let mut last = None;
        assert!(take_if_due(&mut last, 100, 5));
        assert!(!take_if_due(&mut last, 100, 104));
        assert!(take_if_due(&mut last, 100, 105));
        assert!(take_if_due(&mut None, 0, 0));
    }
}
