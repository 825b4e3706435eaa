//! The control loop: one tick polls the emergency triggers, samples the
//! approaches and advances the phase machine.

use crate::diagnostics::DiagnosticReport;
use crate::direction::{Direction, LightColor};
use crate::emergency::{Arbitration, EmergencySession};
use crate::peripheral::{AudioSampler, LightBoard, TagReader};
use crate::phase::Phase;
use crate::sensor::RangeSensor;
use crate::state::IntersectionState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const STOP_POLL_STEP: Duration = Duration::from_millis(50);

/// The peripherals the controller talks to.
#[derive(Debug)]
pub struct Board<R, T, A, L> {
    pub range: R,
    pub tags: T,
    pub audio: A,
    pub lights: L,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// All-red clearance running; nothing else was polled.
    Clearing { transition: Option<Phase> },
    /// An override holds the intersection.
    Emergency(EmergencySession),
    /// The override timed out this tick and the cycle restarted at North-Green.
    EmergencyEnded(EmergencySession),
    Normal { transition: Option<Phase> },
}

impl TickOutcome {
    pub fn transition(self) -> Option<Phase> {
        match self {
            TickOutcome::Clearing { transition } | TickOutcome::Normal { transition } => transition,
            TickOutcome::EmergencyEnded(_) => Some(Phase::INITIAL),
            TickOutcome::Emergency(_) => None,
        }
    }
}

/// Power-on sequence: calibrate the siren noise floor, then show North-Green.
pub fn start<R, T, A, L>(state: &mut IntersectionState, board: &mut Board<R, T, A, L>, now_ms: u64)
where
    A: AudioSampler,
    L: LightBoard,
{
    state.siren.calibrate(&mut board.audio);
    let phase = state.phase.reset(now_ms);
    state.actuate(&mut board.lights, phase.signal());
    info!(%phase, "Controller started");
}

pub fn tick<R, T, A, L>(
    state: &mut IntersectionState,
    board: &mut Board<R, T, A, L>,
    now_ms: u64,
) -> TickOutcome
where
    R: RangeSensor,
    T: TagReader,
    A: AudioSampler,
    L: LightBoard,
{
    if state.phase.is_clearing() {
        let transition = advance_phase(state, &mut board.lights, now_ms);
        return TickOutcome::Clearing { transition };
    }

    poll_triggers(state, board, now_ms);

    if let Some(session) = state.emergency.session().copied() {
        if state.emergency.expire(now_ms).is_none() {
            return TickOutcome::Emergency(session);
        }
        state.actuate(&mut board.lights, None);
        state.siren.reset_hysteresis();
        let phase = state.phase.reset(now_ms);
        state.actuate(&mut board.lights, phase.signal());
        return TickOutcome::EmergencyEnded(session);
    }

    if state.sensing_due(now_ms) {
        for direction in Direction::ALL {
            let raw = board.range.read_range(direction);
            state.presence.update(direction, raw);
        }
    }

    if state.diagnostics_due(now_ms) {
        DiagnosticReport::capture(state, now_ms).log();
    }

    state.timing.update(state.presence.active_count());
    let transition = advance_phase(state, &mut board.lights, now_ms);
    TickOutcome::Normal { transition }
}

fn poll_triggers<R, T, A, L>(
    state: &mut IntersectionState,
    board: &mut Board<R, T, A, L>,
    now_ms: u64,
) where
    T: TagReader,
    A: AudioSampler,
    L: LightBoard,
{
    if let Some(tag) = board.tags.poll_tag() {
        let outcome = state.emergency.on_tag(&tag, now_ms);
        apply_arbitration(state, &mut board.lights, outcome);
    }

    let scan = board.audio.sample_scan();
    let reading = state.siren.classify(&scan);
    if reading.confidence_reached {
        let outcome = state.emergency.on_siren(now_ms);
        apply_arbitration(state, &mut board.lights, outcome);
    }
}

fn apply_arbitration<L>(state: &mut IntersectionState, lights: &mut L, outcome: Arbitration)
where
    L: LightBoard,
{
    if let Arbitration::Activated(session) = outcome {
        state.actuate(lights, Some((session.direction, LightColor::Green)));
    }
}

fn advance_phase<L>(state: &mut IntersectionState, lights: &mut L, now_ms: u64) -> Option<Phase>
where
    L: LightBoard,
{
    let green_ms = state.timing.green_ms();
    let presence = state.presence.presence();
    let next = state.phase.tick(now_ms, green_ms, &presence)?;
    state.actuate(lights, next.signal());
    Some(next)
}

/// Run the controller on its own thread until `stop` is raised.
pub fn spawn_control_thread<R, T, A, L>(
    mut state: IntersectionState,
    mut board: Board<R, T, A, L>,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()>
where
    R: RangeSensor + Send + 'static,
    T: TagReader + Send + 'static,
    A: AudioSampler + Send + 'static,
    L: LightBoard + Send + 'static,
{
    std::thread::spawn(move || {
        let interval = state.settings.tick_interval;
        start(&mut state, &mut board, 0);
        // Calibration blocks; the first green is timed from here.
        let origin = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let now_ms = u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX);
            tick(&mut state, &mut board, now_ms);
            sleep_with_stop(interval, &stop, cycle_start);
        }

        state.actuate(&mut board.lights, None);
        debug!("Control thread stopped");
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    loop {
        let elapsed = start.elapsed();
        if elapsed >= duration || stop.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep((duration - elapsed).min(STOP_POLL_STEP));
    }
}
