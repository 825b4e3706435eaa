//! Board peripherals other than the range sensors: RFID reader, microphone
//! and the signal heads.

use crate::direction::{Direction, LightColor};
use crate::emergency::TagId;
use crate::sensor::{RangeSensor, RawRange};

pub mod gpio_lights;
pub mod mcp3008;
pub mod mock;
pub mod rdm6300;

pub trait TagReader {
    /// Non-blocking poll for a freshly presented tag.
    fn poll_tag(&mut self) -> Option<TagId>;
}

pub trait AudioSampler {
    /// One scan of signed amplitude samples, fixed count and spacing.
    fn sample_scan(&mut self) -> Vec<f32>;
}

pub trait LightBoard {
    /// Idempotent: setting the color a head already shows is harmless.
    fn set_light(&mut self, direction: Direction, color: LightColor);
}

impl<T: TagReader + ?Sized> TagReader for Box<T> {
    fn poll_tag(&mut self) -> Option<TagId> {
        (**self).poll_tag()
    }
}

impl<T: AudioSampler + ?Sized> AudioSampler for Box<T> {
    fn sample_scan(&mut self) -> Vec<f32> {
        (**self).sample_scan()
    }
}

impl<T: LightBoard + ?Sized> LightBoard for Box<T> {
    fn set_light(&mut self, direction: Direction, color: LightColor) {
        (**self).set_light(direction, color)
    }
}

/// Stand-in for an input peripheral that is not fitted or failed to open.
/// Reads as an empty intersection: no echo, no tag, silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unwired;

impl RangeSensor for Unwired {
    fn read_range(&mut self, _direction: Direction) -> RawRange {
        RawRange::NoEcho
    }
}

impl TagReader for Unwired {
    fn poll_tag(&mut self) -> Option<TagId> {
        None
    }
}

impl AudioSampler for Unwired {
    fn sample_scan(&mut self) -> Vec<f32> {
        Vec::new()
    }
}

/// Every red first, then the one signal that should show.
///
/// No two approaches are ever non-red at the same time, even mid-update.
pub fn show_exclusive<L>(board: &mut L, signal: Option<(Direction, LightColor)>)
where
    L: LightBoard + ?Sized,
{
    for direction in Direction::ALL {
        board.set_light(direction, LightColor::Red);
    }
    if let Some((direction, color)) = signal {
        board.set_light(direction, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::mock::RecordingLightBoard;

    #[test]
    fn exclusive_signal_sets_red_before_color() {
        let mut board = RecordingLightBoard::new();
        show_exclusive(&mut board, Some((Direction::West, LightColor::Green)));

        let commands = board.commands();
        assert_eq!(commands.len(), 5);
        assert!(commands[..4].iter().all(|(_, color)| *color == LightColor::Red));
        assert_eq!(commands[4], (Direction::West, LightColor::Green));
        assert_eq!(board.color(Direction::West), LightColor::Green);
        assert_eq!(board.color(Direction::North), LightColor::Red);
    }

    #[test]
    fn no_signal_leaves_all_red() {
        let mut board = RecordingLightBoard::new();
        show_exclusive(&mut board, Some((Direction::East, LightColor::Yellow)));
        show_exclusive(&mut board, None);

        assert!(Direction::ALL
            .iter()
            .all(|direction| board.color(*direction) == LightColor::Red));
    }

    #[test]
    fn unwired_reads_as_empty_intersection() {
        let mut unwired = Unwired;
        assert_eq!(unwired.read_range(Direction::South), RawRange::NoEcho);
        assert_eq!(unwired.poll_tag(), None);
        assert!(unwired.sample_scan().is_empty());
    }
}
