//! Signal heads driven from GPIO, one output per direction and color.

use crate::direction::{Direction, LightColor};
use crate::peripheral::LightBoard;
use serde::Deserialize;
use tracing::debug;

#[cfg(target_os = "linux")]
use crate::direction::DirectionMap;
#[cfg(target_os = "linux")]
use crate::error::AppError;

/// BCM pin numbers of one signal head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HeadPins {
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
}

impl HeadPins {
    pub fn pin(&self, color: LightColor) -> u8 {
        match color {
            LightColor::Red => self.red,
            LightColor::Yellow => self.yellow,
            LightColor::Green => self.green,
        }
    }
}

#[cfg(target_os = "linux")]
struct HeadOutputs {
    red: rppal::gpio::OutputPin,
    yellow: rppal::gpio::OutputPin,
    green: rppal::gpio::OutputPin,
}

#[cfg(target_os = "linux")]
pub struct GpioLightBoard {
    heads: DirectionMap<HeadOutputs>,
}

#[cfg(target_os = "linux")]
impl GpioLightBoard {
    /// Claims all twelve outputs and starts with every head red.
    pub fn new(pins: &DirectionMap<HeadPins>) -> Result<Self, AppError> {
        let gpio = rppal::gpio::Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
        let output = |pin: u8| -> Result<rppal::gpio::OutputPin, AppError> {
            Ok(gpio
                .get(pin)
                .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))?
                .into_output_low())
        };

        let heads = DirectionMap::try_from_fn(|direction| {
            let head = pins[direction];
            Ok::<_, AppError>(HeadOutputs {
                red: output(head.red)?,
                yellow: output(head.yellow)?,
                green: output(head.green)?,
            })
        })?;

        let mut board = Self { heads };
        crate::peripheral::show_exclusive(&mut board, None);
        Ok(board)
    }
}

#[cfg(target_os = "linux")]
impl LightBoard for GpioLightBoard {
    fn set_light(&mut self, direction: Direction, color: LightColor) {
        let head = &mut self.heads[direction];
        let levels = [
            (&mut head.red, color == LightColor::Red),
            (&mut head.yellow, color == LightColor::Yellow),
            (&mut head.green, color == LightColor::Green),
        ];
        for (pin, on) in levels {
            if on {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        debug!(%direction, ?color, "Light set");
    }
}

/// Board without hardware: only logs the commands.
#[derive(Debug, Default)]
pub struct ConsoleLightBoard;

impl LightBoard for ConsoleLightBoard {
    fn set_light(&mut self, direction: Direction, color: LightColor) {
        debug!(%direction, ?color, "Light set (console)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_pin_lookup_by_color() {
        let head = HeadPins {
            red: 5,
            yellow: 6,
            green: 13,
        };
        assert_eq!(head.pin(LightColor::Red), 5);
        assert_eq!(head.pin(LightColor::Yellow), 6);
        assert_eq!(head.pin(LightColor::Green), 13);
    }
}
