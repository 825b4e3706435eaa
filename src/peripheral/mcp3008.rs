//! Microphone sampled through an MCP3008 10-bit ADC on SPI.

use std::time::Duration;

#[cfg(target_os = "linux")]
use crate::error::AppError;
#[cfg(target_os = "linux")]
use crate::peripheral::AudioSampler;
#[cfg(target_os = "linux")]
use tracing::warn;

pub const ADC_MAX: u16 = 1023;
/// Mid-scale reading of a biased microphone at rest.
pub const ADC_MIDPOINT: f32 = 512.0;
pub const SPI_CLOCK_HZ: u32 = 1_350_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub channel: u8,
    pub sample_count: usize,
    pub spacing: Duration,
}

/// Command bytes for a single-ended conversion on `channel` (0-7).
pub fn request_frame(channel: u8) -> [u8; 3] {
    [0x01, (0x08 | (channel & 0x07)) << 4, 0x00]
}

/// 10-bit result carried in the last two response bytes.
pub fn decode_response(response: &[u8; 3]) -> u16 {
    (u16::from(response[1] & 0x03) << 8) | u16::from(response[2])
}

/// Signed amplitude around the bias point.
pub fn to_amplitude(raw: u16) -> f32 {
    f32::from(raw.min(ADC_MAX)) - ADC_MIDPOINT
}

#[cfg(target_os = "linux")]
pub struct Mcp3008Sampler {
    spi: rppal::spi::Spi,
    settings: ScanSettings,
}

#[cfg(target_os = "linux")]
impl Mcp3008Sampler {
    pub fn open(settings: ScanSettings) -> Result<Self, AppError> {
        use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|err| AppError::Spi(err.to_string()))?;
        Ok(Self { spi, settings })
    }

    fn read_raw(&mut self) -> Result<u16, AppError> {
        let request = request_frame(self.settings.channel);
        let mut response = [0u8; 3];
        self.spi
            .transfer(&mut response, &request)
            .map_err(|err| AppError::Spi(err.to_string()))?;
        Ok(decode_response(&response))
    }
}

#[cfg(target_os = "linux")]
impl AudioSampler for Mcp3008Sampler {
    /// A failed conversion ends the scan early; the classifier ignores any scan
    /// shorter than the configured sample count.
    fn sample_scan(&mut self) -> Vec<f32> {
        let mut scan = Vec::with_capacity(self.settings.sample_count);
        for _ in 0..self.settings.sample_count {
            match self.read_raw() {
                Ok(raw) => scan.push(to_amplitude(raw)),
                Err(err) => {
                    warn!(error = %err, collected = scan.len(), "Audio scan aborted");
                    break;
                }
            }
            std::thread::sleep(self.settings.spacing);
        }
        scan
    }
}
