//! RDM6300-style serial RFID reader.
//!
//! Frame: `STX`, ten ASCII hex digits (five data bytes), two ASCII hex
//! checksum digits (XOR of the data bytes), `ETX`. 9600 baud, 8N1.

use crate::emergency::TagId;
use thiserror::Error;

#[cfg(target_os = "linux")]
use crate::error::AppError;
#[cfg(target_os = "linux")]
use crate::peripheral::TagReader;
#[cfg(target_os = "linux")]
use tracing::{debug, warn};

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const FRAME_LEN: usize = 14;
pub const DATA_BYTES: usize = 5;
pub const BAUD_RATE: u32 = 9600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame not terminated by ETX (got {0:#04x})")]
    MissingEtx(u8),
    #[error("invalid hex digit {0:#04x}")]
    InvalidHex(u8),
    #[error("checksum mismatch: frame says {expected:#04x}, data gives {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
}

/// Byte-at-a-time frame reassembly. Bytes outside a frame are dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    frame: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            frame: Vec::with_capacity(FRAME_LEN),
        }
    }

    /// Feed one byte. Yields a result whenever a full frame has been collected.
    pub fn push(&mut self, byte: u8) -> Option<Result<TagId, FrameError>> {
        if byte == STX {
            self.frame.clear();
        } else if self.frame.is_empty() {
            return None;
        }
        self.frame.push(byte);

        if self.frame.len() < FRAME_LEN {
            return None;
        }
        let result = decode_frame(&self.frame);
        self.frame.clear();
        Some(result)
    }
}

fn hex_value(digit: u8) -> Result<u8, FrameError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        other => Err(FrameError::InvalidHex(other)),
    }
}

fn decode_frame(frame: &[u8]) -> Result<TagId, FrameError> {
    let terminator = frame[FRAME_LEN - 1];
    if terminator != ETX {
        return Err(FrameError::MissingEtx(terminator));
    }

    let bytes = frame[1..FRAME_LEN - 1]
        .chunks_exact(2)
        .map(|pair| -> Result<u8, FrameError> {
            Ok(hex_value(pair[0])? << 4 | hex_value(pair[1])?)
        })
        .collect::<Result<Vec<u8>, FrameError>>()?;

    let (data, checksum) = bytes.split_at(DATA_BYTES);
    let actual = data.iter().fold(0u8, |acc, byte| acc ^ byte);
    if actual != checksum[0] {
        return Err(FrameError::Checksum {
            expected: checksum[0],
            actual,
        });
    }
    Ok(TagId::new(data))
}

#[cfg(target_os = "linux")]
pub struct Rdm6300Reader {
    uart: rppal::uart::Uart,
    decoder: FrameDecoder,
}

#[cfg(target_os = "linux")]
impl Rdm6300Reader {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, AppError> {
        let mut uart =
            rppal::uart::Uart::with_path(path, BAUD_RATE, rppal::uart::Parity::None, 8, 1)
                .map_err(|err| AppError::Uart(err.to_string()))?;
        // Non-blocking: return whatever is buffered.
        uart.set_read_mode(0, std::time::Duration::ZERO)
            .map_err(|err| AppError::Uart(err.to_string()))?;
        Ok(Self {
            uart,
            decoder: FrameDecoder::new(),
        })
    }
}

#[cfg(target_os = "linux")]
impl TagReader for Rdm6300Reader {
    fn poll_tag(&mut self) -> Option<TagId> {
        let mut buffer = [0u8; 64];
        let mut tag = None;
        loop {
            let read = match self.uart.read(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    warn!(error = %err, "RFID UART read failed");
                    return tag;
                }
            };
            if read == 0 {
                return tag;
            }
            for byte in &buffer[..read] {
                match self.decoder.push(*byte) {
                    Some(Ok(decoded)) => tag = Some(decoded),
                    Some(Err(err)) => debug!(error = %err, "Dropped RFID frame"),
                    None => {}
                }
            }
        }
    }
}
