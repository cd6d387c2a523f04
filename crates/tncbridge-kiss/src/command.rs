use crate::error::{KissError, Result};
use crate::escape::{unescape, FEND};

pub const CMD_DATA: u8 = 0x00;
pub const CMD_TXDELAY: u8 = 0x01;
pub const CMD_PERSISTENCE: u8 = 0x02;
pub const CMD_SLOTTIME: u8 = 0x03;
pub const CMD_TXTAIL: u8 = 0x04;
pub const CMD_ABORT: u8 = 0x0F;

/// Configuration commands carried in the low nibble of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Keyup delay in 10 ms units.
    TxDelay,
    /// p-persistence, `(value + 1) / 256`.
    Persistence,
    /// Slot time in 10 ms units.
    SlotTime,
    /// TX tail in 10 ms units.
    TxTail,
    /// Stop the TNC.
    Abort,
    /// Any other non-data nibble. Consumed and ignored.
    Other(u8),
}

impl Command {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble & 0x0F {
            CMD_DATA => None,
            CMD_TXDELAY => Some(Command::TxDelay),
            CMD_PERSISTENCE => Some(Command::Persistence),
            CMD_SLOTTIME => Some(Command::SlotTime),
            CMD_TXTAIL => Some(Command::TxTail),
            CMD_ABORT => Some(Command::Abort),
            other => Some(Command::Other(other)),
        }
    }
}

/// What a frame from the terminal is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Payload to put on air. `port` is passed through, never routed.
    Data { port: u8, payload: Vec<u8> },
    /// TNC configuration, consumed locally.
    Config {
        port: u8,
        command: Command,
        value: u8,
    },
}

/// Classify one delimited frame.
pub fn interpret_command(frame: &[u8]) -> Result<Disposition> {
    if frame.len() < 2 || frame.first() != Some(&FEND) || frame.last() != Some(&FEND) {
        return Err(KissError::NotDelimited { len: frame.len() });
    }
    let body = unescape(frame);
    let (&type_byte, rest) = body.split_first().ok_or(KissError::Empty)?;
    let port = type_byte >> 4;

    match Command::from_nibble(type_byte) {
        None => Ok(Disposition::Data {
            port,
            payload: rest.to_vec(),
        }),
        Some(command) => Ok(Disposition::Config {
            port,
            command,
            value: rest.first().copied().unwrap_or(0),
        }),
    }
}
