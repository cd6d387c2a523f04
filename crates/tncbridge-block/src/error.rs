use std::time::Duration;

use tncbridge_transport::TransportError;

/// Errors that can occur while exchanging blocks and packets.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// The payload does not fit the one-byte size field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No complete block arrived before the deadline. Partial bytes were dropped.
    #[error("no complete block within {0:?}")]
    Timeout(Duration),

    /// The device answered with another command than the one expected.
    #[error("unexpected {actual} block (expected {expected})")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The device reported failure for a command.
    #[error("device rejected {command} with {reply}")]
    Rejected {
        command: &'static str,
        reply: &'static str,
    },

    /// The device did not recognise a command.
    #[error("device does not support command {0}")]
    Unsupported(u8),

    /// A radio block answer was too short to carry a segment.
    #[error("radio block not received ({len} bytes)")]
    NotReceived { len: usize },

    /// Segment countdowns did not decrease by exactly one.
    #[error("block sequence error (expected countdown {expected}, got {actual})")]
    Sequence { expected: u8, actual: u8 },

    /// A segment failed the radio CRC.
    #[error("CRC error in block with countdown {countdown}")]
    Crc { countdown: u8 },

    /// The radio block size cannot carry segments.
    #[error("invalid radio block size {0} (need at least 3)")]
    InvalidBlockSize(u8),

    /// The packet needs more segments than a countdown byte can number.
    #[error("packet of {len} bytes needs {blocks} blocks (max 256)")]
    PacketTooLarge { len: usize, blocks: usize },

    /// An I/O error occurred while reading or writing blocks.
    #[error("block I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport failed underneath.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The stream stopped accepting bytes.
    #[error("connection closed")]
    ConnectionClosed,
}

impl BlockError {
    /// True when the error only means "nothing arrived in time".
    pub fn is_timeout(&self) -> bool {
        matches!(self, BlockError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, BlockError>;
