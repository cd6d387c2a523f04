//! Block command codes and fixed wire sizes.

/// Block header: type (1) + size (1).
pub const HEADER_SIZE: usize = 2;

/// The size byte caps every payload.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Fewer observed bytes than this means no radio block was received.
pub const MIN_RECEIVED_LEN: usize = 4;

/// Payload length of TX, TX_KO and RX_KO acknowledgements:
/// status (1) + four edge counters (4) + GPIO in/flag/enable/edge (4).
pub const TX_ACK_LEN: usize = 9;

/// Command type carried in the first byte of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    /// Reserved.
    None = 0,
    /// Radio parameter record, answered `[INIT, 0]`.
    Init = 1,
    /// One radio block to transmit.
    Tx = 2,
    /// Transmission failed.
    TxKo = 3,
    /// Arm reception of one radio block of the given size.
    Rx = 4,
    /// Reception failed.
    RxKo = 5,
    /// Abort an armed reception. Echoed back.
    RxCancel = 6,
    /// Status register snapshot.
    RadioStatus = 7,
    /// Payload echoed back.
    EchoTest = 8,
    /// Unknown command; the offending type is echoed in the payload.
    Error = 9,
}

impl BlockType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BlockType::None),
            1 => Some(BlockType::Init),
            2 => Some(BlockType::Tx),
            3 => Some(BlockType::TxKo),
            4 => Some(BlockType::Rx),
            5 => Some(BlockType::RxKo),
            6 => Some(BlockType::RxCancel),
            7 => Some(BlockType::RadioStatus),
            8 => Some(BlockType::EchoTest),
            9 => Some(BlockType::Error),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable name for the command.
    pub const fn name(self) -> &'static str {
        match self {
            BlockType::None => "NONE",
            BlockType::Init => "INIT",
            BlockType::Tx => "TX",
            BlockType::TxKo => "TX_KO",
            BlockType::Rx => "RX",
            BlockType::RxKo => "RX_KO",
            BlockType::RxCancel => "RX_CANCEL",
            BlockType::RadioStatus => "RADIO_STATUS",
            BlockType::EchoTest => "ECHO_TEST",
            BlockType::Error => "ERROR",
        }
    }
}

/// Name for a raw type byte, `"UNKNOWN"` outside the table.
pub const fn type_name(code: u8) -> &'static str {
    match BlockType::from_u8(code) {
        Some(kind) => kind.name(),
        None => "UNKNOWN",
    }
}
