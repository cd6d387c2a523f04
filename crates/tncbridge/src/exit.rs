use std::fmt;
use std::io;

use tncbridge_block::BlockError;
use tncbridge_tnc::TncError;
use tncbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// The radio did not come up or answered out of protocol.
pub const DEVICE_ERROR: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn block_error(context: &str, err: BlockError) -> CliError {
    match err {
        BlockError::Io(source) => io_error(context, source),
        BlockError::Transport(err) => transport_error(context, err),
        BlockError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        BlockError::PayloadTooLarge { .. }
        | BlockError::PacketTooLarge { .. }
        | BlockError::InvalidBlockSize(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        BlockError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DEVICE_ERROR, format!("{context}: {other}")),
    }
}

pub fn tnc_error(context: &str, err: TncError) -> CliError {
    match err {
        TncError::Transport(err) => transport_error(context, err),
        TncError::Block(err) => block_error(context, err),
        TncError::Io(source) => io_error(context, source),
        TncError::RadioInit(_) | TncError::EchoMismatch { .. } | TncError::Radio(_) => {
            CliError::new(DEVICE_ERROR, format!("{context}: {err}"))
        }
    }
}
