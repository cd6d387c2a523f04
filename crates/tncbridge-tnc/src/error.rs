use tncbridge_block::BlockError;

/// Errors that can occur while driving the radio or the TNC.
#[derive(Debug, thiserror::Error)]
pub enum TncError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] tncbridge_transport::TransportError),

    /// Block exchange error.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// A radio record could not be decoded.
    #[error("radio error: {0}")]
    Radio(#[from] tncbridge_radio::RadioError),

    /// Terminal I/O failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// INIT failed twice in a row.
    #[error("radio initialisation failed: {0}")]
    RadioInit(#[source] BlockError),

    /// The device answered ECHO_TEST with other bytes than were sent.
    #[error("echo mismatch (sent {sent} bytes, got {received})")]
    EchoMismatch { sent: usize, received: usize },
}

impl TncError {
    /// True when the error only means "nothing arrived in time".
    pub fn is_timeout(&self) -> bool {
        matches!(self, TncError::Block(err) if err.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, TncError>;
