use crate::streamer::Mode;

/// Reasons a transmit or receive cannot be set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("streamer busy in {0:?} mode")]
    Busy(Mode),

    #[error("empty radio block")]
    EmptyBlock,

    #[error("radio block of {len} bytes exceeds {max}")]
    BlockTooLarge { len: usize, max: usize },
}

pub type Result<T> = core::result::Result<T, StreamError>;
