/// Errors raised while interpreting KISS frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KissError {
    /// The frame held no command byte.
    #[error("empty KISS frame")]
    Empty,

    /// The bytes were not wrapped in FEND delimiters.
    #[error("KISS frame not delimited ({len} bytes)")]
    NotDelimited { len: usize },
}

pub type Result<T> = std::result::Result<T, KissError>;
