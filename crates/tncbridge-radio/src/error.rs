/// Errors raised while decoding radio records received over the link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RadioError {
    /// A parameter or status record was shorter than its fixed layout.
    #[error("{record} record truncated ({len} bytes, expected {expected})")]
    Truncated {
        record: &'static str,
        len: usize,
        expected: usize,
    },

    /// A field carried a value outside its enumeration.
    #[error("invalid {field} value {value}")]
    InvalidField { field: &'static str, value: u8 },
}

pub type Result<T> = core::result::Result<T, RadioError>;
