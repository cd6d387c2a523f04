use std::io::{Read, Write};

use crate::error::Result;

/// A bidirectional byte stream that can be split into independent handles.
///
/// Both handles share the underlying device; one is typically used for
/// reading and the other for writing.
pub trait Duplex: Read + Write + Send {
    /// Create another handle onto the same stream.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;
}
