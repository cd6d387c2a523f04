//! Byte transport for the radio bridge.
//!
//! Provides the serial devices on both ends of the bridge:
//! - the USB CDC link to the microcontroller
//! - the terminal side (UART or pseudo-terminal)
//!
//! Reads are polls: a read that finds nothing returns `Ok(0)` instead of
//! blocking, so the upper layers drive their own deadlines through a
//! [`Clock`]. [`memory::pair`] and [`ManualClock`] replace the device and
//! wall time in tests.

pub mod clock;
pub mod error;
pub mod memory;
pub mod poll;
pub mod serial;
pub mod traits;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{Result, TransportError};
pub use memory::{pair, MemoryLink};
pub use poll::PollRead;
pub use serial::SerialStream;
pub use traits::Duplex;
