//! Microcontroller side of the bridge.
//!
//! The firmware owns the CC1101 SPI bus and two of its GDO pins:
//! - GDO0, the packet line: asserted from sync word to end of packet
//! - GDO2, the threshold line: follows the FIFO fill threshold
//!
//! Blocks from the host are dispatched by [`Device`]. Transmit and receive
//! are streamed through the 64-byte hardware FIFOs by [`Streamer`], driven by
//! [`Event`]s decoded from the port interrupt. On hardware the interrupt
//! vector calls into a [`global`] device guarded by `critical_section`; in
//! tests the same transition function is called directly, or through the
//! [`sim`] bench.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod chip;
pub mod device;
pub mod error;
pub mod global;
pub mod streamer;

#[cfg(feature = "sim")]
pub mod sim;

pub use chip::{
    events_from_port, Edge, InterruptLines, Line, LinePins, RadioChip, Strobe, ThresholdMode,
    PORT2_PINS,
};
pub use device::{BlockAssembler, Device};
pub use error::{Result, StreamError};
pub use streamer::{reply, Counters, Event, Mode, Reply, Streamer};
