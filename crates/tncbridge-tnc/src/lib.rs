//! Host side of the radio bridge.
//!
//! This is the layer the binary drives. [`RadioLink`] is a session with the
//! microcontroller (init, status, packet transfer, reception arming),
//! [`Tnc`] runs the KISS virtual TNC between a terminal and that session,
//! and [`bulk`] holds the file transfer and link test routines.

pub mod bulk;
pub mod error;
pub mod radio;
pub mod scheduler;

pub use bulk::{
    bulk_receive, bulk_transmit, rx_test, tx_test, BulkReport, RxSample, TestReport,
    BULK_FIRST_TIMEOUT, BULK_INTER_PACKET_TIMEOUT, DEFAULT_LARGE_PACKET,
};
pub use error::{Result, TncError};
pub use radio::{LinkStats, LinkTiming, RadioLink, INIT_SETTLE};
pub use scheduler::{Tnc, TncConfig, TncStats, TriState};
