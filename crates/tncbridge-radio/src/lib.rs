//! Radio-side definitions shared by the host and the microcontroller.
//!
//! This crate turns user-level radio intent (frequency, data rate, modulation)
//! into the packed [`RadioParms`] record that the firmware copies verbatim into
//! the CC1101 configuration, and decodes what the chip reports back.
//!
//! - [`compile`]: the parameter compiler
//! - [`ActualParameters`]: realised channel figures and link timing
//! - [`RadioStatus`]: the status register snapshot
//!
//! It builds without `std` so the firmware crate can share the wire layout.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod compiler;
pub mod consts;
pub mod error;
pub mod parms;
pub mod report;
pub mod status;

pub use compiler::{compile, RadioIntent};
pub use consts::{DataRate, Modulation, PacketLengthMode, Preamble, SyncMode, XTAL_HZ};
pub use error::{RadioError, Result};
pub use parms::{RadioParms, PARMS_WIRE_SIZE};
pub use report::ActualParameters;
pub use status::{crc_lqi, marc_state_name, rssi_dbm, RadioStatus, NUM_STATUS_REGS};
