//! KISS/SLIP framing for the terminal side of the TNC.
//!
//! The framer is pure: it splits a byte buffer into delimited frames,
//! undoes and applies the two escape substitutions, and tells data frames
//! from configuration commands. What to do with each is up to the caller.

pub mod command;
pub mod error;
pub mod escape;
pub mod frames;
pub mod params;

pub use command::{interpret_command, Command, Disposition};
pub use error::{KissError, Result};
pub use escape::{data_frame, escape, unescape, FEND, FESC, TFEND, TFESC};
pub use frames::{tokenize, Frames, Tokenized};
pub use params::{KissParams, ParamOutcome};
