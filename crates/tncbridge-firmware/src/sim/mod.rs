//! Software stand-in for the board: chip model, port lines and a bench of
//! stations sharing one channel, reachable from the host stack through
//! [`SoftPort`].

mod bench;
mod chip;

pub use bench::{Bench, Ether, SimDevice, SoftPort};
pub use chip::{SimChip, SimLines, Tick, BYTES_PER_TICK};
