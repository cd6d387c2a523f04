use std::time::Duration;

use tracing::{info, warn};

use crate::command::Command;

/// One KISS timing unit.
const UNIT: Duration = Duration::from_millis(10);

/// TNC parameters set through KISS configuration frames.
#[derive(Debug, Clone, PartialEq)]
pub struct KissParams {
    /// Wait between keying up and the first radio block.
    pub keyup_delay: Duration,
    pub persistence: f32,
    pub slot_time: Duration,
    pub tx_tail: Duration,
}

impl Default for KissParams {
    fn default() -> Self {
        Self {
            keyup_delay: Duration::from_millis(4),
            persistence: 0.25,
            slot_time: Duration::from_millis(100),
            tx_tail: Duration::ZERO,
        }
    }
}

/// Whether the TNC keeps running after a configuration frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamOutcome {
    Continue,
    Abort,
}

impl KissParams {
    /// Apply one configuration command.
    pub fn apply(&mut self, command: Command, value: u8) -> ParamOutcome {
        match command {
            Command::TxDelay => {
                self.keyup_delay = UNIT * u32::from(value);
                info!(keyup_delay = ?self.keyup_delay, "KISS keyup delay changed");
            }
            Command::Persistence => {
                self.persistence = (f32::from(value) + 1.0) / 256.0;
                info!(persistence = self.persistence, "KISS persistence changed");
            }
            Command::SlotTime => {
                self.slot_time = UNIT * u32::from(value);
                info!(slot_time = ?self.slot_time, "KISS slot time changed");
            }
            Command::TxTail => {
                self.tx_tail = UNIT * u32::from(value);
                info!(tx_tail = ?self.tx_tail, "KISS TX tail changed");
            }
            Command::Abort => {
                warn!("KISS abort command received");
                return ParamOutcome::Abort;
            }
            Command::Other(code) => {
                info!(code, value, "ignoring unsupported KISS command");
            }
        }
        ParamOutcome::Continue
    }
}
