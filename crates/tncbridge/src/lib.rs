//! KISS virtual TNC for a CC1101 radio driven through a USB microcontroller.
//!
//! The `tncbridge` binary sits between an AX.25 application (on a serial
//! device or pseudo terminal) and the radio firmware, and also offers link
//! tests and bulk file transfer. The layers are usable on their own:
//!
//! - [`transport`]: serial devices, non-blocking polls, clocks
//! - [`block`]: the type/size block protocol spoken over USB
//! - [`radio`]: radio parameter compiler and status decoding
//! - [`kiss`]: KISS framing and TNC parameters
//! - [`tnc`]: radio session, TNC scheduler, bulk transfer

/// Re-export transport types.
pub mod transport {
    pub use tncbridge_transport::*;
}

/// Re-export block protocol types.
pub mod block {
    pub use tncbridge_block::*;
}

/// Re-export radio parameter types.
pub mod radio {
    pub use tncbridge_radio::*;
}

/// Re-export KISS framing types.
pub mod kiss {
    pub use tncbridge_kiss::*;
}

/// Re-export the TNC and its session.
pub mod tnc {
    pub use tncbridge_tnc::*;
}
