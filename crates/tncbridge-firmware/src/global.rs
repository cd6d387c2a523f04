//! The device as a `static`, shared between the main loop and the port
//! interrupt.
//!
//! Every access runs inside `critical_section::with`, so the interrupt can
//! never observe the streamer halfway through a transition.
//!
//! ```ignore
//! static DEVICE: SharedDevice<Cc1101, Port2> = shared_device();
//!
//! #[interrupt]
//! fn PORT2() {
//!     let (flags, edges) = port2_flags_and_edges();
//!     global::on_port_interrupt(&DEVICE, flags, edges, &PORT2_PINS);
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::chip::{InterruptLines, LinePins, RadioChip};
use crate::device::Device;
use crate::streamer::Reply;

pub type SharedDevice<R, L> = Mutex<RefCell<Option<Device<R, L>>>>;

/// An empty slot, for `static` initialisation.
pub const fn shared_device<R, L>() -> SharedDevice<R, L> {
    Mutex::new(RefCell::new(None))
}

/// Put `device` in the slot, replacing any previous one.
pub fn install<R, L>(shared: &'static SharedDevice<R, L>, device: Device<R, L>) {
    critical_section::with(|cs| {
        let _ = shared.borrow(cs).replace(Some(device));
    });
}

/// Run `f` on the installed device. Returns `None` before [`install`].
pub fn with_device<R, L, T>(
    shared: &'static SharedDevice<R, L>,
    f: impl FnOnce(&mut Device<R, L>) -> T,
) -> Option<T> {
    critical_section::with(|cs| shared.borrow(cs).borrow_mut().as_mut().map(f))
}

/// Port interrupt entry point.
pub fn on_port_interrupt<R: RadioChip, L: InterruptLines>(
    shared: &'static SharedDevice<R, L>,
    flags: u8,
    edge_select: u8,
    pins: &LinePins,
) {
    with_device(shared, |device| {
        device.on_port_interrupt(flags, edge_select, pins)
    });
}

/// Main loop entry point for a complete block from the host.
pub fn on_block<R: RadioChip, L: InterruptLines>(shared: &'static SharedDevice<R, L>, block: &[u8]) {
    with_device(shared, |device| device.handle_block(block));
}

/// Next reply for the USB endpoint.
pub fn take_reply<R: RadioChip, L: InterruptLines>(
    shared: &'static SharedDevice<R, L>,
) -> Option<Reply> {
    with_device(shared, Device::poll_reply).flatten()
}
