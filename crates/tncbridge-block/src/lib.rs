//! Block protocol between the host and the radio microcontroller.
//!
//! Every exchange over the USB serial link is a block:
//! - a 1-byte command type ([`BlockType`])
//! - a 1-byte payload size
//! - `size` payload bytes
//!
//! The host sends one block and waits for one answer, with a deadline.
//! Packets longer than one radio block are split into countdown-numbered
//! segments ([`packet`]) and put back together on receipt.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod command;

#[cfg(feature = "std")]
pub mod codec;
#[cfg(feature = "std")]
pub mod error;
#[cfg(feature = "std")]
pub mod link;
#[cfg(feature = "std")]
pub mod packet;
#[cfg(feature = "std")]
pub mod reader;
#[cfg(feature = "std")]
pub mod writer;

pub use command::{BlockType, HEADER_SIZE, MAX_PAYLOAD, MIN_RECEIVED_LEN, TX_ACK_LEN};

#[cfg(feature = "std")]
pub use codec::{decode_block, encode_block, Block, BlockConfig};
#[cfg(feature = "std")]
pub use error::{BlockError, Result};
#[cfg(feature = "std")]
pub use link::BlockLink;
#[cfg(feature = "std")]
pub use packet::{
    block_count, receive_packet, segment, send_packet, RadioAck, ReceivedBlock, ReceivedPacket,
    Reassembler,
};
#[cfg(feature = "std")]
pub use reader::{ticks, BlockReader};
#[cfg(feature = "std")]
pub use writer::BlockWriter;
