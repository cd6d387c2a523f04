use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{type_name, BlockType, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{BlockError, Result};

/// One protocol block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Raw command type. Devices may answer with codes outside [`BlockType`].
    pub block_type: u8,
    /// The payload; its length is the size byte.
    pub payload: Bytes,
}

impl Block {
    pub fn new(block_type: BlockType, payload: impl Into<Bytes>) -> Self {
        Self {
            block_type: block_type.code(),
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> Option<BlockType> {
        BlockType::from_u8(self.block_type)
    }

    pub fn name(&self) -> &'static str {
        type_name(self.block_type)
    }

    /// Header plus payload.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Fail unless this block carries `expected`.
    pub fn expect(self, expected: BlockType) -> Result<Self> {
        if self.block_type == expected.code() {
            Ok(self)
        } else {
            Err(BlockError::UnexpectedType {
                expected: expected.name(),
                actual: self.name(),
            })
        }
    }
}

/// Encode a block into the wire format.
///
/// ```text
/// ┌───────────┬───────────┬──────────────────┐
/// │ Type (1B) │ Size (1B) │ Payload (Size B) │
/// └───────────┴───────────┴──────────────────┘
/// ```
pub fn encode_block(block_type: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(BlockError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(block_type);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a block from the accumulated bytes.
///
/// Returns `Ok(None)` until `size + 2` bytes are present. On success the
/// block is consumed from the buffer.
pub fn decode_block(src: &mut BytesMut) -> Result<Option<Block>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    let size = usize::from(src[1]);
    if src.len() < HEADER_SIZE + size {
        return Ok(None);
    }

    let block_type = src.get_u8();
    src.advance(1);
    let payload = src.split_to(size).freeze();
    Ok(Some(Block {
        block_type,
        payload,
    }))
}

/// Timing and sizing of block exchanges.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    /// Radio block size in bytes, countdown and length bytes included.
    pub block_size: u8,
    /// Wait for command answers that do not depend on radio traffic.
    pub command_timeout: Duration,
    /// Pause between consecutive segments of one packet.
    pub block_delay: Duration,
    /// Sleep between empty polls while waiting for a block.
    pub poll_interval: Duration,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_size: 250,
            command_timeout: Duration::from_millis(100),
            block_delay: Duration::from_millis(10),
            poll_interval: Duration::from_micros(10),
        }
    }
}
