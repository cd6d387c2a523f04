use std::time::Duration;

use tncbridge_transport::{Clock, Duplex};
use tracing::debug;

use crate::codec::{Block, BlockConfig};
use crate::command::BlockType;
use crate::error::{BlockError, Result};
use crate::reader::BlockReader;
use crate::writer::BlockWriter;

/// Request/response block exchange over one duplex stream.
///
/// The stream is split into a reading and a writing handle. Only one request
/// is ever in flight.
pub struct BlockLink<S, C> {
    reader: BlockReader<S, C>,
    writer: BlockWriter<S>,
    clock: C,
    config: BlockConfig,
}

impl<S: Duplex, C: Clock + Clone> BlockLink<S, C> {
    pub fn connect(stream: S, clock: C, config: BlockConfig) -> Result<Self> {
        let read_half = stream.try_clone()?;
        Ok(Self {
            reader: BlockReader::with_config(read_half, clock.clone(), &config),
            writer: BlockWriter::new(stream),
            clock,
            config,
        })
    }

    /// Send one block. Returns the bytes written.
    pub fn send_command(&mut self, block_type: BlockType, payload: &[u8]) -> Result<usize> {
        self.writer.send_command(block_type, payload)
    }

    /// Wait for one block. `None` waits forever.
    pub fn read_block(&mut self, timeout: Option<Duration>) -> Result<Block> {
        self.reader.read_block(timeout)
    }

    /// Return a block if one is complete, without waiting.
    pub fn poll_block(&mut self) -> Result<Option<Block>> {
        self.reader.poll_block()
    }

    /// Send a command and wait for its answer.
    ///
    /// An ERROR answer becomes [`BlockError::Unsupported`].
    pub fn request(
        &mut self,
        block_type: BlockType,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Block> {
        self.send_command(block_type, payload)?;
        let reply = self.read_block(Some(timeout))?;
        if reply.kind() == Some(BlockType::Error) {
            let code = reply.payload.first().copied().unwrap_or(block_type.code());
            debug!(command = block_type.name(), "device answered ERROR");
            return Err(BlockError::Unsupported(code));
        }
        Ok(reply)
    }

    /// [`request`](Self::request) with the configured command timeout.
    pub fn command(&mut self, block_type: BlockType, payload: &[u8]) -> Result<Block> {
        let timeout = self.config.command_timeout;
        self.request(block_type, payload, timeout)
    }

    /// Drop any bytes received but not yet assembled into a block.
    pub fn discard_input(&mut self) -> usize {
        self.reader.discard()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BlockConfig {
        &mut self.config
    }
}

impl<S, C> std::fmt::Debug for BlockLink<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockLink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use tncbridge_transport::{pair, ManualClock, MemoryLink};

    use super::*;

    fn link() -> (BlockLink<MemoryLink, ManualClock>, MemoryLink) {
        let (host, device) = pair();
        let link = BlockLink::connect(host, ManualClock::new(), BlockConfig::default()).unwrap();
        (link, device)
    }

    #[test]
    fn request_returns_answer() {
        let (mut link, mut device) = link();
        device.write_all(&[8, 2, b'o', b'k']).unwrap();
        let reply = link
            .request(BlockType::EchoTest, b"ok", Duration::from_millis(10))
            .unwrap();
        assert_eq!(reply.payload.as_ref(), b"ok");

        let mut sent = [0u8; 4];
        device.read_exact(&mut sent).unwrap();
        assert_eq!(sent, [8, 2, b'o', b'k']);
    }

    #[test]
    fn error_answer_is_unsupported() {
        let (mut link, mut device) = link();
        device.write_all(&[9, 1, 7]).unwrap();
        let err = link.command(BlockType::RadioStatus, &[]).unwrap_err();
        assert!(matches!(err, BlockError::Unsupported(7)));
    }

    #[test]
    fn silent_device_times_out() {
        let (mut link, _device) = link();
        let err = link.command(BlockType::Init, &[0; 19]).unwrap_err();
        assert!(err.is_timeout());
        assert!(link.clock().now() >= link.config().command_timeout);
    }
}
