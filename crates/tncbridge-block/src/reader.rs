use std::io::Read;
use std::time::Duration;

use bytes::BytesMut;
use tncbridge_transport::{Clock, PollRead};
use tracing::{debug, trace, warn};

use crate::codec::{decode_block, Block, BlockConfig};
use crate::error::{BlockError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// How long a partial block may sit without growing before it is dropped.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_millis(100);

/// Convert a budget in 10 µs ticks.
pub fn ticks(n: u32) -> Duration {
    Duration::from_micros(u64::from(n) * 10)
}

/// Reads complete blocks from a polled byte stream.
///
/// Bytes are accumulated across calls. A block is only handed out once
/// `size + 2` bytes are present; on timeout the partial bytes are dropped.
pub struct BlockReader<T, C> {
    inner: T,
    clock: C,
    buf: BytesMut,
    poll_interval: Duration,
    stall_timeout: Duration,
    last_progress: Option<Duration>,
}

impl<T: Read, C: Clock> BlockReader<T, C> {
    pub fn new(inner: T, clock: C) -> Self {
        Self::with_config(inner, clock, &BlockConfig::default())
    }

    pub fn with_config(inner: T, clock: C, config: &BlockConfig) -> Self {
        Self {
            inner,
            clock,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            poll_interval: config.poll_interval,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            last_progress: None,
        }
    }

    /// Change how long an incomplete block may stall during polling.
    pub fn set_stall_timeout(&mut self, stall_timeout: Duration) {
        self.stall_timeout = stall_timeout;
    }

    /// Check for a complete block without waiting.
    ///
    /// A partial block that has not grown for the stall timeout is dropped.
    pub fn poll_block(&mut self) -> Result<Option<Block>> {
        if let Some(block) = self.take_block()? {
            return Ok(Some(block));
        }
        if self.fill()? > 0 {
            return self.take_block();
        }
        if let Some(since) = self.last_progress {
            if !self.buf.is_empty() && self.clock.now().saturating_sub(since) > self.stall_timeout {
                let dropped = self.discard();
                warn!(dropped, "dropping stalled partial block");
            }
        }
        Ok(None)
    }

    /// Wait for the next complete block.
    ///
    /// `None` waits forever. With a budget, returns [`BlockError::Timeout`]
    /// once it is spent and drops any partial bytes.
    pub fn read_block(&mut self, timeout: Option<Duration>) -> Result<Block> {
        let deadline = timeout.map(|t| self.clock.now() + t);
        loop {
            if let Some(block) = self.take_block()? {
                return Ok(block);
            }
            let read = self.fill()?;
            if read > 0 {
                continue;
            }
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if self.clock.now() >= deadline {
                    let dropped = self.discard();
                    debug!(?timeout, dropped, "block read timed out");
                    return Err(BlockError::Timeout(timeout));
                }
            }
            self.clock.sleep(self.poll_interval);
        }
    }

    /// Drop buffered bytes. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        self.last_progress = None;
        dropped
    }

    /// Bytes received but not yet part of a complete block.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn take_block(&mut self) -> Result<Option<Block>> {
        let block = decode_block(&mut self.buf)?;
        if let Some(block) = &block {
            trace!(
                block_type = block.name(),
                size = block.payload.len(),
                "block received"
            );
            self.last_progress = if self.buf.is_empty() {
                None
            } else {
                Some(self.clock.now())
            };
        }
        Ok(block)
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = self.inner.poll_read(&mut chunk)?;
        if read > 0 {
            self.buf.extend_from_slice(&chunk[..read]);
            self.last_progress = Some(self.clock.now());
        }
        Ok(read)
    }
}
