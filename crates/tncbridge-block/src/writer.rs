use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::encode_block;
use crate::command::{type_name, BlockType, HEADER_SIZE, MAX_PAYLOAD};
use crate::error::{BlockError, Result};

/// Writes complete blocks to any `Write` stream.
pub struct BlockWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> BlockWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD),
        }
    }

    /// Encode and send one command block. Returns the bytes written.
    pub fn send_command(&mut self, block_type: BlockType, payload: &[u8]) -> Result<usize> {
        self.send_raw(block_type.code(), payload)
    }

    /// Send a block with an arbitrary type byte.
    pub fn send_raw(&mut self, block_type: u8, payload: &[u8]) -> Result<usize> {
        self.buf.clear();
        encode_block(block_type, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(BlockError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(BlockError::Io(err)),
            }
        }
        self.flush()?;

        trace!(
            block_type = type_name(block_type),
            size = payload.len(),
            "block sent"
        );
        Ok(offset)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(BlockError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use tncbridge_transport::pair;

    use super::*;

    #[test]
    fn send_command_writes_header_and_payload() {
        let mut writer = BlockWriter::new(Vec::new());
        let written = writer.send_command(BlockType::EchoTest, b"hi").unwrap();
        assert_eq!(written, 4);
        assert_eq!(writer.get_ref().as_slice(), &[8, 2, b'h', b'i']);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut writer = BlockWriter::new(Vec::new());
        let err = writer.send_command(BlockType::Tx, &[0u8; 300]).unwrap_err();
        assert!(matches!(err, BlockError::PayloadTooLarge { size: 300, .. }));
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn partial_writes_are_completed() {
        let mut writer = BlockWriter::new(OneBytePerWrite(Vec::new()));
        writer.send_command(BlockType::Rx, &[250]).unwrap();
        assert_eq!(writer.get_ref().0, vec![4, 1, 250]);
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let mut writer = BlockWriter::new(Closed);
        let err = writer.send_command(BlockType::RxCancel, &[]).unwrap_err();
        assert!(matches!(err, BlockError::ConnectionClosed));
    }

    #[test]
    fn roundtrip_over_memory_link() {
        let (host, mut device) = pair();
        let mut writer = BlockWriter::new(host);
        writer.send_raw(0x42, &[1]).unwrap();
        let mut buf = [0u8; 3];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0x42, 1, 1]);
    }

    struct OneBytePerWrite(Vec<u8>);

    impl Write for OneBytePerWrite {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(b) => {
                    self.0.push(*b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
