use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Duplex;

/// A raw 8N1 serial device used as a polled byte stream.
///
/// The read timeout is kept very short so that a read with no pending data
/// returns promptly; combine with [`crate::PollRead`] to treat that as "no
/// bytes".
pub struct SerialStream {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialStream {
    /// Read timeout applied to every opened device.
    pub const POLL_TIMEOUT: Duration = Duration::from_millis(1);

    /// Open `path` at `baud`, raw 8N1 without flow control.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Self::POLL_TIMEOUT)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .data_bits(DataBits::Eight)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        info!(path, baud, "serial device opened");

        let mut stream = Self {
            port,
            path: path.to_string(),
        };
        stream.discard_input()?;
        Ok(stream)
    }

    /// Drop whatever the device buffered before we started listening.
    pub fn discard_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|source| TransportError::Configure {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path, "input buffer cleared");
        Ok(())
    }

    /// Change the read timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|source| TransportError::Configure {
                path: self.path.clone(),
                source,
            })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl Duplex for SerialStream {
    fn try_clone(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|source| TransportError::Configure {
                path: self.path.clone(),
                source,
            })?;
        Ok(Self {
            port,
            path: self.path.clone(),
        })
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("path", &self.path)
            .finish()
    }
}
