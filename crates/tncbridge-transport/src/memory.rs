use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::traits::Duplex;

type Queue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory duplex link.
///
/// Reads with nothing queued fail with `WouldBlock`, matching a serial device
/// polled with a short timeout. Clones share both queues.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    rx: Queue,
    tx: Queue,
}

/// Create two connected ends: bytes written to one are read from the other.
pub fn pair() -> (MemoryLink, MemoryLink) {
    let a: Queue = Arc::default();
    let b: Queue = Arc::default();
    (
        MemoryLink {
            rx: Arc::clone(&a),
            tx: Arc::clone(&b),
        },
        MemoryLink { rx: b, tx: a },
    )
}

impl MemoryLink {
    /// Bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.rx.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Remove and return everything waiting on this end.
    pub fn drain(&self) -> Vec<u8> {
        self.rx
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> std::io::Error {
    std::io::Error::new(ErrorKind::Other, "memory link poisoned")
}

impl Read for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut queue = self.rx.lock().map_err(|_| poisoned())?;
        if queue.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(queue.len());
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut queue = self.tx.lock().map_err(|_| poisoned())?;
        queue.extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Duplex for MemoryLink {
    fn try_clone(&self) -> Result<Self> {
        Ok(self.clone())
    }
}
