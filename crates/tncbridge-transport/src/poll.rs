use std::io::{ErrorKind, Read};

/// Non-blocking read semantics over any [`Read`].
///
/// `WouldBlock`, `TimedOut` and `Interrupted` mean "nothing yet" and are
/// reported as `Ok(0)`; every other error is passed through.
pub trait PollRead {
    fn poll_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

impl<R: Read + ?Sized> PollRead for R {
    fn poll_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}
