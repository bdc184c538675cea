//! Fabric transport contract
//!
//! The engine never owns a socket. It is handed something that can push one
//! encoded frame out and poll for one encoded frame in, without blocking.

use std::io;

/// Non-blocking, frame-oriented transport between two endpoints
pub trait Fabric {
    /// Send one encoded frame
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Receive one encoded frame into `buf`
    ///
    /// Returns `Ok(None)` when nothing is waiting. That is the normal idle
    /// outcome, not an error.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

impl<F: Fabric + ?Sized> Fabric for &mut F {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).send(frame)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).recv(buf)
    }
}

impl<F: Fabric + ?Sized> Fabric for Box<F> {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).send(frame)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).recv(buf)
    }
}
