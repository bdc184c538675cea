//! In-memory fabric
//!
//! Two connected [`LoopbackFabric`] halves pass frames over crossbeam
//! channels. A drop filter on the sending half simulates a lossy link.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::io::{self, ErrorKind};
use tloe_protocol::Fabric;

/// Decides whether an outgoing frame is lost
pub type DropFilter = Box<dyn FnMut(&[u8]) -> bool + Send>;

/// One half of an in-memory fabric
pub struct LoopbackFabric {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    drop_filter: Option<DropFilter>,
    sent: u64,
    dropped: u64,
}

impl LoopbackFabric {
    /// Create two connected halves
    pub fn pair() -> (LoopbackFabric, LoopbackFabric) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        LoopbackFabric {
            tx,
            rx,
            drop_filter: None,
            sent: 0,
            dropped: 0,
        }
    }

    /// Drop every outgoing frame for which `filter` returns true
    pub fn set_drop_filter<F>(&mut self, filter: F)
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        self.drop_filter = Some(Box::new(filter));
    }

    pub fn clear_drop_filter(&mut self) {
        self.drop_filter = None;
    }

    /// Frames handed to the peer
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Frames discarded by the drop filter
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Frames waiting to be received on this half
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Fabric for LoopbackFabric {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        if let Some(filter) = self.drop_filter.as_mut() {
            if filter(frame) {
                self.dropped += 1;
                return Ok(());
            }
        }

        self.tx
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "loopback peer dropped"))?;
        self.sent += 1;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.rx.try_recv() {
            Ok(frame) => {
                if frame.len() > buf.len() {
                    return Err(io::Error::new(
                        ErrorKind::InvalidData,
                        "frame larger than receive buffer",
                    ));
                }
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(Some(frame.len()))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(io::Error::new(
                ErrorKind::ConnectionAborted,
                "loopback peer dropped",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (mut a, mut b) = LoopbackFabric::pair();
        a.send(b"one").unwrap();
        a.send(b"two").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(b.recv(&mut buf).unwrap(), Some(3));
        assert_eq!(&buf[..3], b"one");
        assert_eq!(b.recv(&mut buf).unwrap(), Some(3));
        assert_eq!(&buf[..3], b"two");
        assert_eq!(b.recv(&mut buf).unwrap(), None);
        assert_eq!(a.recv(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_drop_filter() {
        let (mut a, mut b) = LoopbackFabric::pair();
        a.set_drop_filter(|frame| frame[0] == 0xFF);

        a.send(&[0xFF]).unwrap();
        a.send(&[0x01]).unwrap();

        assert_eq!(a.dropped(), 1);
        assert_eq!(a.sent(), 1);
        assert_eq!(b.pending(), 1);

        let mut buf = [0u8; 4];
        assert_eq!(b.recv(&mut buf).unwrap(), Some(1));
        assert_eq!(buf[0], 0x01);
    }

    #[test]
    fn test_disconnected_peer() {
        let (mut a, b) = LoopbackFabric::pair();
        drop(b);

        let mut buf = [0u8; 4];
        assert!(a.send(b"x").is_err());
        assert!(a.recv(&mut buf).is_err());
    }
}
