//! UDP fabric
//!
//! Carries TLoE frames as UDP datagrams between two fixed addresses. Useful
//! for running endpoints across hosts without raw Ethernet access.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use thiserror::Error;
use tloe_protocol::Fabric;
use tracing::debug;

/// Socket configuration errors
#[derive(Error, Debug)]
pub enum FabricError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Local address {local} and peer {peer} use different address families")]
    AddressFamilyMismatch { local: SocketAddr, peer: SocketAddr },
}

/// Non-blocking UDP fabric tied to a single peer
pub struct UdpFabric {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpFabric {
    /// Bind to `local` and exchange frames with `peer`
    pub fn bind(local: SocketAddr, peer: SocketAddr) -> Result<Self, FabricError> {
        if local.is_ipv4() != peer.is_ipv4() {
            return Err(FabricError::AddressFamilyMismatch { local, peer });
        }

        let domain = if local.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local.into())?;
        socket.set_nonblocking(true)?;

        Ok(UdpFabric {
            socket: socket.into(),
            peer,
        })
    }

    /// Set the kernel receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), FabricError> {
        socket2::SockRef::from(&self.socket).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the local address this fabric is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, FabricError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Fabric for UdpFabric {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.socket.send_to(frame, self.peer)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            match self.socket.recv_from(buf) {
                Ok((n, from)) if from == self.peer => return Ok(Some(n)),
                Ok((n, from)) => {
                    debug!(%from, size = n, "dropping datagram from unknown source");
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use tloe_protocol::frame::MAX_FRAME_SIZE;
    use tloe_protocol::{Endpoint, RxEvent};

    fn pair() -> (UdpFabric, UdpFabric) {
        let a = UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        (
            UdpFabric::bind(a, b).unwrap(),
            UdpFabric::bind(b, a).unwrap(),
        )
    }

    #[test]
    fn test_fabric_send_recv() {
        let (mut left, mut right) = pair();
        let mut buf = [0u8; 64];

        assert_eq!(right.recv(&mut buf).unwrap(), None);

        left.send(b"TLoE frame").unwrap();
        for _ in 0..50 {
            if let Some(n) = right.recv(&mut buf).unwrap() {
                assert_eq!(&buf[..n], b"TLoE frame");
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("Failed to receive frame");
    }

    #[test]
    fn test_family_mismatch() {
        let result = UdpFabric::bind(
            "127.0.0.1:0".parse().unwrap(),
            "[::1]:9000".parse().unwrap(),
        );
        assert!(matches!(
            result,
            Err(FabricError::AddressFamilyMismatch { .. })
        ));
    }

    #[test]
    fn test_oversized_datagram_not_truncated_into_a_frame() {
        let (mut left, mut right) = pair();
        let mut endpoint = Endpoint::default();

        // Marker set in the real mask word, zeros where a 1500-byte cut would
        // put it
        let mut datagram = vec![0u8; MAX_FRAME_SIZE + 100];
        datagram[3] = 5;
        let last = datagram.len() - 1;
        datagram[last] = 1;
        left.send(&datagram).unwrap();

        for _ in 0..50 {
            let cycle = endpoint.poll(&mut right, Instant::now()).unwrap();
            if cycle.event != RxEvent::Idle {
                assert_eq!(cycle.event, RxEvent::Malformed);
                assert_eq!(endpoint.stats().malformed, 1);
                assert_eq!(endpoint.stats().acks, 0);
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("Failed to receive datagram");
    }
}
