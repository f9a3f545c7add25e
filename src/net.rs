//! A concrete UDP-backed [`DatagramReader`].
//!
//! Grounded in `rtp/socket.rs`'s `RtpSocket`: a `socket2::Socket` configured
//! with address reuse and a short receive timeout, converted into a
//! standard `UdpSocket`. Spec §5 requires the datagram source's `read()` to
//! be non-blocking or bounded-blocking; the short timeout here is what
//! bounds it.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Socket, Type};

use crate::datagram::{Datagram, DatagramReader};

/// Datagrams arriving on one bound local UDP port.
pub struct UdpDatagramSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    recv_buf: Vec<u8>,
}

impl UdpDatagramSource {
    /// Binds `local_addr` with a short receive timeout so `read()` never
    /// blocks the server loop for long.
    pub fn bind(local_addr: SocketAddr, max_datagram_size: usize) -> io::Result<Self> {
        let domain = if local_addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::DGRAM, None)?;
        socket.set_reuse_address(true)?;
        socket.set_read_timeout(Some(Duration::from_millis(10)))?;
        socket.bind(&local_addr.into())?;
        let socket: UdpSocket = socket.into();
        Ok(Self {
            socket,
            local_addr,
            recv_buf: vec![0u8; max_datagram_size],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl DatagramReader for UdpDatagramSource {
    fn read(&mut self) -> Option<Datagram> {
        match self.socket.recv_from(&mut self.recv_buf) {
            Ok((n, source)) => Some(Datagram {
                source,
                destination: self.local_addr,
                payload: Bytes::copy_from_slice(&self.recv_buf[..n]),
            }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => None,
            Err(e) => {
                log::trace!("udp datagram source read error: {e}");
                None
            }
        }
    }
}
