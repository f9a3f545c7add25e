//! Ingress interface: an opaque datagram source.
//!
//! Spec §6: "`IDatagramReader.read()` returns a datagram or 'none'. A
//! datagram carries: source address, destination address, opaque payload
//! bytes." The concrete transport is out of scope for the core; `net`
//! supplies one UDP-backed implementation grounded in `rtp/socket.rs`.

use std::net::SocketAddr;

use bytes::Bytes;

/// One received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub source: SocketAddr,
    pub destination: SocketAddr,
    pub payload: Bytes,
}

/// Non-blocking (or bounded-blocking) datagram source. Spec §5: this is
/// the core's only permitted suspension point.
pub trait DatagramReader {
    /// Returns the next available datagram, or `None` if none is ready
    /// right now. Must not block longer than a short, bounded timeout.
    fn read(&mut self) -> Option<Datagram>;
}

/// `VecDeque`-backed datagram source for tests and simple in-process
/// hosts. Not part of the stable public surface.
pub mod test_support {
    use std::collections::VecDeque;

    use super::{Datagram, DatagramReader};

    /// Replays a pre-queued sequence of datagrams, then reports `None`
    /// forever.
    #[derive(Default)]
    pub struct VecDatagramSource {
        pending: VecDeque<Datagram>,
    }

    impl VecDatagramSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, datagram: Datagram) {
            self.pending.push_back(datagram);
        }
    }

    impl DatagramReader for VecDatagramSource {
        fn read(&mut self) -> Option<Datagram> {
            self.pending.pop_front()
        }
    }
}
