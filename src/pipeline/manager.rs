//! Creates, looks up, and retires sessions; routes datagrams by listening
//! port (spec §4.11).

use std::collections::HashMap;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::config::ServerConfig;
use crate::datagram::Datagram;
use crate::packet::wire::PacketParser;

use super::muxer::ChannelMuxer;
use super::session::Session;

/// Owns every live session, keyed by the sender's transport address.
pub struct SessionManager {
    cfg: Rc<ServerConfig>,
    muxer: Rc<RefCell<ChannelMuxer>>,
    ports: HashMap<SocketAddr, Rc<dyn PacketParser>>,
    sessions: HashMap<SocketAddr, Session>,
}

impl SessionManager {
    pub fn new(cfg: Rc<ServerConfig>, muxer: Rc<RefCell<ChannelMuxer>>) -> Self {
        Self {
            cfg,
            muxer,
            ports: HashMap::new(),
            sessions: HashMap::new(),
        }
    }

    /// Registers `address` as a port to accept datagrams on, using
    /// `parser` to parse them. Duplicate registration is a programmer
    /// error and panics (spec §4.11).
    pub fn add_port(&mut self, address: SocketAddr, parser: Rc<dyn PacketParser>) {
        if self.ports.insert(address, parser).is_some() {
            panic!("session manager: duplicate port registration for {address}");
        }
    }

    /// Routes one datagram to its session, creating the session on first
    /// sight of a new sender address. Drops the datagram (with a trace
    /// log) if its destination isn't a registered port, if `max_sessions`
    /// would be exceeded, or if the session pool is exhausted (spec
    /// §4.11, §7).
    pub fn store(&mut self, datagram: &Datagram) {
        let Some(parser) = self.ports.get(&datagram.destination).cloned() else {
            log::trace!(
                "session manager: no port registered for destination {}, dropping datagram",
                datagram.destination
            );
            return;
        };

        if !self.sessions.contains_key(&datagram.source) {
            if self.sessions.len() >= self.cfg.max_sessions {
                log::trace!(
                    "session manager: max_sessions ({}) reached, dropping datagram from {}",
                    self.cfg.max_sessions,
                    datagram.source
                );
                return;
            }
            if self.cfg.session_pool.acquire().is_none() {
                log::trace!(
                    "session manager: session pool exhausted, dropping datagram from {}",
                    datagram.source
                );
                return;
            }

            let session = Session::new(datagram.source, parser, &self.cfg);
            session.attach(&mut *self.muxer.borrow_mut());
            self.sessions.insert(datagram.source, session);
        }

        if let Some(session) = self.sessions.get_mut(&datagram.source) {
            session.store(&datagram.payload);
        }
    }

    /// Updates every live session; a session whose `update()` fails is
    /// detached from the muxer and returned to the session pool (spec
    /// §4.11). Individual session failures never make this return
    /// `false`; only a caller-specified fatal condition would, which
    /// this core never raises on its own.
    pub fn update(&mut self) -> bool {
        let broken: Vec<SocketAddr> = self
            .sessions
            .iter_mut()
            .filter(|(_, session)| !session.update())
            .map(|(addr, _)| *addr)
            .collect();

        for addr in broken {
            if let Some(session) = self.sessions.remove(&addr) {
                session.detach(&mut *self.muxer.borrow_mut());
                self.cfg.session_pool.release(session);
            }
        }

        true
    }

    /// Number of currently live sessions.
    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::test_support::{NullSessionPool, VecByteBufferComposer, VecSampleBufferComposer};
    use crate::config::Options;
    use crate::packet::wire::{encode_audio, SimplePacketParser};
    use crate::packet::ChannelMask;
    use bytes::Bytes;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn test_cfg(max_sessions: usize, timeout_ticks: u64) -> Rc<ServerConfig> {
        Rc::new(
            ServerConfig::new(
                ChannelMask::from_bits(0x3),
                48_000,
                4,
                max_sessions,
                64,
                0,
                timeout_ticks,
                10,
                4,
                Rc::new(VecByteBufferComposer),
                Rc::new(VecSampleBufferComposer),
                Rc::new(NullSessionPool),
                Options::empty(),
            )
            .unwrap(),
        )
    }

    fn manager(max_sessions: usize, timeout_ticks: u64) -> SessionManager {
        let cfg = test_cfg(max_sessions, timeout_ticks);
        let muxer = Rc::new(RefCell::new(ChannelMuxer::new(cfg.channels, cfg.samples_per_tick)));
        SessionManager::new(cfg, muxer)
    }

    fn audio_datagram(dst: SocketAddr, src: SocketAddr, seq: u32) -> Datagram {
        Datagram {
            source: src,
            destination: dst,
            payload: encode_audio(seq, seq as u64 * 4, ChannelMask::from_bits(0x3), &[0.0; 8]),
        }
    }

    #[test]
    fn creates_session_on_first_datagram_for_registered_port() {
        let mut m = manager(16, 100);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        m.store(&audio_datagram(dst, addr(1), 0));
        assert_eq!(m.num_sessions(), 1);
    }

    #[test]
    fn drops_datagram_for_unregistered_port() {
        let mut m = manager(16, 100);
        m.store(&audio_datagram(addr(9000), addr(1), 0));
        assert_eq!(m.num_sessions(), 0);
    }

    #[test]
    fn drops_new_session_once_max_sessions_reached() {
        let mut m = manager(1, 100);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        m.store(&audio_datagram(dst, addr(1), 0));
        m.store(&audio_datagram(dst, addr(2), 0));
        assert_eq!(m.num_sessions(), 1);
    }

    #[test]
    fn same_sender_reuses_existing_session() {
        let mut m = manager(16, 100);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        let sender = addr(1);
        m.store(&audio_datagram(dst, sender, 0));
        m.store(&audio_datagram(dst, sender, 1));
        assert_eq!(m.num_sessions(), 1);
    }

    #[test]
    fn watchdog_timeout_retires_session_within_one_update_after_the_deadline() {
        let mut m = manager(16, 2);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        m.store(&audio_datagram(dst, addr(1), 0));
        assert_eq!(m.num_sessions(), 1);
        assert!(m.update());
        assert!(m.update());
        assert!(m.update());
        assert_eq!(m.num_sessions(), 0);
    }

    #[test]
    #[should_panic(expected = "duplicate port registration")]
    fn panics_on_duplicate_port_registration() {
        let mut m = manager(16, 100);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        m.add_port(dst, Rc::new(SimplePacketParser));
    }

    #[test]
    fn malformed_datagram_is_dropped_without_creating_extra_state() {
        let mut m = manager(16, 100);
        let dst = addr(9000);
        m.add_port(dst, Rc::new(SimplePacketParser));
        m.store(&Datagram {
            source: addr(1),
            destination: dst,
            payload: Bytes::from_static(&[0xFF]),
        });
        assert_eq!(m.num_sessions(), 1);
    }
}
