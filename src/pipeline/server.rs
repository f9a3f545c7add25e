//! Tick scheduler: pulls datagrams, advances sessions, produces one output
//! buffer per tick (spec §4.13).

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use crate::config::{Options, ServerConfig};
use crate::datagram::DatagramReader;
use crate::egress::SampleBufferWriter;
use crate::error::CoreError;
use crate::packet::wire::PacketParser;

use super::manager::SessionManager;
use super::muxer::ChannelMuxer;

/// Owns the datagram source, the session manager, the channel muxer, and
/// the downstream writer. The only public entry point once constructed is
/// [`Server::run`] (or `tick` directly, for callers driving their own
/// loop).
pub struct Server {
    cfg: Rc<ServerConfig>,
    datagram_reader: Box<dyn DatagramReader>,
    session_manager: SessionManager,
    muxer: Rc<RefCell<ChannelMuxer>>,
    writer: Box<dyn SampleBufferWriter>,
    stop: bool,
}

impl Server {
    pub fn new(
        datagram_reader: Box<dyn DatagramReader>,
        writer: Box<dyn SampleBufferWriter>,
        cfg: Rc<ServerConfig>,
    ) -> Self {
        let muxer = Rc::new(RefCell::new(ChannelMuxer::new(cfg.channels, cfg.samples_per_tick)));
        let session_manager = SessionManager::new(cfg.clone(), muxer.clone());
        Self {
            cfg,
            datagram_reader,
            session_manager,
            muxer,
            writer,
            stop: false,
        }
    }

    /// Forwarded to the `SessionManager` (spec §4.13).
    pub fn add_port(&mut self, address: SocketAddr, parser: Rc<dyn PacketParser>) {
        self.session_manager.add_port(address, parser);
    }

    pub fn num_sessions(&self) -> usize {
        self.session_manager.num_sessions()
    }

    /// Observed between ticks only; in-flight ticks always complete
    /// (spec §5 "Cancellation").
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Runs ticks until `stop()` is observed or a tick fails fatally.
    /// Emits a sentinel empty buffer on termination either way (spec
    /// §4.13, §7).
    pub fn run(&mut self) {
        log::debug!("server: starting");
        while !self.stop {
            if !self.tick() {
                break;
            }
        }
        log::debug!("server: finishing");
        self.writer.write(&[]);
    }

    /// One tick: ingest up to `max_sessions * max_session_packets`
    /// datagrams (stop early on empty), update every session, then
    /// compose, mix, and emit one output buffer. Returns `false` only if
    /// composing the output buffer failed; that is fatal to the loop
    /// (spec §7 "output buffer exhaustion terminates the server loop").
    pub fn tick(&mut self) -> bool {
        self.tick_ingest();
        self.tick_update();
        self.tick_emit()
    }

    fn tick_ingest(&mut self) {
        let budget = self.cfg.max_sessions * self.cfg.max_session_packets;
        for _ in 0..budget {
            match self.datagram_reader.read() {
                Some(datagram) => self.session_manager.store(&datagram),
                None => break,
            }
        }
    }

    fn tick_update(&mut self) {
        self.session_manager.update();
    }

    fn tick_emit(&mut self) -> bool {
        let n_samples = self.cfg.samples_per_tick * self.cfg.n_channels();
        let mut buffer = match self.cfg.sample_buffer_composer.compose(n_samples) {
            Some(buffer) => buffer,
            None => {
                log::error!("server: can't compose sample buffer");
                return false;
            }
        };
        self.muxer.borrow_mut().read(&mut buffer);
        self.writer.write(&buffer);
        true
    }
}

/// Constructs the `SampleBufferWriter` the server writes to: the plain
/// writer, or (when `Options::ENABLE_TIMING` is set) that writer wrapped
/// in a [`crate::egress::TimedWriter`] pacing output to wall-clock.
pub fn maybe_timed<W: SampleBufferWriter + 'static>(
    writer: W,
    cfg: &ServerConfig,
) -> Box<dyn SampleBufferWriter> {
    if cfg.options.contains(Options::ENABLE_TIMING) {
        Box::new(crate::egress::TimedWriter::new(
            writer,
            cfg.channels,
            cfg.sample_rate,
            cfg.samples_per_tick,
        ))
    } else {
        Box::new(writer)
    }
}

/// Validates the handful of invariants `Server::new` itself depends on
/// beyond what `ServerConfig::new` already checked, mirroring the
/// original's constructor-time panics (spec §7.1 "loud abort"; here
/// surfaced as `Result` per SPEC_FULL.md §6.2's idiomatic-Rust choice).
pub fn validate_for_server(cfg: &ServerConfig) -> Result<(), CoreError> {
    if cfg.n_channels() == 0 {
        return Err(CoreError::Config("server: channel mask selects zero channels"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::test_support::{ExhaustedSampleBufferComposer, NullSessionPool, VecByteBufferComposer, VecSampleBufferComposer};
    use crate::datagram::test_support::VecDatagramSource;
    use crate::datagram::Datagram;
    use crate::egress::test_support::RecordingWriter;
    use crate::packet::wire::{encode_audio, SimplePacketParser};
    use crate::packet::ChannelMask;

    fn cfg_with(
        options: Options,
        max_sessions: usize,
        sample_buffer_composer: Rc<dyn crate::composer::SampleBufferComposer>,
    ) -> Rc<ServerConfig> {
        Rc::new(
            ServerConfig::new(
                ChannelMask::from_bits(0x3),
                48_000,
                4,
                max_sessions,
                64,
                1,
                100,
                10,
                4,
                Rc::new(VecByteBufferComposer),
                sample_buffer_composer,
                Rc::new(NullSessionPool),
                options,
            )
            .unwrap(),
        )
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn every_tick_emits_a_full_size_buffer() {
        let cfg = cfg_with(Options::empty(), 16, Rc::new(VecSampleBufferComposer));
        let mut source = VecDatagramSource::new();
        let dst = addr(9000);
        source.push(Datagram {
            source: addr(1),
            destination: dst,
            payload: encode_audio(0, 0, ChannelMask::from_bits(0x3), &[0.0; 8]),
        });
        let writer = RecordingWriter::new();
        let buffers = writer.buffers();
        let mut server = Server::new(Box::new(source), Box::new(writer), cfg.clone());
        server.add_port(dst, Rc::new(SimplePacketParser));

        for _ in 0..3 {
            assert!(server.tick());
        }

        let recorded = buffers.borrow();
        assert_eq!(recorded.len(), 3);
        for buf in recorded.iter() {
            assert_eq!(buf.len(), 4 * cfg.n_channels());
        }
    }

    #[test]
    fn run_emits_sentinel_empty_buffer_on_stop() {
        let cfg = cfg_with(Options::empty(), 16, Rc::new(VecSampleBufferComposer));
        let source = VecDatagramSource::new();
        let writer = RecordingWriter::new();
        let buffers = writer.buffers();
        let mut server = Server::new(Box::new(source), Box::new(writer), cfg);
        server.stop();
        server.run();
        let recorded = buffers.borrow();
        assert_eq!(recorded.last().unwrap().len(), 0);
    }

    #[test]
    fn exhausted_sample_buffer_composer_is_fatal_to_the_loop() {
        let cfg = cfg_with(Options::empty(), 16, Rc::new(ExhaustedSampleBufferComposer));
        let source = VecDatagramSource::new();
        let writer = RecordingWriter::new();
        let buffers = writer.buffers();
        let mut server = Server::new(Box::new(source), Box::new(writer), cfg);
        assert!(!server.tick());
        server.run();
        // run() still emits the end-of-stream sentinel even though the
        // loop broke out of its first tick.
        assert_eq!(buffers.borrow().last().unwrap().len(), 0);
    }

    #[test]
    fn two_senders_mix_into_one_buffer() {
        let cfg = cfg_with(Options::empty(), 16, Rc::new(VecSampleBufferComposer));
        let mut source = VecDatagramSource::new();
        let dst = addr(9000);
        source.push(Datagram {
            source: addr(1),
            destination: dst,
            payload: encode_audio(0, 0, ChannelMask::from_bits(0x1), &[1.0; 4]),
        });
        source.push(Datagram {
            source: addr(2),
            destination: dst,
            payload: encode_audio(0, 0, ChannelMask::from_bits(0x1), &[2.0; 4]),
        });
        let writer = RecordingWriter::new();
        let buffers = writer.buffers();
        let mut server = Server::new(Box::new(source), Box::new(writer), cfg);
        server.add_port(dst, Rc::new(SimplePacketParser));
        assert!(server.tick());
        let recorded = buffers.borrow();
        // latency is 1 tick, and each sender's first packet alone already
        // meets that target, so both sessions warm up and pass their data
        // through on this very first tick: channel 0 sums both senders,
        // channel 1 (never fed) stays silent.
        for frame in 0..4 {
            assert_eq!(recorded[0][frame * 2], 3.0);
            assert_eq!(recorded[0][frame * 2 + 1], 0.0);
        }
    }
}
