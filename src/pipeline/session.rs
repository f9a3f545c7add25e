//! One sender's pipeline: parse → route → queue → delay → watchdog →
//! (optional FEC) → per-channel split → stream → (optional resample).
//!
//! Construction order follows spec §4.10 exactly: audio queue, route
//! registration, Delayer, Watchdog (registered as a tuner), the optional
//! FEC stage, the optional Scaler (registered as a tuner), the Chanalyzer,
//! then one Streamer (and optional Resampler, registered with the Scaler)
//! per active channel. The pipeline is built once here and never mutated
//! afterwards.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::Rc;

use bytes::Bytes;

use crate::audio::{Chanalyzer, Delayer, PacketReader, Resampler, Scaler, StreamReader, Streamer, Tuner, TunerStatus, Watchdog};
use crate::config::{Options, ServerConfig};
use crate::fec::{FecDecoderStage, ReedSolomonBlockDecoder};
use crate::packet::wire::PacketParser;
use crate::packet::{PacketQueue, PacketType, Router};
use crate::pipeline::sink::Sink;

/// Per-session tick-based saturation tolerance for the Scaler before a
/// session is torn down (spec §4.9's "configured tolerance"; not named
/// in spec §6's config surface, so it is a pipeline-internal constant
/// rather than a `ServerConfig` field).
const SCALER_SATURATION_TOLERANCE_TICKS: u64 = 1_000;

/// Warming → Playing → Broken, spec §4.10's session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The Delayer is still withholding packets to build up latency.
    Warming,
    /// Samples are flowing.
    Playing,
    /// Terminal: `update()` failed (watchdog timeout or scaler saturation).
    Broken,
}

/// One live sender's pipeline. Owns every pipeline stage in place; the
/// stages are constructed once and never reallocated on the audio path
/// (spec §9 "in-place stage construction").
pub struct Session {
    address: SocketAddr,
    parser: Rc<dyn PacketParser>,
    router: Router,
    delayer: Rc<RefCell<Delayer>>,
    tuners: Vec<Rc<RefCell<dyn Tuner>>>,
    readers: Vec<Option<Rc<RefCell<dyn StreamReader>>>>,
    broken: bool,
}

impl Session {
    pub fn new(address: SocketAddr, parser: Rc<dyn PacketParser>, cfg: &ServerConfig) -> Self {
        let mut router = Router::new();

        let audio_queue = Rc::new(RefCell::new(PacketQueue::new(cfg.max_session_packets)));
        router.add_route(PacketType::Audio, audio_queue.clone());

        let reader: Box<dyn PacketReader> = Box::new(audio_queue.clone());
        let target_samples = cfg.latency_ticks * cfg.samples_per_tick as u64;
        let delayer = Rc::new(RefCell::new(Delayer::new(reader, target_samples)));

        let reader: Box<dyn PacketReader> = Box::new(delayer.clone());
        let watchdog = Rc::new(RefCell::new(Watchdog::new(reader, cfg.timeout_ticks)));
        let mut tuners: Vec<Rc<RefCell<dyn Tuner>>> = vec![watchdog.clone() as Rc<RefCell<dyn Tuner>>];

        let reader: Box<dyn PacketReader> = Box::new(watchdog.clone());
        let reader = if cfg.options.contains(Options::ENABLE_LDPC) {
            let fec_queue = Rc::new(RefCell::new(PacketQueue::new(cfg.max_session_packets)));
            router.add_route(PacketType::Fec, fec_queue.clone());
            Box::new(FecDecoderStage::new(
                reader,
                fec_queue,
                parser.clone(),
                Rc::new(ReedSolomonBlockDecoder),
                cfg.fec_source_count,
                cfg.fec_parity_count,
            )) as Box<dyn PacketReader>
        } else {
            reader
        };

        let scaler = if cfg.options.contains(Options::ENABLE_RESAMPLING) {
            let setpoint = cfg.latency_ticks as f64;
            let scaler = Rc::new(RefCell::new(Scaler::new(
                audio_queue,
                setpoint,
                SCALER_SATURATION_TOLERANCE_TICKS,
            )));
            tuners.push(scaler.clone() as Rc<RefCell<dyn Tuner>>);
            Some(scaler)
        } else {
            None
        };

        let chanalyzer = Chanalyzer::new(reader, cfg.channels);

        let mut readers: Vec<Option<Rc<RefCell<dyn StreamReader>>>> = vec![None; crate::packet::MAX_CHANNELS];
        for channel in cfg.channels.iter() {
            let streamer = Streamer::new(chanalyzer.channel(channel), cfg.options, cfg.sample_rate);
            let final_reader: Rc<RefCell<dyn StreamReader>> = match &scaler {
                Some(scaler) => {
                    let ratio = Rc::new(Cell::new(1.0));
                    scaler.borrow_mut().add_resampler(ratio.clone());
                    let resampler = Resampler::new(Box::new(streamer), ratio);
                    Rc::new(RefCell::new(resampler))
                }
                None => Rc::new(RefCell::new(streamer)),
            };
            readers[channel] = Some(final_reader);
        }

        Self {
            address,
            parser,
            router,
            delayer,
            tuners,
            readers,
            broken: false,
        }
    }

    /// The sender's transport address, this session's key in the
    /// `SessionManager`'s map.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Parses `payload` with this session's packet parser and routes the
    /// result. Returns `true` if the datagram was parsed and routed;
    /// parse failure is logged at trace and returns `false` (spec §4.10).
    pub fn store(&mut self, payload: &Bytes) -> bool {
        match self.parser.parse(payload) {
            Some(packet) => {
                self.router.write(packet);
                true
            }
            None => {
                log::trace!("session {}: dropping datagram: can't parse", self.address);
                false
            }
        }
    }

    /// Updates every registered tuner, Watchdog first, Scaler next.
    /// Returns `false` on the first failure, which also marks this
    /// session `Broken` (spec §4.10).
    pub fn update(&mut self) -> bool {
        for tuner in &self.tuners {
            if tuner.borrow_mut().update() == TunerStatus::Broken {
                log::debug!("session {}: tuner failed to update, terminating session", self.address);
                self.broken = true;
                return false;
            }
        }
        true
    }

    /// Current lifecycle state (spec §4.10).
    pub fn state(&self) -> SessionState {
        if self.broken {
            SessionState::Broken
        } else if self.delayer.borrow().is_warmed() {
            SessionState::Playing
        } else {
            SessionState::Warming
        }
    }

    /// Registers this session's per-channel readers under their channel
    /// index on `sink`.
    pub fn attach(&self, sink: &mut dyn Sink) {
        for (channel, reader) in self.readers.iter().enumerate() {
            if let Some(reader) = reader {
                sink.attach(channel, reader.clone());
            }
        }
    }

    /// Unregisters this session's per-channel readers from `sink`.
    pub fn detach(&self, sink: &mut dyn Sink) {
        for (channel, reader) in self.readers.iter().enumerate() {
            if let Some(reader) = reader {
                sink.detach(channel, reader);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::test_support::{NullSessionPool, VecByteBufferComposer, VecSampleBufferComposer};
    use crate::packet::wire::{encode_audio, SimplePacketParser};
    use crate::packet::ChannelMask;
    use crate::pipeline::muxer::ChannelMuxer;

    fn cfg(latency_ticks: u64, timeout_ticks: u64, options: Options) -> ServerConfig {
        ServerConfig::new(
            ChannelMask::from_bits(0x3),
            48_000,
            4,
            16,
            64,
            latency_ticks,
            timeout_ticks,
            10,
            4,
            Rc::new(VecByteBufferComposer),
            Rc::new(VecSampleBufferComposer),
            Rc::new(NullSessionPool),
            options,
        )
        .unwrap()
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn starts_warming_and_becomes_playing_after_latency() {
        let c = cfg(1, 100, Options::empty());
        let mut session = Session::new(addr(), Rc::new(SimplePacketParser), &c);
        assert_eq!(session.state(), SessionState::Warming);

        let raw = encode_audio(0, 0, ChannelMask::from_bits(0x3), &[0.0; 8]);
        assert!(session.store(&raw));

        let mut muxer = ChannelMuxer::new(ChannelMask::from_bits(0x3), 4);
        session.attach(&mut muxer);
        let mut out = vec![0.0; 8];
        muxer.read(&mut out);
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn watchdog_timeout_breaks_session() {
        let c = cfg(0, 2, Options::empty());
        let mut session = Session::new(addr(), Rc::new(SimplePacketParser), &c);
        assert!(session.update());
        assert!(session.update());
        assert!(!session.update());
        assert_eq!(session.state(), SessionState::Broken);
    }

    #[test]
    fn rejects_unparseable_datagram() {
        let c = cfg(0, 100, Options::empty());
        let mut session = Session::new(addr(), Rc::new(SimplePacketParser), &c);
        assert!(!session.store(&Bytes::from_static(&[0xFF])));
    }
}
