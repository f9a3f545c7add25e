//! audio-session-core: the session pipeline and server-level mux/scheduler
//! for a real-time, multi-sender audio receiver.
//!
//! The core ingests UDP-style datagrams carrying encoded audio (and
//! optionally FEC repair) packets from many concurrent senders,
//! demultiplexes them into per-sender [`pipeline::Session`]s, reconstructs
//! continuous multichannel PCM from each, mixes every live session through
//! a [`pipeline::ChannelMuxer`], and emits fixed-size PCM buffers downstream
//! at a steady tick rate via [`pipeline::Server`].
//!
//! ## Modules
//!
//! - [`packet`]: the wire-independent packet model, bounded queues, and
//!   type-based routing.
//! - [`audio`]: per-session pipeline stages (Delayer, Watchdog, Chanalyzer,
//!   Streamer, Resampler, Scaler), composed as small trait objects rather
//!   than one deep class hierarchy.
//! - [`fec`]: Reed-Solomon block reconstruction of missing source packets.
//! - [`pipeline`]: `Session`, `SessionManager`, `ChannelMuxer`, `Server`,
//!   the part that ties every stage into one running receiver.
//! - [`config`]: `ServerConfig` and `Options`, validated once at
//!   construction.
//! - [`datagram`] / [`egress`] / [`composer`]: the external collaborator
//!   interfaces (ingress, egress, allocators) the core is built against but
//!   does not implement a concrete instance of, except [`net`]'s UDP source.
//!
//! The core is single-threaded and cooperative: one thread calls
//! [`pipeline::Server::run`], and every stage runs synchronously on that
//! thread. The only suspension point is the datagram source's `read()`.

pub mod audio;
pub mod composer;
pub mod config;
pub mod datagram;
pub mod egress;
pub mod error;
pub mod fec;
pub mod net;
pub mod packet;
pub mod pipeline;

pub use composer::{ByteBufferComposer, SampleBufferComposer, SessionPool};
pub use config::{Options, ServerConfig};
pub use datagram::{Datagram, DatagramReader};
pub use egress::SampleBufferWriter;
pub use error::CoreError;
pub use net::UdpDatagramSource;
pub use pipeline::{ChannelMuxer, Server, Session, SessionManager, SessionState};
