//! Session pipeline and server-level mux/scheduler (spec §2, modules 6-13).
//!
//! A [`Session`] owns one sender's packet-to-PCM chain. Sessions attach
//! their per-channel readers to a [`ChannelMuxer`], which a [`Server`]
//! drives once per tick after routing arriving datagrams through a
//! [`SessionManager`].

pub mod manager;
pub mod muxer;
pub mod server;
pub mod session;
pub mod sink;

pub use manager::SessionManager;
pub use muxer::ChannelMuxer;
pub use server::{maybe_timed, validate_for_server, Server};
pub use session::{Session, SessionState};
pub use sink::{SharedStreamReader, Sink};
