//! Per-session audio pipeline stages: the packet-reader chain (Delayer,
//! Watchdog, Scaler) and the per-channel stream chain (Chanalyzer,
//! Streamer, Resampler).
//!
//! Spec §9 models each stage as one of a small capability set
//! (`PacketReader`, `StreamReader`, `Tuner`) rather than a single deep
//! class hierarchy. This module defines those as traits; stages compose by
//! wrapping a `Box<dyn PacketReader>`/`Rc<RefCell<dyn StreamReader>>`.

mod chanalyzer;
mod delayer;
mod resampler;
mod scaler;
mod streamer;
mod watchdog;

pub use chanalyzer::Chanalyzer;
pub use delayer::Delayer;
pub use resampler::Resampler;
pub use scaler::Scaler;
pub use streamer::Streamer;
pub use watchdog::Watchdog;

use std::cell::RefCell;
use std::rc::Rc;

use crate::packet::{Packet, PacketQueue};

/// A stage that yields packets one at a time, synchronously.
pub trait PacketReader {
    fn read(&mut self) -> Option<Packet>;
}

/// A bounded packet FIFO is itself the bottom of every reader chain.
impl PacketReader for PacketQueue {
    fn read(&mut self) -> Option<Packet> {
        PacketQueue::read(self)
    }
}

/// Lets a stage be embedded in a `Box<dyn PacketReader>` chain while a
/// shared handle to it (for tuner updates, warm-state checks, or as a
/// Scaler's queue reference) stays with the owning [`Session`](crate::pipeline::Session).
/// This is the "non-owning reference into a Session-owned stage" pattern
/// spec §9 calls for, modeled with `Rc<RefCell<_>>` rather than raw
/// pointers.
impl<T: PacketReader> PacketReader for Rc<RefCell<T>> {
    fn read(&mut self) -> Option<Packet> {
        RefCell::borrow_mut(self).read()
    }
}

/// A stage that fills a caller-provided output buffer completely on every
/// call (spec §4.7: "fills the entire buffer").
pub trait StreamReader {
    fn read(&mut self, out: &mut [f32]);
}

/// Result of a tuner's `update()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerStatus {
    Alive,
    Broken,
}

/// A stage offering an `update()` hook invoked once per tick, ahead of any
/// sample reads (spec §5 "Ordering"). Watchdog and Scaler implement this.
pub trait Tuner {
    fn update(&mut self) -> TunerStatus;
}
