//! The attachment contract a [`Session`](super::Session) registers its
//! per-channel readers on (spec §4.10 `attach`/`detach`, §4.12 `ISink`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::audio::StreamReader;

/// A shared, type-erased per-channel stream reader. Readers are shared
/// (not owned) by the sink they're attached to; the owning
/// [`Session`](super::Session) keeps the only strong reference that
/// matters for lifetime purposes, and the sink's reference is dropped on
/// `detach`.
pub type SharedStreamReader = Rc<RefCell<dyn StreamReader>>;

/// Collects per-channel reader attachments from live sessions. Implemented
/// by [`ChannelMuxer`](super::ChannelMuxer).
pub trait Sink {
    /// Registers `reader` as a source for `channel`.
    fn attach(&mut self, channel: usize, reader: SharedStreamReader);

    /// Unregisters the attachment matching `reader`'s identity from
    /// `channel`, if present.
    fn detach(&mut self, channel: usize, reader: &SharedStreamReader);
}
