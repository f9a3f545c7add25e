//! External buffer/session allocator interfaces.
//!
//! Spec §6 treats byte buffers, sample buffers and sessions as coming from
//! caller-supplied pool/composer interfaces; the core never allocates on
//! the audio path itself (spec §9 "in-place stage construction"). These
//! traits are the seams; `test_support` below gives simple `Vec`-backed
//! implementations used by this crate's own tests (not exported outside
//! `#[cfg(test)]`/`cfg(feature = "test-support")` use).

use crate::pipeline::Session;

/// Produces byte buffers, e.g. for FEC reconstruction scratch space.
pub trait ByteBufferComposer {
    fn compose(&self, size: usize) -> Option<Vec<u8>>;
}

/// Produces interleaved sample buffers for one tick's output.
pub trait SampleBufferComposer {
    fn compose(&self, size: usize) -> Option<Vec<f32>>;
}

/// Allocates and reclaims [`Session`] instances.
///
/// Spec §4.11: "session destruction returns the Session to its pool."
pub trait SessionPool {
    /// Hands a constructed session's storage to the pool.
    fn acquire(&self) -> Option<()> {
        // Default: pool is unbounded and stores nothing itself; the
        // `Session` type is plain heap-allocated. Pools with a real
        // capacity limit should override this to return `None` once
        // exhausted.
        Some(())
    }

    /// Reclaims a session being retired. Default is a no-op drop.
    fn release(&self, _session: Session) {}
}

/// `Vec`-backed composer/pool implementations for tests and simple
/// in-process hosts. Not part of the stable public surface.
pub mod test_support {
    use super::*;

    pub struct VecByteBufferComposer;
    impl ByteBufferComposer for VecByteBufferComposer {
        fn compose(&self, size: usize) -> Option<Vec<u8>> {
            Some(vec![0u8; size])
        }
    }

    pub struct VecSampleBufferComposer;
    impl SampleBufferComposer for VecSampleBufferComposer {
        fn compose(&self, size: usize) -> Option<Vec<f32>> {
            Some(vec![0.0f32; size])
        }
    }

    pub struct NullSessionPool;
    impl SessionPool for NullSessionPool {}

    /// A composer that always fails, for exercising resource-exhaustion
    /// paths in tests.
    pub struct ExhaustedSampleBufferComposer;
    impl SampleBufferComposer for ExhaustedSampleBufferComposer {
        fn compose(&self, _size: usize) -> Option<Vec<f32>> {
            None
        }
    }
}
