//! Server configuration, validated once at construction.
//!
//! Every non-null/non-zero requirement in this file is checked by
//! [`ServerConfig::new`]; a violation is a programmer error and is reported
//! as `Err(CoreError::Config(..))` rather than silently coerced, matching
//! spec §6/§7 ("all non-null/non-zero requirements are validated at
//! construction; violations are programmer errors").

use std::rc::Rc;

use crate::composer::{ByteBufferComposer, SampleBufferComposer, SessionPool};
use crate::error::CoreError;
use crate::packet::ChannelMask;

bitflags::bitflags! {
    /// Feature flags. Each corresponds to one optional stage in the session
    /// pipeline (spec §4.10's "optional FEC stage", "optional Scaler wrap",
    /// "optional per-channel Resampler") plus the server-loop timed writer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Options: u8 {
        /// Wrap each channel's Streamer in a Resampler driven by a Scaler.
        const ENABLE_RESAMPLING = 0b0001;
        /// Insert the FEC decoder stage between the audio queue and the
        /// rest of the chain.
        const ENABLE_LDPC       = 0b0010;
        /// Fill Streamer gaps with a diagnostic tone instead of silence.
        const ENABLE_BEEP       = 0b0100;
        /// Pace output to wall-clock via a timed-writer shim.
        const ENABLE_TIMING     = 0b1000;
    }
}

/// Top-level configuration for a [`crate::pipeline::Server`].
///
/// Constructed once via [`ServerConfig::new`]; every field named in spec
/// §6 is represented here.
pub struct ServerConfig {
    pub channels: ChannelMask,
    pub sample_rate: u32,
    pub samples_per_tick: usize,
    pub max_sessions: usize,
    pub max_session_packets: usize,
    pub latency_ticks: u64,
    pub timeout_ticks: u64,
    /// Source packets per FEC block. Only consulted when
    /// `Options::ENABLE_LDPC` is set.
    pub fec_source_count: usize,
    /// Repair packets per FEC block. Only consulted when
    /// `Options::ENABLE_LDPC` is set.
    pub fec_parity_count: usize,
    pub byte_buffer_composer: Rc<dyn ByteBufferComposer>,
    pub sample_buffer_composer: Rc<dyn SampleBufferComposer>,
    pub session_pool: Rc<dyn SessionPool>,
    pub options: Options,
}

impl ServerConfig {
    /// Validates every invariant spec §6 requires and returns the config,
    /// or a `CoreError::Config` naming the first violated invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channels: ChannelMask,
        sample_rate: u32,
        samples_per_tick: usize,
        max_sessions: usize,
        max_session_packets: usize,
        latency_ticks: u64,
        timeout_ticks: u64,
        fec_source_count: usize,
        fec_parity_count: usize,
        byte_buffer_composer: Rc<dyn ByteBufferComposer>,
        sample_buffer_composer: Rc<dyn SampleBufferComposer>,
        session_pool: Rc<dyn SessionPool>,
        options: Options,
    ) -> Result<Self, CoreError> {
        if channels.is_empty() {
            return Err(CoreError::Config("channel mask is zero"));
        }
        if samples_per_tick == 0 {
            return Err(CoreError::Config("samples_per_tick is zero"));
        }
        if sample_rate == 0 {
            return Err(CoreError::Config("sample_rate is zero"));
        }
        if max_sessions == 0 {
            return Err(CoreError::Config("max_sessions is zero"));
        }
        if max_session_packets == 0 {
            return Err(CoreError::Config("max_session_packets is zero"));
        }
        if options.contains(Options::ENABLE_LDPC) && (fec_source_count == 0 || fec_parity_count == 0) {
            return Err(CoreError::Config("fec source/parity count is zero with EnableLDPC set"));
        }
        Ok(Self {
            channels,
            sample_rate,
            samples_per_tick,
            max_sessions,
            max_session_packets,
            latency_ticks,
            timeout_ticks,
            fec_source_count,
            fec_parity_count,
            byte_buffer_composer,
            sample_buffer_composer,
            session_pool,
            options,
        })
    }

    pub fn n_channels(&self) -> usize {
        self.channels.popcount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::test_support::{NullSessionPool, VecByteBufferComposer, VecSampleBufferComposer};

    fn deps() -> (
        Rc<dyn ByteBufferComposer>,
        Rc<dyn SampleBufferComposer>,
        Rc<dyn SessionPool>,
    ) {
        (
            Rc::new(VecByteBufferComposer),
            Rc::new(VecSampleBufferComposer),
            Rc::new(NullSessionPool),
        )
    }

    #[test]
    fn rejects_zero_channel_mask() {
        let (b, s, p) = deps();
        let err = ServerConfig::new(
            ChannelMask::EMPTY,
            48_000,
            320,
            16,
            64,
            10,
            100,
            10,
            4,
            b,
            s,
            p,
            Options::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn rejects_zero_samples_per_tick() {
        let (b, s, p) = deps();
        let err = ServerConfig::new(
            ChannelMask::from_bits(0x3),
            48_000,
            0,
            16,
            64,
            10,
            100,
            10,
            4,
            b,
            s,
            p,
            Options::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn rejects_ldpc_with_zero_fec_counts() {
        let (b, s, p) = deps();
        let err = ServerConfig::new(
            ChannelMask::from_bits(0x3),
            48_000,
            320,
            16,
            64,
            10,
            100,
            0,
            0,
            b,
            s,
            p,
            Options::ENABLE_LDPC,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn accepts_valid_config() {
        let (b, s, p) = deps();
        let cfg = ServerConfig::new(
            ChannelMask::from_bits(0x3),
            48_000,
            320,
            16,
            64,
            10,
            100,
            10,
            4,
            b,
            s,
            p,
            Options::ENABLE_BEEP,
        )
        .unwrap();
        assert_eq!(cfg.n_channels(), 2);
    }
}
