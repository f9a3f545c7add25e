//! Mixes every live session's per-channel readers into one interleaved
//! PCM output buffer (spec §4.12).

use crate::packet::{ChannelMask, MAX_CHANNELS};

use super::sink::{SharedStreamReader, Sink};

/// Implements [`Sink`]: sessions attach their final per-channel stream
/// reader here; `read` sums every attachment on each output channel into
/// one interleaved buffer.
pub struct ChannelMuxer {
    channels: ChannelMask,
    n_channels: usize,
    samples_per_tick: usize,
    attachments: Vec<Vec<SharedStreamReader>>,
    scratch: Vec<f32>,
}

impl ChannelMuxer {
    pub fn new(channels: ChannelMask, samples_per_tick: usize) -> Self {
        Self {
            channels,
            n_channels: channels.popcount(),
            samples_per_tick,
            attachments: vec![Vec::new(); MAX_CHANNELS],
            scratch: vec![0.0; samples_per_tick],
        }
    }

    /// Fills `out` (must be exactly `samples_per_tick * n_channels` long)
    /// with the saturating sum of every attached session's samples on
    /// each output channel (spec §4.12, §8: "always fills exactly
    /// `samples_per_tick × n_channels` samples").
    ///
    /// Summation happens in `f32`, wide enough that the configured
    /// session cap cannot overflow before a downstream sink clips it to
    /// its own sample type's range (spec §9 open question, resolved in
    /// SPEC_FULL.md §4: saturating-add policy, f32 precision).
    pub fn read(&mut self, out: &mut [f32]) {
        assert_eq!(
            out.len(),
            self.samples_per_tick * self.n_channels,
            "channel muxer: output buffer size must equal samples_per_tick * n_channels"
        );
        out.fill(0.0);

        for (local_index, channel) in self.channels.iter().enumerate() {
            for reader in &self.attachments[channel] {
                reader.borrow_mut().read(&mut self.scratch);
                for (frame, sample) in self.scratch.iter().enumerate() {
                    out[frame * self.n_channels + local_index] += sample;
                }
            }
        }
    }
}

impl Sink for ChannelMuxer {
    fn attach(&mut self, channel: usize, reader: SharedStreamReader) {
        self.attachments[channel].push(reader);
    }

    fn detach(&mut self, channel: usize, reader: &SharedStreamReader) {
        self.attachments[channel].retain(|existing| !std::rc::Rc::ptr_eq(existing, reader));
    }
}
