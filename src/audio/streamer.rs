use super::chanalyzer::ChanalyzerChannel;
use super::StreamReader;
use crate::config::Options;

struct Pending {
    start: u64,
    samples: Vec<f32>,
    offset: usize,
}

/// Produces a continuous PCM sample stream for one channel by draining
/// audio packets from a [`ChanalyzerChannel`] (spec §4.7).
///
/// Gaps (a missing or late-arriving packet) are filled with silence, or
/// with a diagnostic tone when `EnableBeep` is set, rather than stalling
/// the output. The server must still emit one buffer every tick.
pub struct Streamer {
    source: ChanalyzerChannel,
    beep: bool,
    sample_rate: f32,
    position: u64,
    started: bool,
    pending: Option<Pending>,
    beep_phase: f32,
}

const BEEP_FREQUENCY_HZ: f32 = 440.0;
const BEEP_AMPLITUDE: f32 = 0.1;

impl Streamer {
    pub fn new(source: ChanalyzerChannel, options: Options, sample_rate: u32) -> Self {
        Self {
            source,
            beep: options.contains(Options::ENABLE_BEEP),
            sample_rate: sample_rate as f32,
            position: 0,
            started: false,
            pending: None,
            beep_phase: 0.0,
        }
    }

    /// Current stream position, the per-channel sample counter from spec
    /// §3 ("advances by exactly the number of samples returned").
    pub fn position(&self) -> u64 {
        self.position
    }

    fn gap_sample(&mut self) -> f32 {
        if !self.beep {
            return 0.0;
        }
        let sample = (self.beep_phase * 2.0 * std::f32::consts::PI).sin() * BEEP_AMPLITUDE;
        self.beep_phase += BEEP_FREQUENCY_HZ / self.sample_rate;
        if self.beep_phase >= 1.0 {
            self.beep_phase -= 1.0;
        }
        sample
    }

    /// Pulls packets from the Chanalyzer until one could plausibly supply
    /// the next sample, discarding any entirely in the past (spec §4.7: "a
    /// late-arriving packet whose timestamp precedes the current position
    /// is discarded").
    ///
    /// The very first packet a stream ever sees is never discarded this
    /// way even if it looks stale: while a session is Warming, `position`
    /// keeps advancing tick by tick through plain gap-fill (nothing has
    /// been attached downstream yet to consume real data), so by the time
    /// the Delayer releases its buffered backlog, that backlog's oldest
    /// packet is already "behind" `position`. Treat that first packet as
    /// the stream's actual starting point instead of dropping it. A
    /// channel that has already taken its turn on a packet gets `None`
    /// from the Chanalyzer until the remaining channels consume it too, so
    /// the late-packet discard path here never spins on the same packet.
    fn refill(&mut self) {
        while self.pending.is_none() {
            match self.source.next() {
                Some((start, samples)) => {
                    let end = start + samples.len() as u64;
                    if end <= self.position {
                        if self.started {
                            continue;
                        }
                        self.position = start;
                    }
                    self.started = true;
                    let offset = self.position.saturating_sub(start) as usize;
                    self.pending = Some(Pending { start, samples, offset });
                }
                None => return,
            }
        }
    }
}

impl StreamReader for Streamer {
    fn read(&mut self, out: &mut [f32]) {
        let mut filled = 0;
        while filled < out.len() {
            self.refill();
            match &mut self.pending {
                Some(pending) if pending.start > self.position => {
                    // Packet hasn't started yet: fill the gap up to its start.
                    let gap = (pending.start - self.position).min((out.len() - filled) as u64) as usize;
                    for slot in &mut out[filled..filled + gap] {
                        *slot = self.gap_sample();
                    }
                    self.position += gap as u64;
                    filled += gap;
                }
                Some(pending) => {
                    let available = pending.samples.len() - pending.offset;
                    if available == 0 {
                        self.pending = None;
                        continue;
                    }
                    let take = available.min(out.len() - filled);
                    out[filled..filled + take]
                        .copy_from_slice(&pending.samples[pending.offset..pending.offset + take]);
                    pending.offset += take;
                    self.position += take as u64;
                    filled += take;
                    if pending.offset >= pending.samples.len() {
                        self.pending = None;
                    }
                }
                None => {
                    out[filled] = self.gap_sample();
                    self.position += 1;
                    filled += 1;
                }
            }
        }
    }
}
