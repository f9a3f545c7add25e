use std::cell::RefCell;
use std::rc::Rc;

use super::PacketReader;
use crate::packet::{ChannelMask, Packet};

struct PendingPacket {
    timestamp: u64,
    mask: ChannelMask,
    channel_count: usize,
    payload: Vec<f32>,
}

struct Inner {
    upstream: Box<dyn PacketReader>,
    active: ChannelMask,
    pending: Option<PendingPacket>,
    consumed: ChannelMask,
}

impl Inner {
    fn next_for_channel(&mut self, channel: usize) -> Option<(u64, Vec<f32>)> {
        if self.pending.is_none() {
            loop {
                let packet = self.upstream.read()?;
                if let Packet::Audio(audio) = packet {
                    self.pending = Some(PendingPacket {
                        timestamp: audio.timestamp,
                        mask: audio.channel_mask,
                        channel_count: audio.channel_mask.popcount(),
                        payload: audio.payload,
                    });
                    self.consumed = ChannelMask::EMPTY;
                    break;
                }
                // FEC packets never reach here: they are routed to the FEC
                // queue directly and consumed by the FEC decoder stage.
            }
        } else if self.consumed.contains(channel) {
            // This channel already took its turn on the current packet; it
            // must wait for the remaining channels to consume before a new
            // packet rotates in, not be handed the same one again.
            return None;
        }
        let pending = self.pending.as_ref().expect("just populated above");
        let local_index = pending.mask.local_index_of(channel);
        let timestamp = pending.timestamp;
        let samples = match local_index {
            Some(idx) => {
                let frame_count = if pending.channel_count == 0 {
                    0
                } else {
                    pending.payload.len() / pending.channel_count
                };
                (0..frame_count).map(|k| pending.payload[k * pending.channel_count + idx]).collect()
            }
            None => Vec::new(),
        };
        self.consumed.set(channel);
        if self.consumed.is_superset_of(self.active) {
            self.pending = None;
        }
        Some((timestamp, samples))
    }
}

/// Splits a multichannel audio packet stream into per-channel views. The
/// same incoming packet is consumed exactly once and shared across every
/// channel's [`Streamer`](super::Streamer) (spec §4.6).
#[derive(Clone)]
pub struct Chanalyzer {
    inner: Rc<RefCell<Inner>>,
}

impl Chanalyzer {
    pub fn new(upstream: Box<dyn PacketReader>, active: ChannelMask) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                upstream,
                active,
                pending: None,
                consumed: ChannelMask::EMPTY,
            })),
        }
    }

    /// A handle bound to one channel, to be given to that channel's
    /// Streamer.
    pub fn channel(&self, channel: usize) -> ChanalyzerChannel {
        ChanalyzerChannel {
            inner: self.inner.clone(),
            channel,
        }
    }
}

/// One channel's view onto a shared [`Chanalyzer`].
#[derive(Clone)]
pub struct ChanalyzerChannel {
    inner: Rc<RefCell<Inner>>,
    channel: usize,
}

impl ChanalyzerChannel {
    /// Pulls the next chunk of this channel's samples, fetching a fresh
    /// packet from upstream only once every active channel has consumed
    /// the current one.
    pub fn next(&self) -> Option<(u64, Vec<f32>)> {
        self.inner.borrow_mut().next_for_channel(self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::AudioPacket;
    use bytes::Bytes;
    use std::collections::VecDeque;

    struct FakeUpstream(VecDeque<Packet>);
    impl PacketReader for FakeUpstream {
        fn read(&mut self) -> Option<Packet> {
            self.0.pop_front()
        }
    }

    fn stereo_packet(timestamp: u64, left: f32, right: f32, frames: usize) -> Packet {
        let mut payload = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            payload.push(left);
            payload.push(right);
        }
        Packet::Audio(AudioPacket {
            sequence: 0,
            timestamp,
            channel_mask: ChannelMask::from_bits(0x3),
            payload,
            raw: Bytes::new(),
        })
    }

    #[test]
    fn same_packet_shared_across_channels() {
        let upstream = FakeUpstream(VecDeque::from([stereo_packet(0, 1.0, 2.0, 4)]));
        let chanalyzer = Chanalyzer::new(Box::new(upstream), ChannelMask::from_bits(0x3));
        let left = chanalyzer.channel(0);
        let right = chanalyzer.channel(1);
        let (ts_l, samples_l) = left.next().unwrap();
        let (ts_r, samples_r) = right.next().unwrap();
        assert_eq!(ts_l, ts_r);
        assert_eq!(samples_l, vec![1.0; 4]);
        assert_eq!(samples_r, vec![2.0; 4]);
    }

    #[test]
    fn repeat_call_before_other_channels_consume_returns_none_instead_of_repeating() {
        let upstream = FakeUpstream(VecDeque::from([stereo_packet(0, 1.0, 2.0, 2)]));
        let chanalyzer = Chanalyzer::new(Box::new(upstream), ChannelMask::from_bits(0x3));
        let left = chanalyzer.channel(0);
        let right = chanalyzer.channel(1);
        assert_eq!(left.next().unwrap().0, 0);
        // left already took its turn on this packet; asking again before
        // right has consumed must not hand back the same packet again.
        assert!(left.next().is_none());
        assert_eq!(right.next().unwrap().0, 0);
    }

    #[test]
    fn advances_to_next_packet_only_after_all_channels_consumed() {
        let upstream = FakeUpstream(VecDeque::from([stereo_packet(0, 1.0, 2.0, 2), stereo_packet(2, 3.0, 4.0, 2)]));
        let chanalyzer = Chanalyzer::new(Box::new(upstream), ChannelMask::from_bits(0x3));
        let left = chanalyzer.channel(0);
        let right = chanalyzer.channel(1);
        assert_eq!(left.next().unwrap().0, 0);
        // right hasn't consumed packet 0 yet, so asking left again must not
        // advance past it.
        assert_eq!(right.next().unwrap().0, 0);
        assert_eq!(left.next().unwrap().0, 2);
    }
}
