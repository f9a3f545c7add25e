use std::collections::VecDeque;

use super::PacketReader;
use crate::packet::Packet;

/// Withholds packets until a target amount of audio has accumulated, then
/// passes everything through 1:1. Establishes the initial jitter buffer
/// (spec §4.3); grounded in the buffering-phase gate of
/// `bass-aes67/input/jitter.rs`'s `JitterBuffer` (a `buffering` flag held
/// until a target fill level is reached).
pub struct Delayer {
    upstream: Box<dyn PacketReader>,
    target_samples: u64,
    buffered: VecDeque<Packet>,
    buffered_samples: u64,
    warmed: bool,
}

impl Delayer {
    pub fn new(upstream: Box<dyn PacketReader>, target_samples: u64) -> Self {
        Self {
            upstream,
            target_samples,
            buffered: VecDeque::new(),
            buffered_samples: 0,
            warmed: target_samples == 0,
        }
    }

    /// `true` once the Delayer has started passing packets through. This
    /// is the Session's Warming→Playing transition (spec §4.10: "implicit:
    /// the first non-empty read from the Delayer").
    pub fn is_warmed(&self) -> bool {
        self.warmed
    }

    fn frame_count(packet: &Packet) -> u64 {
        match packet {
            Packet::Audio(p) => p.frame_count() as u64,
            Packet::Fec(_) => 0,
        }
    }
}

impl PacketReader for Delayer {
    fn read(&mut self) -> Option<Packet> {
        if !self.warmed {
            while self.buffered_samples < self.target_samples {
                match self.upstream.read() {
                    Some(packet) => {
                        self.buffered_samples += Self::frame_count(&packet);
                        self.buffered.push_back(packet);
                    }
                    None => return None,
                }
            }
            self.warmed = true;
        }
        if let Some(packet) = self.buffered.pop_front() {
            self.buffered_samples -= Self::frame_count(&packet);
            return Some(packet);
        }
        self.upstream.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{AudioPacket, ChannelMask};
    use bytes::Bytes;
    use std::collections::VecDeque as Vd;

    struct FakeUpstream(Vd<Packet>);
    impl PacketReader for FakeUpstream {
        fn read(&mut self) -> Option<Packet> {
            self.0.pop_front()
        }
    }

    fn audio(seq: u32, frames: usize) -> Packet {
        Packet::Audio(AudioPacket {
            sequence: seq,
            timestamp: seq as u64 * frames as u64,
            channel_mask: ChannelMask::from_bits(0x1),
            payload: vec![0.0; frames],
            raw: Bytes::new(),
        })
    }

    #[test]
    fn withholds_until_target_reached() {
        let mut upstream = Vd::new();
        for i in 0..5 {
            upstream.push_back(audio(i, 320));
        }
        let mut delayer = Delayer::new(Box::new(FakeUpstream(upstream)), 3 * 320);
        assert!(!delayer.is_warmed());
        assert!(delayer.read().is_some());
        assert!(delayer.is_warmed());
    }

    #[test]
    fn passes_through_in_order_once_warmed() {
        let mut upstream = Vd::new();
        for i in 0..5 {
            upstream.push_back(audio(i, 320));
        }
        let mut delayer = Delayer::new(Box::new(FakeUpstream(upstream)), 2 * 320);
        for expected_seq in 0..5u32 {
            match delayer.read().unwrap() {
                Packet::Audio(p) => assert_eq!(p.sequence, expected_seq),
                _ => panic!("expected audio"),
            }
        }
    }

    #[test]
    fn zero_latency_passes_through_immediately() {
        let mut upstream = Vd::new();
        upstream.push_back(audio(0, 320));
        let mut delayer = Delayer::new(Box::new(FakeUpstream(upstream)), 0);
        assert!(delayer.is_warmed());
        assert!(delayer.read().is_some());
    }
}
