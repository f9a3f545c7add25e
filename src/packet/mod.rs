//! Packet data model: [`Packet`], [`ChannelMask`], [`PacketType`], and the
//! bounded-FIFO / fan-out building blocks ([`PacketQueue`], [`Router`]).

mod queue;
mod router;
pub mod wire;

pub use queue::PacketQueue;
pub use router::Router;

use bytes::Bytes;

/// Channels supported by one build of this crate. A `u32` bitset caps the
/// addressable channel count at 32, which every example config in spec §8
/// fits comfortably under.
pub const MAX_CHANNELS: usize = 32;

/// A bitset over channel indices `0..MAX_CHANNELS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const EMPTY: ChannelMask = ChannelMask(0);

    pub const fn from_bits(bits: u32) -> Self {
        ChannelMask(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn popcount(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, channel: usize) -> bool {
        channel < MAX_CHANNELS && (self.0 & (1 << channel)) != 0
    }

    pub fn set(&mut self, channel: usize) {
        debug_assert!(channel < MAX_CHANNELS);
        self.0 |= 1 << channel;
    }

    pub fn is_superset_of(self, other: ChannelMask) -> bool {
        (other.0 & !self.0) == 0
    }

    /// Index of `channel` among the bits set below and including it, i.e.
    /// its position within this mask's interleaved sample layout. `None`
    /// if `channel` is not in the mask.
    pub fn local_index_of(self, channel: usize) -> Option<usize> {
        if !self.contains(channel) {
            return None;
        }
        let below = if channel == 0 { 0 } else { self.0 & ((1u32 << channel) - 1) };
        Some(below.count_ones() as usize)
    }

    /// Iterates active channel indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_CHANNELS).filter(move |&c| self.contains(c))
    }
}

/// Which logical queue a packet belongs to. Exactly two kinds exist per
/// spec §3: audio payload and FEC repair data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Audio,
    Fec,
}

/// One sender's audio payload: a sequence number, a sample-accurate
/// timestamp, the channel mask the payload is interleaved under, and the
/// decoded PCM itself.
#[derive(Debug, Clone)]
pub struct AudioPacket {
    pub sequence: u32,
    pub timestamp: u64,
    pub channel_mask: ChannelMask,
    /// Interleaved PCM, `frame_count * channel_mask.popcount()` samples.
    pub payload: Vec<f32>,
    /// The datagram bytes this packet was parsed from, retained so the FEC
    /// decoder can byte-reconstruct a missing packet and re-parse it
    /// (spec §4.5: "repair output is re-parsed through the session's
    /// packet parser").
    pub raw: Bytes,
}

impl AudioPacket {
    pub fn frame_count(&self) -> usize {
        let n = self.channel_mask.popcount();
        if n == 0 {
            0
        } else {
            self.payload.len() / n
        }
    }
}

/// A forward-error-correction repair packet: identifies the block and
/// symbol position it repairs, and carries the opaque repair payload.
#[derive(Debug, Clone)]
pub struct FecPacket {
    pub block_id: u32,
    pub symbol_id: u32,
    pub payload: Bytes,
}

/// A parsed packet, read-only and immutable once produced by
/// [`wire::PacketParser`].
#[derive(Debug, Clone)]
pub enum Packet {
    Audio(AudioPacket),
    Fec(FecPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Audio(_) => PacketType::Audio,
            Packet::Fec(_) => PacketType::Fec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_popcount_and_local_index() {
        let mask = ChannelMask::from_bits(0b1011); // channels 0,1,3
        assert_eq!(mask.popcount(), 3);
        assert_eq!(mask.local_index_of(0), Some(0));
        assert_eq!(mask.local_index_of(1), Some(1));
        assert_eq!(mask.local_index_of(2), None);
        assert_eq!(mask.local_index_of(3), Some(2));
    }

    #[test]
    fn mask_iter_matches_contains() {
        let mask = ChannelMask::from_bits(0x5);
        let channels: Vec<usize> = mask.iter().collect();
        assert_eq!(channels, vec![0, 2]);
    }

    #[test]
    fn audio_packet_frame_count() {
        let p = AudioPacket {
            sequence: 0,
            timestamp: 0,
            channel_mask: ChannelMask::from_bits(0x3),
            payload: vec![0.0; 640],
            raw: Bytes::new(),
        };
        assert_eq!(p.frame_count(), 320);
    }
}
