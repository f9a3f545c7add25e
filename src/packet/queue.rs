use std::collections::VecDeque;

use super::Packet;

/// Bounded FIFO of packets of one logical type. On overflow the oldest
/// packet is dropped and a counter is recorded (spec §4.1, §8: "no packet
/// is enqueued into a queue whose size already equals capacity without a
/// corresponding oldest-drop").
pub struct PacketQueue {
    capacity: usize,
    items: VecDeque<Packet>,
    dropped: u64,
}

impl PacketQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PacketQueue capacity must be non-zero");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    /// Appends `packet`; if already at capacity, drops the oldest first.
    pub fn write(&mut self, packet: Packet) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
            self.dropped += 1;
            log::warn!("packet queue at capacity, dropping oldest packet");
        }
        self.items.push_back(packet);
    }

    /// Returns and removes the front packet, or `None` if empty.
    pub fn read(&mut self) -> Option<Packet> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
