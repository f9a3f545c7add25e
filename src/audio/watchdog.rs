use super::{PacketReader, Tuner, TunerStatus};
use crate::packet::Packet;

/// Detects stream stall. Passes packets through unchanged, recording the
/// tick number of the last non-empty read; `update()` trips *broken* once
/// too many ticks have passed since then (spec §4.4).
///
/// Timeout is measured in ticks rather than wall-clock time so sessions
/// behave deterministically under test (scenario 4 specifies `timeout` in
/// ticks directly).
pub struct Watchdog {
    upstream: Box<dyn PacketReader>,
    timeout_ticks: u64,
    current_tick: u64,
    last_read_tick: u64,
}

impl Watchdog {
    pub fn new(upstream: Box<dyn PacketReader>, timeout_ticks: u64) -> Self {
        Self {
            upstream,
            timeout_ticks,
            current_tick: 0,
            last_read_tick: 0,
        }
    }
}

impl PacketReader for Watchdog {
    fn read(&mut self) -> Option<Packet> {
        let packet = self.upstream.read();
        if packet.is_some() {
            self.last_read_tick = self.current_tick;
        }
        packet
    }
}

impl Tuner for Watchdog {
    fn update(&mut self) -> TunerStatus {
        self.current_tick += 1;
        if self.current_tick - self.last_read_tick > self.timeout_ticks {
            TunerStatus::Broken
        } else {
            TunerStatus::Alive
        }
    }
}
