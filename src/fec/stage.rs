use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::BlockDecoder;
use crate::audio::PacketReader;
use crate::packet::wire::PacketParser;
use crate::packet::{AudioPacket, Packet, PacketQueue};

struct BlockState {
    source: Vec<Option<AudioPacket>>,
    emitted: Vec<bool>,
    repair: Vec<Option<Vec<u8>>>,
    received_source: usize,
    received_repair: usize,
    first_seen_tick: u64,
    finalized: bool,
}

impl BlockState {
    fn new(source_count: usize, parity_count: usize, first_seen_tick: u64) -> Self {
        Self {
            source: vec![None; source_count],
            emitted: vec![false; source_count],
            repair: vec![None; parity_count],
            received_source: 0,
            received_repair: 0,
            first_seen_tick,
            finalized: false,
        }
    }
}

/// Reconstructs missing source packets from repair packets within a
/// block, inserted between the audio reader and the rest of the session
/// chain when FEC is enabled (spec §4.5).
///
/// Block/position addressing and the "ready" trigger are two open
/// questions the distilled spec leaves open (see SPEC_FULL.md §4):
/// `block_id = seq / source_count`, `position = seq % source_count`, and a
/// block is ready once it has received `>= source_count` combined
/// source+repair symbols, or once `block_deadline_ticks` have elapsed
/// since its first symbol, whichever comes first.
pub struct FecDecoderStage {
    upstream: Box<dyn PacketReader>,
    fec_queue: Rc<RefCell<PacketQueue>>,
    parser: Rc<dyn PacketParser>,
    decoder: Rc<dyn BlockDecoder>,
    source_count: usize,
    parity_count: usize,
    block_deadline_ticks: u64,
    tick: u64,
    blocks: HashMap<u32, BlockState>,
    pending_emit: VecDeque<Packet>,
}

impl FecDecoderStage {
    pub fn new(
        upstream: Box<dyn PacketReader>,
        fec_queue: Rc<RefCell<PacketQueue>>,
        parser: Rc<dyn PacketParser>,
        decoder: Rc<dyn BlockDecoder>,
        source_count: usize,
        parity_count: usize,
    ) -> Self {
        assert!(source_count > 0, "fec decoder: source_count must be non-zero");
        Self {
            upstream,
            fec_queue,
            parser,
            decoder,
            source_count,
            parity_count,
            block_deadline_ticks: 2 * (source_count + parity_count) as u64,
            tick: 0,
            blocks: HashMap::new(),
            pending_emit: VecDeque::new(),
        }
    }

    fn drain_repair_queue(&mut self) {
        while let Some(packet) = self.fec_queue.borrow_mut().read() {
            if let Packet::Fec(fec) = packet {
                let source_count = self.source_count;
                let parity_count = self.parity_count;
                let block = self
                    .blocks
                    .entry(fec.block_id)
                    .or_insert_with(|| BlockState::new(source_count, parity_count, self.tick));
                let symbol_id = fec.symbol_id as usize;
                if symbol_id < parity_count && block.repair[symbol_id].is_none() {
                    block.repair[symbol_id] = Some(fec.payload.to_vec());
                    block.received_repair += 1;
                }
            }
        }
    }

    fn ingest_source(&mut self, audio: AudioPacket) {
        let block_id = audio.sequence / self.source_count as u32;
        let position = (audio.sequence % self.source_count as u32) as usize;
        let source_count = self.source_count;
        let parity_count = self.parity_count;
        let block = self
            .blocks
            .entry(block_id)
            .or_insert_with(|| BlockState::new(source_count, parity_count, self.tick));
        if block.source[position].is_none() {
            block.source[position] = Some(audio);
            block.received_source += 1;
        }
        block.emitted[position] = true;
    }

    /// Attempts reconstruction on every block that has become ready, and
    /// queues any newly-recovered packets (that never arrived on their
    /// own) for emission.
    fn finalize_ready_blocks(&mut self) {
        let ready_ids: Vec<u32> = self
            .blocks
            .iter()
            .filter(|(_, b)| {
                !b.finalized
                    && (b.received_source + b.received_repair >= self.source_count
                        || self.tick.saturating_sub(b.first_seen_tick) >= self.block_deadline_ticks)
            })
            .map(|(id, _)| *id)
            .collect();

        for block_id in ready_ids {
            let block = self.blocks.get_mut(&block_id).expect("just looked up");
            block.finalized = true;
            if block.received_source == self.source_count {
                continue; // nothing missing, nothing to reconstruct
            }

            let mut shards: Vec<Option<Vec<u8>>> = Vec::with_capacity(self.source_count + self.parity_count);
            for src in &block.source {
                shards.push(src.as_ref().map(|p| p.raw.to_vec()));
            }
            for idx in 0..self.parity_count {
                shards.push(block.repair.get(idx).cloned().flatten());
            }

            if let Err(e) = self.decoder.reconstruct(&mut shards, self.source_count, self.parity_count) {
                log::debug!("fec: block {block_id} reconstruction failed: {e}");
                continue;
            }

            for position in 0..self.source_count {
                if block.emitted[position] {
                    continue;
                }
                if let Some(bytes) = shards[position].take() {
                    match self.parser.parse(&bytes.into()) {
                        Some(Packet::Audio(packet)) => {
                            block.emitted[position] = true;
                            self.pending_emit.push_back(Packet::Audio(packet));
                        }
                        _ => log::debug!("fec: block {block_id} position {position} reconstructed but failed to re-parse"),
                    }
                }
            }
        }

        // Bound memory: drop finalized blocks whose recoverable packets
        // have all been handed out.
        self.blocks.retain(|_, b| !(b.finalized && b.emitted.iter().all(|&e| e)));
    }
}

impl PacketReader for FecDecoderStage {
    fn read(&mut self) -> Option<Packet> {
        if let Some(packet) = self.pending_emit.pop_front() {
            return Some(packet);
        }

        self.drain_repair_queue();

        match self.upstream.read() {
            Some(Packet::Audio(audio)) => {
                self.tick += 1;
                self.ingest_source(audio.clone());
                self.finalize_ready_blocks();
                Some(Packet::Audio(audio))
            }
            Some(other) => Some(other),
            None => {
                self.tick += 1;
                self.finalize_ready_blocks();
                self.pending_emit.pop_front()
            }
        }
    }
}
