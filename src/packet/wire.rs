//! A concrete, minimal packet parser.
//!
//! The wire format itself is explicitly out of scope (spec §1): the core
//! only depends on [`PacketParser`]. This module supplies one simple,
//! byte-level implementation, grounded in the header layout style of
//! `rtp/header.rs`'s `RtpHeader::parse`/`encode` (fixed-size big-endian
//! fields, a leading type/version byte), so the crate is exercisable
//! end-to-end without a caller supplying their own parser.

use bytes::{Bytes, BytesMut};

use super::{AudioPacket, ChannelMask, FecPacket, Packet};

const TAG_AUDIO: u8 = 0;
const TAG_FEC: u8 = 1;

/// Parses opaque datagram payload bytes into a [`Packet`].
pub trait PacketParser {
    fn parse(&self, bytes: &Bytes) -> Option<Packet>;
}

/// The reference wire format used by this crate's own tests:
///
/// Audio: `[0x00][seq: u32 BE][timestamp: u64 BE][channel_mask: u32 BE][payload: f32 BE ...]`
/// FEC:   `[0x01][block_id: u32 BE][symbol_id: u32 BE][payload: bytes ...]`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePacketParser;

impl PacketParser for SimplePacketParser {
    fn parse(&self, bytes: &Bytes) -> Option<Packet> {
        if bytes.is_empty() {
            return None;
        }
        match bytes[0] {
            TAG_AUDIO => parse_audio(bytes),
            TAG_FEC => parse_fec(bytes),
            _ => None,
        }
    }
}

fn parse_audio(bytes: &Bytes) -> Option<Packet> {
    const HEADER_LEN: usize = 1 + 4 + 8 + 4;
    if bytes.len() < HEADER_LEN || (bytes.len() - HEADER_LEN) % 4 != 0 {
        return None;
    }
    let sequence = u32::from_be_bytes(bytes[1..5].try_into().ok()?);
    let timestamp = u64::from_be_bytes(bytes[5..13].try_into().ok()?);
    let channel_mask = ChannelMask::from_bits(u32::from_be_bytes(bytes[13..17].try_into().ok()?));
    let payload = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|c| f32::from_be_bytes(c.try_into().unwrap()))
        .collect();
    Some(Packet::Audio(AudioPacket {
        sequence,
        timestamp,
        channel_mask,
        payload,
        raw: bytes.clone(),
    }))
}

fn parse_fec(bytes: &Bytes) -> Option<Packet> {
    const HEADER_LEN: usize = 1 + 4 + 4;
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let block_id = u32::from_be_bytes(bytes[1..5].try_into().ok()?);
    let symbol_id = u32::from_be_bytes(bytes[5..9].try_into().ok()?);
    let payload = bytes.slice(HEADER_LEN..);
    Some(Packet::Fec(FecPacket {
        block_id,
        symbol_id,
        payload,
    }))
}

/// Encodes an audio packet using [`SimplePacketParser`]'s wire format.
/// Used by tests and by any caller wanting a matching encoder.
pub fn encode_audio(sequence: u32, timestamp: u64, channel_mask: ChannelMask, payload: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 4 + 8 + 4 + payload.len() * 4);
    buf.extend_from_slice(&[TAG_AUDIO]);
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(&channel_mask.bits().to_be_bytes());
    for sample in payload {
        buf.extend_from_slice(&sample.to_be_bytes());
    }
    buf.freeze()
}

/// Encodes an FEC repair packet using [`SimplePacketParser`]'s wire format.
pub fn encode_fec(block_id: u32, symbol_id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 4 + 4 + payload.len());
    buf.extend_from_slice(&[TAG_FEC]);
    buf.extend_from_slice(&block_id.to_be_bytes());
    buf.extend_from_slice(&symbol_id.to_be_bytes());
    buf.extend_from_slice(payload);
    buf.freeze()
}
