//! The block-level erasure-coding backend the FEC stage drives.
//!
//! Grounded on `nehraa-Omnyxnet`'s `dcdn/fec.rs::FecEngine::decode`: pad
//! every shard to a common length, track which positions are present,
//! hand the whole `data_count + parity_count` shard set to
//! `reed_solomon_erasure::galois_8::ReedSolomon::reconstruct_data`, and
//! read back whichever data shards it was able to fill in.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FecError {
    #[error("fec: reed-solomon setup failed: {0}")]
    Setup(String),
    #[error("fec: reconstruction failed: {0}")]
    Reconstruction(String),
}

/// Reconstructs missing source shards from a block's source + repair
/// shards. `shards[0..data_count]` are source positions,
/// `shards[data_count..]` are repair positions; `None` marks a missing
/// shard. Implementations fill in every shard they can recover; a shard
/// that remains `None` after the call could not be reconstructed (spec
/// §4.5: "missing positions that cannot be reconstructed are emitted as
/// explicit gaps").
pub trait BlockDecoder {
    fn reconstruct(
        &self,
        shards: &mut [Option<Vec<u8>>],
        data_count: usize,
        parity_count: usize,
    ) -> Result<(), FecError>;
}

/// Concrete Reed-Solomon erasure-coding backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReedSolomonBlockDecoder;

impl BlockDecoder for ReedSolomonBlockDecoder {
    fn reconstruct(
        &self,
        shards: &mut [Option<Vec<u8>>],
        data_count: usize,
        parity_count: usize,
    ) -> Result<(), FecError> {
        let rs = ReedSolomon::new(data_count, parity_count).map_err(|e| FecError::Setup(e.to_string()))?;

        let shard_len = shards.iter().flatten().map(|s| s.len()).max().unwrap_or(0);
        for shard in shards.iter_mut() {
            if let Some(s) = shard {
                s.resize(shard_len, 0);
            }
        }

        rs.reconstruct_data(shards)
            .map_err(|e| FecError::Reconstruction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_single_missing_data_shard() {
        let decoder = ReedSolomonBlockDecoder;
        let rs = ReedSolomon::new(4, 2).unwrap();
        let mut shards: Vec<Vec<u8>> = (0u8..4).map(|n| vec![n; 8]).collect();
        shards.push(vec![0u8; 8]);
        shards.push(vec![0u8; 8]);
        rs.encode(&mut shards).unwrap();

        let mut shard_options: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        shard_options[1] = None;

        decoder.reconstruct(&mut shard_options, 4, 2).unwrap();
        assert_eq!(shard_options[1], Some(vec![1u8; 8]));
    }

    #[test]
    fn fails_when_too_many_shards_missing() {
        let decoder = ReedSolomonBlockDecoder;
        let rs = ReedSolomon::new(4, 2).unwrap();
        let mut shards: Vec<Vec<u8>> = (0u8..4).map(|n| vec![n; 8]).collect();
        shards.push(vec![0u8; 8]);
        shards.push(vec![0u8; 8]);
        rs.encode(&mut shards).unwrap();

        let mut shard_options: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        shard_options[0] = None;
        shard_options[1] = None;
        shard_options[2] = None;

        assert!(decoder.reconstruct(&mut shard_options, 4, 2).is_err());
    }
}
