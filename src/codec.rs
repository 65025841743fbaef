//! Erasure codec capability consumed by the shard read/write paths.
//!
//! The codec itself lives outside the core; the core only fixes the shape of
//! the seam and the rule that any `data_blocks` surviving shards suffice.

use crate::error::{Result, StorageError};

/// Splits object payloads into `data + parity` shards and reassembles them.
pub trait ErasureCodec: Send + Sync {
    /// Encodes `data` into `data_blocks + parity_blocks` shards, processed
    /// in blocks of at most `block_size` bytes.
    fn encode(
        &self,
        data: &[u8],
        data_blocks: usize,
        parity_blocks: usize,
        block_size: u64,
    ) -> Result<Vec<Vec<u8>>>;

    /// Reassembles the payload from whatever shards survive; `None` marks a
    /// lost shard. Fails with [`StorageError::InsufficientReplicas`] when
    /// fewer than `data_blocks` shards are present.
    fn decode(
        &self,
        shards: &[Option<Vec<u8>>],
        data_blocks: usize,
        parity_blocks: usize,
    ) -> Result<Vec<u8>>;
}

/// Shared pre-check for decoders: at least `data_blocks` shards must be
/// present for reconstruction to be possible at all.
pub fn check_decodable(shards: &[Option<Vec<u8>>], data_blocks: usize) -> Result<()> {
    let present = shards.iter().filter(|shard| shard.is_some()).count();
    if present < data_blocks {
        return Err(StorageError::InsufficientReplicas);
    }
    Ok(())
}
