//! The pluggable block digest: a 64-bit keyed hash over exactly one block's
//! worth of bytes. It is deliberately *not* collision-resistant — the
//! deduplicator always verifies a hit byte-wise (see [`crate::store`]) — but
//! it must spread bits widely across its high 16 bits, since those select the
//! fingerprint index's bucket (see [`crate::storage::index`]).
//!
//! Swapping this function for another invalidates every existing store: the
//! on-disk index is nothing but a sequence of this function's outputs.

use crate::BLOCK_SIZE;

/// Fixed keying material. Any 64-bit values work; these just avoid the
/// all-zero seed SeaHash otherwise defaults to.
const KEY: (u64, u64, u64, u64) = (
    0x243F_6A88_85A3_08D3,
    0x1319_8A2E_0370_7344,
    0xA409_3822_299F_31D0,
    0x082E_FA98_EC4E_6C89,
);

/// Digest exactly one [`BLOCK_SIZE`]-byte block.
///
/// # Panics
/// Panics if `block.len() != BLOCK_SIZE` — callers always hand this a fixed
/// `[u8; BLOCK_SIZE]` array, so a mismatch is a programming error, not a
/// runtime condition to recover from.
pub fn digest_block(block: &[u8]) -> u64 {
    assert_eq!(block.len(), BLOCK_SIZE, "digest_block requires exactly one block");
    seahash::hash_seeded(block, KEY.0, KEY.1, KEY.2, KEY.3)
}

/// The bucket a fingerprint routes to: its high 16 bits.
pub fn bucket_of(fingerprint: u64) -> usize {
    (fingerprint >> 48) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let block = [0x5Au8; BLOCK_SIZE];
        assert_eq!(digest_block(&block), digest_block(&block));
    }

    #[test]
    fn distinguishes_blocks() {
        let mut a = [0u8; BLOCK_SIZE];
        let mut b = [0u8; BLOCK_SIZE];
        b[BLOCK_SIZE - 1] = 1;
        assert_ne!(digest_block(&a), digest_block(&b));
        a[0] = 7;
        assert_ne!(digest_block(&a), digest_block(&b));
    }

    #[test]
    fn bucket_uses_high_bits() {
        assert_eq!(bucket_of(0xABCD_0000_0000_0000), 0xABCD);
        assert_eq!(bucket_of(0x0000_FFFF_FFFF_FFFF), 0);
        assert_eq!(bucket_of(u64::MAX), 0xFFFF);
    }
}
