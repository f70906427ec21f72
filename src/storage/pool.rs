//! The block pool — an append-only file of fixed [`BLOCK_SIZE`]-byte
//! records, addressed by integer record index (`spec.md` §4.3).
//!
//! A block's pool offset is `file_length_before_write / BLOCK_SIZE`. Reads
//! seek to `offset * BLOCK_SIZE` and read exactly `BLOCK_SIZE` bytes; short
//! reads or short writes against this file are fatal, since a truncated
//! record would permanently violate the index/pool agreement invariant.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write as _};
use std::path::Path;

use crate::error::{ImagepileError, Result};
use crate::ioutil::{read_exact_checked, write_all_checked};
use crate::BLOCK_SIZE;

/// A record index into the pool. `spec.md` §3 caps this at 32 bits, limiting
/// a single pool to 2^32 blocks (~16 TiB at `BLOCK_SIZE = 4096`).
pub type PoolOffset = u32;

pub struct BlockPool {
    file: File,
    len_blocks: u64,
}

impl BlockPool {
    /// Open (creating if absent) for append-and-read access, used during an
    /// ingest session. `spec.md` §6: both files are opened append+read.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| ImagepileError::Open { path: path.to_path_buf(), source: e })?;
        let len = file
            .metadata()
            .map_err(|e| ImagepileError::Open { path: path.to_path_buf(), source: e })?
            .len();
        Ok(Self { file, len_blocks: len / BLOCK_SIZE as u64 })
    }

    /// Open read-only, used during reconstruction.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ImagepileError::Open { path: path.to_path_buf(), source: e })?;
        let len = file
            .metadata()
            .map_err(|e| ImagepileError::Open { path: path.to_path_buf(), source: e })?
            .len();
        Ok(Self { file, len_blocks: len / BLOCK_SIZE as u64 })
    }

    pub fn len_blocks(&self) -> u64 {
        self.len_blocks
    }

    /// Append `block` (exactly `BLOCK_SIZE` bytes) and return its offset.
    pub fn append(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<PoolOffset> {
        let offset = self.len_blocks;
        if offset > PoolOffset::MAX as u64 {
            return Err(ImagepileError::PoolExhausted(offset));
        }
        self.file.seek(SeekFrom::End(0))?;
        write_all_checked(&mut self.file, block, "block pool append")?;
        self.file.flush()?;
        self.len_blocks += 1;
        Ok(offset as PoolOffset)
    }

    /// Read the block at `offset` into `block`.
    pub fn read(&mut self, offset: PoolOffset, block: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64 * BLOCK_SIZE as u64))?;
        read_exact_checked(&mut self.file, block, "block pool read")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let mut pool = BlockPool::open(&path).unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xAB;
        block[BLOCK_SIZE - 1] = 0xCD;
        let offset = pool.append(&block).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(pool.len_blocks(), 1);

        let mut readback = [0u8; BLOCK_SIZE];
        pool.read(offset, &mut readback).unwrap();
        assert_eq!(block, readback);
    }

    #[test]
    fn offsets_are_sequential() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let mut pool = BlockPool::open(&path).unwrap();
        for i in 0..5u8 {
            let block = [i; BLOCK_SIZE];
            assert_eq!(pool.append(&block).unwrap(), i as u32);
        }
        assert_eq!(pool.len_blocks(), 5);
    }

    #[test]
    fn reopen_recovers_existing_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        {
            let mut pool = BlockPool::open(&path).unwrap();
            pool.append(&[1u8; BLOCK_SIZE]).unwrap();
            pool.append(&[2u8; BLOCK_SIZE]).unwrap();
        }
        let pool = BlockPool::open(&path).unwrap();
        assert_eq!(pool.len_blocks(), 2);
    }

    #[test]
    fn short_read_past_end_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        let mut pool = BlockPool::open(&path).unwrap();
        pool.append(&[1u8; BLOCK_SIZE]).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(pool.read(5, &mut buf).is_err());
    }
}
