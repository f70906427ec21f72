//! The fingerprint index — a two-level structure mapping a block's digest to
//! the pool offset storing it (`spec.md` §4.2).
//!
//! The top level has [`crate::BUCKET_COUNT`] slots, one per possible value of
//! a fingerprint's high 16 bits. Each slot heads a singly-linked chain of
//! fixed-capacity leaves holding up to [`crate::LEAF_CAPACITY`] entries each,
//! in insertion order. A lookup walks the chain for its bucket, comparing
//! fingerprints node by node; the caller (`crate::store`) verifies any hit
//! byte-wise against the pool before trusting it, and resumes the walk past a
//! failed hit using the [`Cursor`] this module hands back.

use std::fs::File;
use std::io::BufReader;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::digest::bucket_of;
use crate::error::Result;
use crate::storage::pool::PoolOffset;
use crate::{BUCKET_COUNT, LEAF_CAPACITY};

/// One fingerprint/offset pair held in a leaf.
#[derive(Debug, Clone, Copy)]
struct IndexNode {
    fingerprint: u64,
    offset: PoolOffset,
}

/// A fixed-capacity segment of a bucket's chain.
struct Leaf {
    nodes: [IndexNode; LEAF_CAPACITY],
    len: usize,
    next: Option<Box<Leaf>>,
}

impl Leaf {
    fn new() -> Self {
        Self {
            nodes: [IndexNode { fingerprint: 0, offset: 0 }; LEAF_CAPACITY],
            len: 0,
            next: None,
        }
    }

    fn is_full(&self) -> bool {
        self.len == LEAF_CAPACITY
    }
}

/// Where a resumed [`FingerprintIndex::find`] call should pick back up,
/// re-architected from the original tool's static cursor state into an
/// explicit value the caller threads through a search (`spec.md` §4.2 Design
/// Notes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    /// Start from the head of the bucket's chain.
    #[default]
    Reset,
    /// Resume just past a previously inspected node.
    Resume { leaf_index: usize, node_index: usize },
}

/// The two-level in-memory fingerprint index, rebuilt from the append-only
/// on-disk log: a flat concatenation of 8-byte little-endian fingerprints
/// whose array position *is* the pool offset (`spec.md` §3: "Positional
/// identity" — the offset is implicit on disk, explicit only in RAM).
pub struct FingerprintIndex {
    top: Vec<Option<Box<Leaf>>>,
    /// Running count of fingerprint comparisons performed by `find`, exposed
    /// for the same `total_searches` statistic the original tool reports.
    pub total_comparisons: u64,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        let mut top = Vec::with_capacity(BUCKET_COUNT);
        top.resize_with(BUCKET_COUNT, || None);
        Self { top, total_comparisons: 0 }
    }

    /// Rebuild the in-memory index by sequentially replaying an on-disk
    /// fingerprint log. `spec.md` §4.2: boot is O(n) in the number of
    /// existing entries, with no separate persisted top-level structure.
    pub fn rebuild_from_log(file: &File) -> Result<Self> {
        let mut index = Self::new();
        let mut reader = BufReader::new(file);
        let mut position: u32 = 0;
        loop {
            let fingerprint = match reader.read_u64::<LittleEndian>() {
                Ok(fp) => fp,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            index.insert_in_memory(fingerprint, position);
            position += 1;
        }
        Ok(index)
    }

    /// Insert a new fingerprint, appending its 8 raw bytes to the on-disk log
    /// before updating the in-memory structure. `offset` must equal the log's
    /// current entry count (the pool offset the caller just admitted the
    /// block at) — the caller is responsible for calling this only after the
    /// corresponding pool append has already landed (`spec.md` §4.4/§5:
    /// pool-before-index).
    pub fn insert(&mut self, fingerprint: u64, offset: PoolOffset, log: &mut File) -> Result<()> {
        log.write_u64::<LittleEndian>(fingerprint)?;
        std::io::Write::flush(log)?;
        self.insert_in_memory(fingerprint, offset);
        Ok(())
    }

    fn insert_in_memory(&mut self, fingerprint: u64, offset: PoolOffset) {
        let bucket = bucket_of(fingerprint);
        let head = self.top[bucket].get_or_insert_with(|| Box::new(Leaf::new()));

        let mut leaf = head;
        loop {
            if !leaf.is_full() {
                leaf.nodes[leaf.len] = IndexNode { fingerprint, offset };
                leaf.len += 1;
                return;
            }
            if leaf.next.is_none() {
                leaf.next = Some(Box::new(Leaf::new()));
            }
            leaf = leaf.next.as_mut().unwrap();
        }
    }

    /// Search for `fingerprint` within its bucket, starting from `cursor`.
    /// Returns the offset of the next matching node along with a cursor
    /// positioned just past it, so a failed byte-wise verification can call
    /// `find` again to resume the search rather than restarting from scratch.
    pub fn find(&mut self, fingerprint: u64, cursor: Cursor) -> Option<(PoolOffset, Cursor)> {
        let bucket = bucket_of(fingerprint);
        let head = self.top[bucket].as_ref()?;

        let (start_leaf, start_node) = match cursor {
            Cursor::Reset => (0, 0),
            Cursor::Resume { leaf_index, node_index } => (leaf_index, node_index + 1),
        };

        let mut leaf_index = 0;
        let mut leaf = head.as_ref();
        loop {
            if leaf_index >= start_leaf {
                let from = if leaf_index == start_leaf { start_node } else { 0 };
                for node_index in from..leaf.len {
                    self.total_comparisons += 1;
                    if leaf.nodes[node_index].fingerprint == fingerprint {
                        return Some((
                            leaf.nodes[node_index].offset,
                            Cursor::Resume { leaf_index, node_index },
                        ));
                    }
                }
            }
            match leaf.next.as_deref() {
                Some(next) => {
                    leaf = next;
                    leaf_index += 1;
                }
                None => return None,
            }
        }
    }
}

impl Default for FingerprintIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempdir;

    #[test]
    fn find_misses_on_empty_index() {
        let mut index = FingerprintIndex::new();
        assert!(index.find(12345, Cursor::Reset).is_none());
    }

    #[test]
    fn insert_then_find_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let mut log = File::create(&path).unwrap();
        let mut index = FingerprintIndex::new();
        index.insert(0xDEAD_BEEF_0000_0001, 0, &mut log).unwrap();

        let found = index.find(0xDEAD_BEEF_0000_0001, Cursor::Reset);
        assert_eq!(found.map(|(o, _)| o), Some(0));
    }

    #[test]
    fn resume_past_mismatch_skips_already_seen_entry() {
        let fp_a: u64 = 0x0001_0000_0000_0000;
        let fp_b: u64 = 0x0001_0000_0000_0001;
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let mut log = File::create(&path).unwrap();
        let mut index = FingerprintIndex::new();
        index.insert(fp_a, 0, &mut log).unwrap();
        index.insert(fp_b, 1, &mut log).unwrap();

        let (offset, cursor) = index.find(fp_a, Cursor::Reset).unwrap();
        assert_eq!(offset, 0);
        assert!(index.find(fp_a, cursor).is_none());
    }

    #[test]
    fn spills_across_leaves_when_bucket_exceeds_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let mut log = File::create(&path).unwrap();
        let mut index = FingerprintIndex::new();

        let base = 0x0002_0000_0000_0000u64;
        for i in 0..(LEAF_CAPACITY as u64 * 2 + 3) {
            index.insert(base | i, i as u32, &mut log).unwrap();
        }

        let last = base | (LEAF_CAPACITY as u64 * 2 + 2);
        let found = index.find(last, Cursor::Reset);
        assert_eq!(found.map(|(o, _)| o), Some(LEAF_CAPACITY as u32 * 2 + 2));
    }

    #[test]
    fn rebuild_from_log_reproduces_in_memory_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        {
            let mut log = File::create(&path).unwrap();
            let mut index = FingerprintIndex::new();
            index.insert(111, 0, &mut log).unwrap();
            index.insert(222, 1, &mut log).unwrap();
        }
        let mut file = File::open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut rebuilt = FingerprintIndex::rebuild_from_log(&file).unwrap();
        assert_eq!(rebuilt.find(111, Cursor::Reset).map(|(o, _)| o), Some(0));
        assert_eq!(rebuilt.find(222, Cursor::Reset).map(|(o, _)| o), Some(1));
    }

    #[test]
    fn on_disk_log_is_exactly_eight_bytes_per_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx");
        let mut log = File::create(&path).unwrap();
        let mut index = FingerprintIndex::new();
        index.insert(1, 0, &mut log).unwrap();
        index.insert(2, 1, &mut log).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 16);
    }
}
