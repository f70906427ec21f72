//! `Store` wires the block pool and fingerprint index together under the
//! deduplication algorithm (`spec.md` §4.4), replacing the original's
//! module-scope globals with a value owned by the caller (`spec.md` §9
//! Design Notes: "re-architect as a `Store` value").

use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::{debug, trace};

use crate::config::StorePaths;
use crate::digest::digest_block;
use crate::error::Result;
use crate::signals::TerminationHandlers;
use crate::storage::index::{Cursor, FingerprintIndex};
use crate::storage::pool::{BlockPool, PoolOffset};
use crate::BLOCK_SIZE;

pub struct Store {
    pool: BlockPool,
    index: FingerprintIndex,
    index_file: File,
    signals: TerminationHandlers,
    /// Count of fingerprint hits rejected by byte-wise verification, reported
    /// the way the original tool reports `stats_hash_failures`.
    pub hash_failures: u64,
}

impl Store {
    /// Open both store files for an ingest session (append + read), rebuild
    /// the in-memory index from the on-disk log, and install the termination
    /// signal handlers.
    pub fn open(paths: &StorePaths) -> Result<Self> {
        let pool = BlockPool::open(&paths.pool)?;
        let index_file = Self::open_index_for_ingest(&paths.index)?;
        let index = FingerprintIndex::rebuild_from_log(&index_file)?;
        let signals = TerminationHandlers::install()?;
        debug!(pool_blocks = pool.len_blocks(), "store opened for ingest");
        Ok(Self { pool, index, index_file, signals, hash_failures: 0 })
    }

    /// Open the pool read-only for a reconstruction session. No fingerprint
    /// index or signal handling is needed: reconstruction never writes.
    pub fn open_pool_read_only(path: &Path) -> Result<BlockPool> {
        BlockPool::open_read_only(path)
    }

    fn open_index_for_ingest(path: &Path) -> Result<File> {
        use crate::error::ImagepileError;
        OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| ImagepileError::Open { path: path.to_path_buf(), source: e })
    }

    /// Admit `candidate` into the store, returning its pool offset. Inserts a
    /// new pool record (and index entry) only if no existing entry
    /// byte-wise-verifies against the candidate (`spec.md` §4.4).
    pub fn dedup_block(&mut self, candidate: &[u8; BLOCK_SIZE]) -> Result<PoolOffset> {
        let fp = digest_block(candidate);
        let mut cursor = Cursor::Reset;
        let mut scratch = [0u8; BLOCK_SIZE];

        loop {
            let Some((offset, next_cursor)) = self.index.find(fp, cursor) else { break };
            self.pool.read(offset, &mut scratch)?;
            if blocks_equal(&scratch, candidate) {
                trace!(offset, "dedup hit");
                return Ok(offset);
            }
            self.hash_failures += 1;
            cursor = next_cursor;
        }

        self.signals.enter_critical();
        let result = (|| -> Result<PoolOffset> {
            let new_offset = self.pool.append(candidate)?;
            self.index.insert(fp, new_offset, &mut self.index_file)?;
            Ok(new_offset)
        })();
        self.signals.exit_critical();

        let new_offset = result?;
        trace!(offset = new_offset, "dedup miss, admitted new block");
        Ok(new_offset)
    }

    /// Whether a termination signal arrived during the last critical section
    /// and is waiting for the caller (the manifest writer's ingest loop) to
    /// flush its own state and exit (`spec.md` §5).
    pub fn pending_termination(&self) -> bool {
        self.signals.pending_termination()
    }

    /// Flush the index file. The pool is already flushed after every append
    /// (see [`BlockPool::append`]); this covers the other half of the
    /// "flushes pool, index, and current manifest" guarantee in `spec.md` §5.
    pub fn flush_index(&mut self) -> Result<()> {
        use std::io::Write;
        self.index_file.flush()?;
        Ok(())
    }

    pub fn total_comparisons(&self) -> u64 {
        self.index.total_comparisons
    }
}

/// Compare two blocks, short-circuiting on the first machine word
/// (`spec.md` §4.4: "a performance optimization and must not change
/// semantics").
fn blocks_equal(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> bool {
    const WORD: usize = std::mem::size_of::<usize>();
    if a[..WORD] != b[..WORD] {
        return false;
    }
    a == b
}
