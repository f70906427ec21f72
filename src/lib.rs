//! Content-addressed, append-only block-pool store for deduplicating disk
//! images. See `DESIGN.md` for the grounding ledger and open-question
//! decisions, and `SPEC_FULL.md` for the full requirements this crate
//! implements.

pub mod config;
pub mod digest;
pub mod error;
pub mod ioutil;
pub mod manifest;
pub mod progress;
pub mod signals;
pub mod storage;
pub mod store;

/// Fixed block size `B`. Every pool record, every candidate block, and every
/// manifest offset addresses data in units of this size. Changing it is a
/// format break — see `spec.md` §3.
pub const BLOCK_SIZE: usize = 4096;

/// Width, in bytes, of the manifest header (`spec.md` §3/§6).
pub const HEADER_SIZE: u64 = 12;

/// Manifest magic bytes.
pub const MAGIC: &[u8; 4] = b"IPIL";

/// Entries per fingerprint-index leaf (`L` in `spec.md` §3).
pub const LEAF_CAPACITY: usize = 64;

/// Number of top-level fingerprint-index buckets (`spec.md` §4.2): one per
/// possible value of a fingerprint's high 16 bits.
pub const BUCKET_COUNT: usize = 65_536;

pub use error::{ImagepileError, Result};
