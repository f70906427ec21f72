//! The IPIL manifest format (`spec.md` §3/§6): a 12-byte header followed by
//! an array of 4-byte little-endian pool offsets, one per block of the
//! original stream.

pub mod reader;
pub mod writer;

pub use reader::reconstruct;
pub use writer::ingest;
