use std::path::PathBuf;

use thiserror::Error;

/// All fatal error kinds the store can report, grouped the way `spec.md` §7
/// groups them: configuration, open, short read/write, format, resource, and
/// signal setup.
#[derive(Debug, Error)]
pub enum ImagepileError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read: expected {expected} bytes, got {got} ({context})")]
    ShortRead {
        expected: usize,
        got: usize,
        context: &'static str,
    },

    #[error("short write: expected {expected} bytes, wrote {got} ({context})")]
    ShortWrite {
        expected: usize,
        got: usize,
        context: &'static str,
    },

    #[error("bad manifest magic in {path}: expected \"IPIL\"")]
    BadMagic { path: PathBuf },

    #[error("manifest start_trim {0} >= block size {1}")]
    StartTrim(u32, usize),

    #[error("manifest end_size {0} > block size {1}")]
    EndSize(u32, usize),

    #[error("pool has grown to {0} blocks, cannot fit in a 32-bit offset")]
    PoolExhausted(u64),

    #[error("cannot install signal handlers: {0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, ImagepileError>;
