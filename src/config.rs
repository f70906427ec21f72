//! Store location: resolved from the `IMGDIR` environment variable, exactly
//! as the original `imagepile` tool resolves it (`spec.md` §6/§7 list an
//! unset base directory as a Configuration error).

use std::path::PathBuf;

use crate::error::{ImagepileError, Result};

/// Filename of the block pool within the base directory.
pub const POOL_FILE_NAME: &str = "imagepile.db";
/// Filename of the on-disk fingerprint log within the base directory.
pub const INDEX_FILE_NAME: &str = "imagepile.hash_index";

/// Resolved paths to the two store files living under the base directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub pool: PathBuf,
    pub index: PathBuf,
}

impl StorePaths {
    /// Resolve the store's two files from the `IMGDIR` environment variable.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var_os("IMGDIR").ok_or_else(|| {
            ImagepileError::Config("IMGDIR environment variable not set".into())
        })?;
        Ok(Self::from_base(PathBuf::from(base)))
    }

    pub fn from_base(base: PathBuf) -> Self {
        Self {
            pool: base.join(POOL_FILE_NAME),
            index: base.join(INDEX_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_with_fixed_names() {
        let paths = StorePaths::from_base(PathBuf::from("/tmp/pile"));
        assert_eq!(paths.pool, PathBuf::from("/tmp/pile/imagepile.db"));
        assert_eq!(paths.index, PathBuf::from("/tmp/pile/imagepile.hash_index"));
    }
}
