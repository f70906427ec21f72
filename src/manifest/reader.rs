//! Reverses an IPIL manifest back into the original byte stream
//! (`spec.md` §4.6).
//!
//! "Last block" detection buffers one offset ahead instead of coupling it to
//! the read-batch boundary the original tool used — the spec's own note on
//! this component observes that batch-boundary EOF detection can silently
//! mis-classify a block that happens to land on a batch edge, and suggests
//! exactly this lookahead as the fix.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::info;

use crate::error::{ImagepileError, Result};
use crate::ioutil::read_fill;
use crate::storage::pool::BlockPool;
use crate::{BLOCK_SIZE, HEADER_SIZE, MAGIC};

struct ManifestHeader {
    start_trim: u32,
    end_size: u32,
}

fn read_header<R: Read>(reader: &mut R, manifest_path: &Path) -> Result<ManifestHeader> {
    let mut header = [0u8; HEADER_SIZE as usize];
    let filled = read_fill(reader, &mut header)?;
    if filled != header.len() {
        return Err(ImagepileError::ShortRead {
            expected: header.len(),
            got: filled,
            context: "manifest header",
        });
    }
    if &header[0..4] != MAGIC {
        return Err(ImagepileError::BadMagic { path: manifest_path.to_path_buf() });
    }
    let mut rest = &header[4..12];
    let start_trim = rest.read_u32::<LittleEndian>()?;
    let end_size = rest.read_u32::<LittleEndian>()?;
    if start_trim as usize >= BLOCK_SIZE {
        return Err(ImagepileError::StartTrim(start_trim, BLOCK_SIZE));
    }
    if end_size as usize > BLOCK_SIZE {
        return Err(ImagepileError::EndSize(end_size, BLOCK_SIZE));
    }
    Ok(ManifestHeader { start_trim, end_size })
}

/// Read one 4-byte little-endian pool offset, or `None` at a clean EOF.
fn read_offset<R: Read>(reader: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let filled = read_fill(reader, &mut buf)?;
    match filled {
        0 => Ok(None),
        4 => Ok(Some((&buf[..]).read_u32::<LittleEndian>()?)),
        n => Err(ImagepileError::ShortRead { expected: 4, got: n, context: "manifest block offset" }),
    }
}

/// Reconstruct the original stream described by `manifest_path`, reading
/// blocks from `pool` and writing the result to `output`.
pub fn reconstruct<W: Write>(pool: &mut BlockPool, manifest_path: &Path, output: &mut W) -> Result<u64> {
    let file = File::open(manifest_path)
        .map_err(|e| ImagepileError::Open { path: manifest_path.to_path_buf(), source: e })?;
    let mut manifest = BufReader::new(file);
    let header = read_header(&mut manifest, manifest_path)?;

    let mut trim = header.start_trim;
    let mut pending = read_offset(&mut manifest)?;
    let mut written = 0u64;
    let mut block = [0u8; BLOCK_SIZE];

    while let Some(offset) = pending {
        pending = read_offset(&mut manifest)?;
        pool.read(offset, &mut block)?;

        if pending.is_none() {
            let slice = &block[..header.end_size as usize];
            output.write_all(slice)?;
            written += slice.len() as u64;
        } else if trim > 0 {
            let slice = &block[..BLOCK_SIZE - trim as usize];
            output.write_all(slice)?;
            written += slice.len() as u64;
            trim = 0;
        } else {
            output.write_all(&block)?;
            written += BLOCK_SIZE as u64;
        }
    }

    output.flush()?;
    info!(bytes_written = written, "reconstruction complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorePaths;
    use crate::manifest::writer::ingest;
    use crate::store::Store;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn round_trip(data: Vec<u8>, trim: u32) -> Vec<u8> {
        let dir = tempdir().unwrap();
        let paths = StorePaths::from_base(dir.path().to_path_buf());
        let mut store = Store::open(&paths).unwrap();
        let manifest_path = dir.path().join("m.ipil");
        let total = data.len() as u64;
        ingest(&mut store, &mut Cursor::new(data), trim, &manifest_path, Some(total)).unwrap();
        drop(store);

        let mut pool = BlockPool::open_read_only(&paths.pool).unwrap();
        let mut output = Vec::new();
        reconstruct(&mut pool, &manifest_path, &mut output).unwrap();
        output
    }

    #[test]
    fn round_trips_single_aligned_block() {
        let data = vec![0u8; BLOCK_SIZE];
        assert_eq!(round_trip(data.clone(), 0), data);
    }

    #[test]
    fn round_trips_five_thousand_bytes() {
        let data = vec![0u8; 5000];
        assert_eq!(round_trip(data.clone(), 0), data);
    }

    #[test]
    fn round_trips_trimmed_short_buffer() {
        let data = vec![0xAAu8; 3000];
        assert_eq!(round_trip(data.clone(), 1096), data);
    }

    #[test]
    fn round_trips_trimmed_buffer_spanning_two_blocks() {
        let data = vec![0xABu8; BLOCK_SIZE + 2000];
        assert_eq!(round_trip(data.clone(), 1000), data);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("bad.ipil");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"XPIL");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&(BLOCK_SIZE as u32).to_le_bytes());
        std::fs::write(&manifest_path, &bytes).unwrap();

        let pool_path = dir.path().join("pool.db");
        std::fs::write(&pool_path, []).unwrap();
        let mut pool = BlockPool::open_read_only(&pool_path).unwrap();
        let mut output = Vec::new();
        let err = reconstruct(&mut pool, &manifest_path, &mut output).unwrap_err();
        assert!(matches!(err, ImagepileError::BadMagic { .. }));
    }
}
