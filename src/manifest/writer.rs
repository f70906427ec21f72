//! Frames a raw byte stream as an IPIL manifest, admitting each block through
//! the deduplicator (`spec.md` §4.5).
//!
//! EOF detection uses [`BufRead::fill_buf`] as a non-consuming peek rather
//! than relying on a stream's "did the last read hit EOF" flag — the latter
//! is implementation-defined at the exact boundary where a read satisfies its
//! request and the stream has no bytes left, and the worked examples in
//! `spec.md` §8 require the deterministic outcome `fill_buf` gives.

use std::fs::File;
use std::io::{BufRead, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::info;

use crate::error::{ImagepileError, Result};
use crate::ioutil::{read_fill, write_all_checked};
use crate::progress::Progress;
use crate::store::Store;
use crate::{BLOCK_SIZE, MAGIC};

/// Statistics returned after a successful ingest, matching the counters the
/// original tool prints (`spec.md` §9 Design Notes: per-session statistics).
#[derive(Debug, Default)]
pub struct IngestStats {
    pub blocks_written: u64,
    pub hash_failures: u64,
    pub total_comparisons: u64,
}

/// Ingest `input` into `store`, writing the resulting manifest to
/// `manifest_path`. `start_trim` is the pre-alignment compensation described
/// in `spec.md` §4.5; `total_bytes` drives the progress indicator and is
/// `None` for stdin input.
pub fn ingest<R: BufRead>(
    store: &mut Store,
    input: &mut R,
    start_trim: u32,
    manifest_path: &Path,
    total_bytes: Option<u64>,
) -> Result<IngestStats> {
    let mut manifest = File::create(manifest_path)
        .map_err(|e| ImagepileError::Open { path: manifest_path.to_path_buf(), source: e })?;

    write_all_checked(&mut manifest, MAGIC, "manifest header magic")?;
    manifest.write_u32::<LittleEndian>(start_trim)?;
    manifest.write_u32::<LittleEndian>(BLOCK_SIZE as u32)?;

    let mut progress = Progress::new(total_bytes);
    let mut trim = start_trim;
    let mut stats = IngestStats::default();

    loop {
        let want = if trim > 0 { BLOCK_SIZE - trim as usize } else { BLOCK_SIZE };
        let mut raw = vec![0u8; want];
        let got = read_fill(input, &mut raw)?;
        progress.update(got as u64, store.hash_failures);

        if got == 0 {
            break;
        }

        let at_eof = input.fill_buf()?.is_empty();

        if got < BLOCK_SIZE {
            let mut block = [0u8; BLOCK_SIZE];
            block[..got].copy_from_slice(&raw[..got]);

            if at_eof {
                let offset = store.dedup_block(&block)?;
                manifest.write_u32::<LittleEndian>(offset)?;
                stats.blocks_written += 1;
                manifest.seek(SeekFrom::Start(8))?;
                manifest.write_u32::<LittleEndian>(got as u32)?;
                manifest.flush()?;
                maybe_flush_and_exit(store, &mut manifest)?;
                break;
            } else if trim == 0 {
                return Err(ImagepileError::ShortRead {
                    expected: BLOCK_SIZE,
                    got,
                    context: "short read but not start or end of image",
                });
            }
            // Partial first chunk, more data still to come: admit the
            // zero-padded block as-is and fall through to the normal path.
            let offset = store.dedup_block(&block)?;
            manifest.write_u32::<LittleEndian>(offset)?;
            stats.blocks_written += 1;
            trim = 0;
            maybe_flush_and_exit(store, &mut manifest)?;
            continue;
        }

        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&raw);
        let offset = store.dedup_block(&block)?;
        manifest.write_u32::<LittleEndian>(offset)?;
        stats.blocks_written += 1;
        trim = 0;
        maybe_flush_and_exit(store, &mut manifest)?;
        if at_eof {
            break;
        }
    }

    progress.finish();
    stats.hash_failures = store.hash_failures;
    stats.total_comparisons = store.total_comparisons();
    info!(
        blocks = stats.blocks_written,
        hash_failures = stats.hash_failures,
        "ingest complete"
    );
    Ok(stats)
}

fn maybe_flush_and_exit(store: &mut Store, manifest: &mut File) -> Result<()> {
    if store.pending_termination() {
        store.flush_index()?;
        let _ = manifest.flush();
        std::process::exit(1);
    }
    Ok(())
}
