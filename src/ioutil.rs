//! Small read/write helpers shared by the pool, index, and manifest code.
//!
//! `spec.md` §7 treats any short read or short write against these files as
//! fatal; these helpers turn the ambiguous partial-I/O outcomes `Read`/
//! `Write` allow into the crate's dedicated error variants instead of a bare
//! `io::Error`.

use std::io::{Read, Write};

use crate::error::{ImagepileError, Result};

/// Reads into `buf` until it is full or the reader reports true EOF (a
/// `read()` call returning `Ok(0)`), looping across any short intermediate
/// reads. Returns the number of bytes actually placed; a result shorter than
/// `buf.len()` means EOF was reached before the buffer filled.
pub fn read_fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Like [`read_fill`], but a short read is always fatal — used for the pool
/// and index files, where a partial record means on-disk corruption rather
/// than a legitimate end-of-stream.
pub fn read_exact_checked<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    context: &'static str,
) -> Result<()> {
    let filled = read_fill(reader, buf)?;
    if filled != buf.len() {
        return Err(ImagepileError::ShortRead {
            expected: buf.len(),
            got: filled,
            context,
        });
    }
    Ok(())
}

/// Writes the entirety of `buf`, treating a short write as fatal.
pub fn write_all_checked<W: Write + ?Sized>(
    writer: &mut W,
    buf: &[u8],
    context: &'static str,
) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if written != buf.len() {
        return Err(ImagepileError::ShortWrite {
            expected: buf.len(),
            got: written,
            context,
        });
    }
    Ok(())
}
