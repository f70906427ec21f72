//! Stderr progress indicator for `add` (`spec.md` §6: disabled for stdin
//! input, since a pipe has no knowable total length).
//!
//! Mirrors the original tool's percent-of-total-size line, printed as a
//! carriage-return-terminated update rather than one line per block.

use std::io::Write;

pub struct Progress {
    total_bytes: Option<u64>,
    bytes_done: u64,
    last_percent: i64,
}

impl Progress {
    /// `total_bytes` is `None` when reading from stdin — in that case every
    /// call to [`Progress::update`] is a no-op, matching the original's
    /// behavior of disabling the indicator for `-`.
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self { total_bytes, bytes_done: 0, last_percent: -1 }
    }

    /// Record that `n` more bytes of input have been consumed, and print an
    /// updated status line if the percentage has changed.
    pub fn update(&mut self, n: u64, hash_failures: u64) {
        let Some(total) = self.total_bytes else { return };
        self.bytes_done += n;
        if total == 0 {
            return;
        }
        let percent = ((self.bytes_done as u128 * 100) / total as u128) as i64;
        if percent != self.last_percent {
            self.last_percent = percent;
            eprint!("\r{percent}% complete ({hash_failures} hash fails)");
            let _ = std::io::stderr().flush();
        }
    }

    /// Finish the line so subsequent output doesn't collide with it.
    pub fn finish(&self) {
        if self.total_bytes.is_some() {
            eprintln!();
        }
    }
}
