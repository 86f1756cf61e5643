/// Run writer: serializes sorted buckets into a new temporary run file.
use std::io::{self, BufWriter, Write};
use std::path::Path;

use memchr::memchr;
use tempfile::{Builder, TempPath};
use tracing::warn;

use crate::common::io::{TERMINATOR, TERMINATOR_FIRST};

use super::key::LineKey;

/// 64 KiB write buffer for run files.
pub(crate) const RUN_BUF_SIZE: usize = 1 << 16;

/// A sorted temporary run. Owning the `TempPath` means the file is deleted
/// when the run is dropped without being merged or promoted; ownership
/// transfers exactly once per hand-off, so no two tasks ever hold the same
/// run.
#[derive(Debug)]
pub struct RunFile {
    pub path: TempPath,
    pub lines: u64,
}

impl RunFile {
    /// Delete the run, logging (not propagating) a failure.
    pub(crate) fn discard(self) {
        if let Err(err) = self.path.close() {
            warn!(%err, "failed to delete temp run");
        }
    }
}

/// Create an anonymous run file in the scratch directory.
pub(crate) fn scratch_file(scratch: &Path, prefix: &str) -> io::Result<(std::fs::File, TempPath)> {
    let file = Builder::new().prefix(prefix).tempfile_in(scratch)?;
    Ok(file.into_parts())
}

/// Serialize pre-sorted buckets into a new run file under `scratch`.
/// Bucket order followed by intra-bucket order equals the required global
/// order for the chunk the window was scanned from. The digit field is
/// copied verbatim from the window, never re-encoded from the parsed
/// number, so non-canonical digits round-trip. Returns the run and its
/// line count.
pub fn write_run(window: &[u8], buckets: &[Vec<LineKey>], scratch: &Path) -> io::Result<RunFile> {
    let (file, path) = scratch_file(scratch, "bigsort-run-")?;
    let mut out = BufWriter::with_capacity(RUN_BUF_SIZE, file);
    let mut lines = 0u64;

    for (bucket, keys) in buckets.iter().enumerate() {
        for key in keys {
            out.write_all(&window[key.digits_start..key.digits_start + key.digits_len])?;
            out.write_all(b". ")?;
            write_payload(&mut out, window, bucket as u8, key)?;
            out.write_all(TERMINATOR)?;
            lines += 1;
        }
    }
    out.flush()?;

    Ok(RunFile { path, lines })
}

/// Reconstruct one payload: the captured head bytes (bucket byte plus
/// leading prefix bytes, exactly `head_len` of them), then — for long
/// payloads — the raw window bytes from the remainder offset up to the
/// terminator.
fn write_payload(
    out: &mut impl Write,
    window: &[u8],
    bucket: u8,
    key: &LineKey,
) -> io::Result<()> {
    let head_len = key.head_len as usize;
    if head_len == 0 {
        // Empty payload: the line is just "<number>. ".
        return Ok(());
    }

    out.write_all(&[bucket])?;
    out.write_all(&key.prefix.to_be_bytes()[..head_len - 1])?;

    if let Some(start) = key.remainder {
        let tail = &window[start..];
        let end = memchr(TERMINATOR_FIRST, tail).unwrap_or(tail.len());
        out.write_all(&tail[..end])?;
    }
    Ok(())
}
