/// External 2-way merge: streams two sorted files into one.
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::common::CancelToken;
use crate::common::io::{TERMINATOR, TERMINATOR_LAST};

use super::key::parse_number;
use super::run::{RUN_BUF_SIZE, RunFile, scratch_file};

/// Forward-only decoder over one sorted input. Holds the current raw line
/// (terminator stripped) plus its parsed number and payload offset; end of
/// stream leaves no pending line.
struct LineDecoder {
    reader: BufReader<File>,
    raw: Vec<u8>,
    number: u64,
    payload_start: usize,
    pending: bool,
}

impl LineDecoder {
    fn new(file: File) -> Self {
        LineDecoder {
            reader: BufReader::with_capacity(RUN_BUF_SIZE, file),
            raw: Vec::with_capacity(1024),
            number: 0,
            payload_start: 0,
            pending: false,
        }
    }

    fn advance(&mut self) -> io::Result<()> {
        self.raw.clear();
        let n = self.reader.read_until(TERMINATOR_LAST, &mut self.raw)?;
        if n == 0 {
            self.pending = false;
            return Ok(());
        }

        if self.raw.last() == Some(&TERMINATOR_LAST) {
            self.raw.pop();
            if TERMINATOR.len() == 2 && self.raw.last() == Some(&b'\r') {
                self.raw.pop();
            }
        }

        let (number, digits) = parse_number(&self.raw);
        self.number = number;
        let mut p = digits;
        if self.raw.get(p) == Some(&b'.') {
            p += 1;
        }
        if self.raw.get(p) == Some(&b' ') {
            p += 1;
        }
        self.payload_start = p;
        self.pending = true;
        Ok(())
    }

    fn payload(&self) -> &[u8] {
        &self.raw[self.payload_start..]
    }

    /// Write the retained raw line verbatim (no re-encoding), re-appending
    /// the terminator stripped during decode.
    fn emit(&self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&self.raw)?;
        out.write_all(TERMINATOR)
    }
}

enum MergeStatus {
    Complete,
    Cancelled,
}

fn merge_streams(
    a: File,
    b: File,
    out: &mut BufWriter<File>,
    cancel: &CancelToken,
) -> io::Result<MergeStatus> {
    let mut left = LineDecoder::new(a);
    let mut right = LineDecoder::new(b);
    left.advance()?;
    right.advance()?;

    while left.pending && right.pending {
        if cancel.is_cancelled() {
            return Ok(MergeStatus::Cancelled);
        }

        let ord = left
            .payload()
            .cmp(right.payload())
            .then(left.number.cmp(&right.number));

        // Ties emit the left side, deterministically.
        if ord != Ordering::Greater {
            left.emit(out)?;
            left.advance()?;
        } else {
            right.emit(out)?;
            right.advance()?;
        }
    }

    // One side is exhausted: emit the survivor's pending line, then its
    // remaining bytes are already in order — bulk-copy them verbatim.
    let survivor = if left.pending { &mut left } else { &mut right };
    if survivor.pending {
        survivor.emit(out)?;
        io::copy(&mut survivor.reader, out)?;
    }

    out.flush()?;
    Ok(MergeStatus::Complete)
}

/// Merge two sorted files into a fresh temp file under `scratch`.
/// Returns None on cancellation; the partial output is deleted either way
/// unless completed.
fn merge_paths(
    a: &Path,
    b: &Path,
    scratch: &Path,
    cancel: &CancelToken,
) -> io::Result<Option<TempPath>> {
    let fa = File::open(a)?;
    let fb = File::open(b)?;
    let (file, path) = scratch_file(scratch, "bigsort-merge-")?;
    let mut out = BufWriter::with_capacity(RUN_BUF_SIZE, file);

    match merge_streams(fa, fb, &mut out, cancel)? {
        MergeStatus::Complete => Ok(Some(path)),
        // Dropping the TempPath removes the unusable partial output.
        MergeStatus::Cancelled => Ok(None),
    }
}

/// Merge two owned runs. Both inputs are deleted unconditionally on
/// completion, even on failure or cancellation.
pub(crate) fn merge_runs(
    a: RunFile,
    b: RunFile,
    scratch: &Path,
    cancel: &CancelToken,
) -> io::Result<Option<RunFile>> {
    let started = Instant::now();
    debug!(
        left = %a.path.display(),
        right = %b.path.display(),
        lines = a.lines + b.lines,
        "merging runs"
    );

    let lines = a.lines + b.lines;
    let result = merge_paths(&a.path, &b.path, scratch, cancel);
    a.discard();
    b.discard();

    match result? {
        Some(path) => {
            debug!(output = %path.display(), lines, elapsed = ?started.elapsed(), "runs merged");
            Ok(Some(RunFile { path, lines }))
        }
        None => {
            debug!("merge cancelled");
            Ok(None)
        }
    }
}

/// Merge two independently sorted files of the line grammar into one new
/// file under `scratch`, returning its path (or None when cancelled).
/// Both inputs are deleted unconditionally, even on failure; deletion
/// failures are logged, not fatal.
pub fn merge_files(
    a: &Path,
    b: &Path,
    scratch: &Path,
    cancel: &CancelToken,
) -> io::Result<Option<PathBuf>> {
    let result = merge_paths(a, b, scratch, cancel);
    remove_input(a);
    remove_input(b);

    match result? {
        Some(path) => {
            let kept = path.keep().map_err(|e| e.error)?;
            Ok(Some(kept))
        }
        None => Ok(None),
    }
}

fn remove_input(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), %err, "failed to delete merge input");
    }
}
