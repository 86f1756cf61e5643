/// Pipeline orchestrator for the chunked external sort.
///
/// Chunk loop: map the next window of the source, scan it into buckets,
/// sort the buckets in parallel, flush them as a sorted run, then pair the
/// run through the single-slot hand-off so a background thread can merge
/// it while the next chunk is being scanned. Pairing overlaps CPU-bound
/// merging with I/O-bound scanning and bounds the number of unmerged runs
/// alive at once.
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rayon::prelude::*;

use tracing::{debug, info};

use crate::common::CancelToken;
use crate::common::io::map_input;
use crate::error::Error;

use super::compare::compare_keys;
use super::key::{Buckets, scan_chunk};
use super::merge::merge_runs;
use super::run::{RunFile, write_run};

/// Parameters for one sort operation.
#[derive(Debug, Clone)]
pub struct SortOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Target bytes consumed per chunk before it is sorted and flushed.
    pub chunk_size: usize,
    /// Directory for temporary runs. Defaults to the output's directory so
    /// the final promotion is an atomic rename.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    Completed { lines: u64 },
    /// Early cooperative stop: the destination was left untouched and all
    /// temp runs were cleaned up.
    Cancelled,
}

/// The pending-run slot: at most one sorted run parked awaiting a merge
/// partner. The sole shared mutable state in the pipeline; only the slot
/// operation is synchronized, and no lock is held across I/O.
#[derive(Default)]
struct PendingRun(Mutex<Option<RunFile>>);

impl PendingRun {
    /// Atomic take-or-insert: parks `run` if the slot is empty, otherwise
    /// returns it together with the previously parked partner. A parked
    /// run is never silently overwritten.
    fn pair(&self, run: RunFile) -> Option<(RunFile, RunFile)> {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(parked) => Some((run, parked)),
            None => {
                *slot = Some(run);
                None
            }
        }
    }

    fn take(&self) -> Option<RunFile> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Sort `opts.input` into `opts.output` without holding more than one
/// chunk of keys in memory. Returns how many lines were written, or
/// `Cancelled` after an early cooperative stop.
pub fn sort_file(opts: &SortOptions, cancel: &CancelToken) -> Result<SortOutcome, Error> {
    let started = Instant::now();
    info!(
        input = %opts.input.display(),
        output = %opts.output.display(),
        chunk_size = opts.chunk_size,
        "sorting file"
    );

    let data = map_input(&opts.input).map_err(|e| Error::io(&opts.input, e))?;
    let scratch = scratch_dir(opts);

    let slot = Arc::new(PendingRun::default());
    let mut merges: Vec<JoinHandle<io::Result<()>>> = Vec::new();
    let mut buckets = Buckets::new();
    let mut offset = 0usize;
    let mut total_lines = 0u64;
    let mut chunk_err: Option<Error> = None;

    while offset < data.len() && !cancel.is_cancelled() {
        let window = &data[offset..];

        let chunk_started = Instant::now();
        let scanned = scan_chunk(window, opts.chunk_size, &mut buckets, cancel);
        debug!(
            offset,
            consumed = scanned.consumed,
            lines = scanned.lines,
            elapsed = ?chunk_started.elapsed(),
            "chunk scanned"
        );

        // A cancellation inside the scanner stops cleanly at a line
        // boundary; the partial chunk is discarded unsorted.
        if cancel.is_cancelled() || scanned.lines == 0 {
            break;
        }

        sort_buckets(window, &mut buckets);

        let run = match write_run(window, buckets.as_slice(), &scratch) {
            Ok(run) => run,
            Err(e) => {
                // Still join the in-flight merges below before propagating.
                chunk_err = Some(Error::io(&scratch, e));
                break;
            }
        };
        debug!(run = %run.path.display(), lines = run.lines, "run flushed");

        total_lines += run.lines;
        buckets.clear();
        offset += scanned.consumed;

        if let Some((fresh, parked)) = slot.pair(run) {
            let slot = Arc::clone(&slot);
            let cancel = cancel.clone();
            let scratch = scratch.clone();
            merges.push(thread::spawn(move || {
                merge_worker(fresh, parked, &scratch, &slot, &cancel)
            }));
        }
    }

    // Join every scheduled merge before touching the slot: merges are
    // awaited rather than aborted, so no run or file handle is leaked.
    let mut merge_err: Option<io::Error> = None;
    for handle in merges {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                merge_err.get_or_insert(e);
            }
            Err(_) => {
                merge_err.get_or_insert(io::Error::other("merge thread panicked"));
            }
        }
    }
    if let Some(e) = chunk_err.or_else(|| merge_err.map(Error::Merge)) {
        if let Some(run) = slot.take() {
            run.discard();
        }
        return Err(e);
    }

    if cancel.is_cancelled() {
        if let Some(run) = slot.take() {
            run.discard();
        }
        info!("sort cancelled, destination untouched");
        return Ok(SortOutcome::Cancelled);
    }

    match slot.take() {
        Some(run) => promote(run, &opts.output).map_err(|e| Error::io(&opts.output, e))?,
        // Empty input: produce an empty destination.
        None => drop(File::create(&opts.output).map_err(|e| Error::io(&opts.output, e))?),
    }

    info!(lines = total_lines, elapsed = ?started.elapsed(), "sort finished");
    Ok(SortOutcome::Completed { lines: total_lines })
}

/// Sort each of the 256 buckets independently and in parallel. Buckets are
/// disjoint and the window is read-only, so the workers never contend; no
/// inter-bucket ordering is computed — it is implied by the index.
pub fn sort_buckets(window: &[u8], buckets: &mut Buckets) {
    buckets.as_mut_slice().par_iter_mut().for_each(|bucket| {
        bucket.sort_unstable_by(|a, b| compare_keys(window, a, b));
    });
}

/// Background merge task. Merges its pair, then re-inserts the result via
/// the same atomic take-or-insert: if the slot already holds a newer run,
/// take it and keep merging, preserving the at-most-one-parked invariant.
/// A single worker may therefore outlive several chunk iterations.
fn merge_worker(
    a: RunFile,
    b: RunFile,
    scratch: &Path,
    slot: &PendingRun,
    cancel: &CancelToken,
) -> io::Result<()> {
    let mut pair = (a, b);
    loop {
        let Some(merged) = merge_runs(pair.0, pair.1, scratch, cancel)? else {
            // Cancelled; the partial output is already gone.
            return Ok(());
        };
        match slot.pair(merged) {
            Some(next) => pair = next,
            None => return Ok(()),
        }
    }
}

fn scratch_dir(opts: &SortOptions) -> PathBuf {
    match &opts.scratch_dir {
        Some(dir) => dir.clone(),
        None => match opts.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// Promote the final run to the destination: atomic rename when the
/// scratch directory shares a filesystem with the destination, copy
/// otherwise (the temp file is then removed on drop).
fn promote(run: RunFile, dest: &Path) -> io::Result<()> {
    match run.path.persist(dest) {
        Ok(()) => Ok(()),
        Err(err) => {
            fs::copy(&err.path, dest)?;
            err.path.close()
        }
    }
}
