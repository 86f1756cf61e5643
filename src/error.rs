use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the public sort, merge, and generate entry points.
/// All I/O failures are fatal for the whole operation; temp runs are
/// cleaned up best-effort before one propagates. Nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A background merge task failed.
    #[error("merge failed: {0}")]
    Merge(#[source] io::Error),

    /// Generator line size below the grammar minimum
    /// (number + separator + terminator + one payload byte).
    #[error("line size must be at least {min} bytes, got {got}")]
    LineTooShort { min: usize, got: usize },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
