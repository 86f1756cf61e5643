use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

/// Platform line terminator. The line grammar uses the OS convention, the
/// same bytes the bundled generator writes; mixed terminators within one
/// file are not supported.
#[cfg(windows)]
pub const TERMINATOR: &[u8] = b"\r\n";
#[cfg(not(windows))]
pub const TERMINATOR: &[u8] = b"\n";

/// First terminator byte: a payload never contains it, so the comparator
/// and the run writer scan for this byte to find the end of a payload.
pub const TERMINATOR_FIRST: u8 = TERMINATOR[0];

/// Last terminator byte: line boundaries are located by scanning for it.
pub const TERMINATOR_LAST: u8 = TERMINATOR[TERMINATOR.len() - 1];

/// Holds file data — either zero-copy mmap or an owned Vec.
/// Dereferences to `&[u8]` for transparent use.
pub enum FileData {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FileData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileData::Mmap(m) => m,
            FileData::Owned(v) => v,
        }
    }
}

/// Threshold below which we use read() instead of mmap.
/// For files under 1MB, read() is faster since mmap has setup/teardown
/// overhead that exceeds the zero-copy benefit.
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Map a file read-only with mmap, or slurp it for small/irregular files.
/// The mapping is an optimization, not a contract: the sorter only needs
/// random access to already-produced bytes of the current chunk.
pub fn map_input(path: &Path) -> io::Result<FileData> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let len = metadata.len();

    if len == 0 || !metadata.file_type().is_file() {
        let mut buf = Vec::new();
        let mut reader = file;
        reader.read_to_end(&mut buf)?;
        return Ok(FileData::Owned(buf));
    }

    if len < MMAP_THRESHOLD {
        let mut buf = Vec::with_capacity(len as usize);
        let mut reader = file;
        reader.read_to_end(&mut buf)?;
        return Ok(FileData::Owned(buf));
    }

    // SAFETY: read-only mapping of a regular file.
    match unsafe { MmapOptions::new().map(&file) } {
        Ok(mmap) => {
            #[cfg(target_os = "linux")]
            {
                // Scanning is sequential but remainder comparisons jump
                // around inside the current chunk, so ask for readahead
                // without disabling it.
                let _ = mmap.advise(memmap2::Advice::Sequential);
                let _ = mmap.advise(memmap2::Advice::WillNeed);
            }
            Ok(FileData::Mmap(mmap))
        }
        Err(_) => {
            // mmap failed — fall back to read
            let mut buf = Vec::with_capacity(len as usize);
            let mut reader = file;
            reader.read_to_end(&mut buf)?;
            Ok(FileData::Owned(buf))
        }
    }
}
