/// Synthetic test-file generator: random lines of the sort grammar,
/// `<number>". "<uppercase payload><terminator>`, written until a target
/// byte size is reached. Not part of the sorting core.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use tracing::info;

use crate::common::CancelToken;
use crate::common::io::TERMINATOR;
use crate::error::Error;

/// Ten digits for the number, two for the separator, terminator headroom
/// for both platforms, and at least one payload byte.
pub const MIN_LINE_SIZE: usize = 10 + 2 + 2 + 1;

/// 64 KiB write buffer.
const GEN_BUF_SIZE: usize = 1 << 16;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output: PathBuf,
    /// Stop once at least this many bytes have been written.
    pub target_size: u64,
    /// Upper bound for one whole line, terminator included.
    pub max_line_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generated {
    pub bytes: u64,
    pub lines: u64,
}

/// Write random grammar lines until the target size is reached (the last
/// line may overshoot by less than `max_line_size`). Cancellable between
/// lines; a cancelled run leaves whatever was already flushed.
pub fn generate_file(opts: &GenerateOptions, cancel: &CancelToken) -> Result<Generated, Error> {
    if opts.max_line_size < MIN_LINE_SIZE {
        return Err(Error::LineTooShort {
            min: MIN_LINE_SIZE,
            got: opts.max_line_size,
        });
    }

    let started = Instant::now();
    info!(
        output = %opts.output.display(),
        target_size = opts.target_size,
        max_line_size = opts.max_line_size,
        "generating test file"
    );

    let file = File::create(&opts.output).map_err(|e| Error::io(&opts.output, e))?;
    let mut out = BufWriter::with_capacity(GEN_BUF_SIZE, file);
    let mut rng = rand::thread_rng();
    let mut digits = itoa::Buffer::new();
    let mut line = Vec::with_capacity(opts.max_line_size);

    let mut bytes = 0u64;
    let mut lines = 0u64;

    while bytes < opts.target_size && !cancel.is_cancelled() {
        line.clear();

        let number: u32 = rng.r#gen();
        line.extend_from_slice(digits.format(number).as_bytes());
        line.extend_from_slice(b". ");

        let budget = opts.max_line_size - line.len() - TERMINATOR.len();
        let payload_len = rng.gen_range(1..=budget);
        for _ in 0..payload_len {
            line.push(rng.gen_range(b'A'..=b'Z'));
        }
        line.extend_from_slice(TERMINATOR);

        out.write_all(&line).map_err(|e| Error::io(&opts.output, e))?;
        bytes += line.len() as u64;
        lines += 1;
    }

    out.flush().map_err(|e| Error::io(&opts.output, e))?;

    info!(bytes, lines, elapsed = ?started.elapsed(), "generation finished");
    Ok(Generated { bytes, lines })
}
