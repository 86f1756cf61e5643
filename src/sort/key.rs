/// Key extraction for the chunked external sort.
///
/// Each line `<number>". "<payload><terminator>` is reduced to a compact
/// `LineKey` so a whole chunk can be sorted without touching the mapped
/// bytes again for most comparisons: the payload's first byte selects one
/// of 256 buckets, the next four bytes are packed into a `u32` prefix, and
/// only payloads longer than five bytes keep an offset back into the window.
use memchr::memchr;

use crate::common::CancelToken;
use crate::common::io::{TERMINATOR, TERMINATOR_LAST};

/// Number of leading payload bytes captured inline in a key: the bucket
/// byte plus up to four prefix bytes.
pub const HEAD_CAPTURE: usize = 5;

/// Compact sort key for one line of the current chunk window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineKey {
    /// Leading integer field; the ascending tie-break. Parsing saturates
    /// at `u64::MAX` rather than wrapping.
    pub number: u64,
    /// Payload bytes 1..=4 packed big-endian and left-aligned, so unsigned
    /// comparison matches lexicographic order; unused trailing bytes are 0.
    pub prefix: u32,
    /// Count of payload bytes captured inline (bucket byte included),
    /// 0..=5. Distinguishes "AB" from "AB\0", which pack the same prefix.
    pub head_len: u8,
    /// Window offset of the first payload byte past the captured head, or
    /// None when the whole payload fit in the head (length <= 5).
    pub remainder: Option<usize>,
    /// Window span of the raw digit field. The run writer copies these
    /// bytes verbatim, so leading zeros and digit fields wider than u64
    /// survive into the output; `number` is only the ordering value.
    pub digits_start: usize,
    pub digits_len: usize,
}

/// The 256 per-first-byte partitions of one chunk. Inter-bucket order is
/// the index itself; only intra-bucket order ever needs comparisons.
pub struct Buckets(Box<[Vec<LineKey>; 256]>);

impl Buckets {
    pub fn new() -> Self {
        Buckets(Box::new(std::array::from_fn(|_| Vec::new())))
    }

    #[inline]
    pub fn push(&mut self, bucket: u8, key: LineKey) {
        self.0[bucket as usize].push(key);
    }

    pub fn as_slice(&self) -> &[Vec<LineKey>] {
        &self.0[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Vec<LineKey>] {
        &mut self.0[..]
    }

    /// Empty every bucket, keeping allocations for the next chunk.
    pub fn clear(&mut self) {
        for bucket in self.0.iter_mut() {
            bucket.clear();
        }
    }

}

impl Default for Buckets {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of scanning one chunk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Scanned {
    /// Bytes consumed from the window. Always ends on a line boundary (or
    /// the end of the window) — a line is never split across chunks.
    pub consumed: usize,
    /// Lines bucketed.
    pub lines: u64,
}

/// Parse leading ASCII decimal digits, returning the value and the number
/// of bytes consumed. Saturates at `u64::MAX` on overflow: pathological
/// inputs sort deterministically instead of wrapping.
#[inline]
pub(crate) fn parse_number(bytes: &[u8]) -> (u64, usize) {
    let mut n = 0u64;
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        n = n
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as u64);
        i += 1;
    }
    (n, i)
}

/// Scan lines from `window` into `buckets`, stopping at the first line
/// boundary at or past `threshold`, at the end of the window, or on
/// cancellation (polled at every line boundary).
///
/// The grammar is not validated: a line without the `". "` separator still
/// produces a key from whatever bytes follow its digits — garbage in,
/// garbage order.
pub fn scan_chunk(
    window: &[u8],
    threshold: usize,
    buckets: &mut Buckets,
    cancel: &CancelToken,
) -> Scanned {
    let mut offset = 0usize;
    let mut lines = 0u64;

    while offset < window.len() {
        if cancel.is_cancelled() {
            break;
        }

        let rest = &window[offset..];
        let (line_end, advance) = match memchr(TERMINATOR_LAST, rest) {
            Some(pos) => {
                let mut end = pos;
                if TERMINATOR.len() == 2 && end > 0 && rest[end - 1] == b'\r' {
                    end -= 1;
                }
                (end, pos + 1)
            }
            // Final line without a terminator.
            None => (rest.len(), rest.len()),
        };

        let line = &rest[..line_end];
        let (number, digits) = parse_number(line);

        let mut p = digits;
        if line.get(p) == Some(&b'.') {
            p += 1;
        }
        if line.get(p) == Some(&b' ') {
            p += 1;
        }
        let payload = &line[p..];

        let head_len = payload.len().min(HEAD_CAPTURE);
        let bucket = payload.first().copied().unwrap_or(0);

        let mut packed = [0u8; 4];
        if head_len > 1 {
            packed[..head_len - 1].copy_from_slice(&payload[1..head_len]);
        }

        let remainder = if payload.len() > HEAD_CAPTURE {
            // Absolute offset within the window of the first uncaptured byte.
            Some(offset + p + HEAD_CAPTURE)
        } else {
            None
        };

        buckets.push(
            bucket,
            LineKey {
                number,
                prefix: u32::from_be_bytes(packed),
                head_len: head_len as u8,
                remainder,
                digits_start: offset,
                digits_len: digits,
            },
        );

        lines += 1;
        offset += advance;

        if offset >= threshold {
            break;
        }
    }

    Scanned {
        consumed: offset,
        lines,
    }
}
