/// Intra-bucket comparator.
///
/// Precondition: both keys come from the same bucket of the same chunk
/// window. Inter-bucket order is the bucket index; inter-chunk order is the
/// merge's job. Most comparisons resolve on the packed prefix without ever
/// touching the window.
use std::cmp::Ordering;

use crate::common::io::TERMINATOR_FIRST;

use super::key::LineKey;

/// Total order over two keys sharing a bucket: payload lexicographic,
/// ties broken by ascending line number.
pub fn compare_keys(window: &[u8], a: &LineKey, b: &LineKey) -> Ordering {
    match a.prefix.cmp(&b.prefix) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match (a.remainder, b.remainder) {
        // Both payloads fit in the head. Equal prefixes can still hide a
        // length difference ("AB" vs "AB\0"), so order by captured length
        // before the number tie-break.
        (None, None) => a.head_len.cmp(&b.head_len).then(a.number.cmp(&b.number)),
        // The side without a remainder is a prefix of (or equal to) the
        // other's first five bytes, so it sorts first.
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ra), Some(rb)) => compare_remainders(window, a, b, ra, rb),
    }
}

fn compare_remainders(
    window: &[u8],
    a: &LineKey,
    b: &LineKey,
    mut ra: usize,
    mut rb: usize,
) -> Ordering {
    loop {
        match (payload_byte(window, ra), payload_byte(window, rb)) {
            (None, None) => return a.number.cmp(&b.number),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ba), Some(bb)) => match ba.cmp(&bb) {
                Ordering::Equal => {
                    ra += 1;
                    rb += 1;
                }
                ord => return ord,
            },
        }
    }
}

/// Payload byte at `pos`, or None once the line's terminator (or the end
/// of the window, for an unterminated final line) is reached.
#[inline]
fn payload_byte(window: &[u8], pos: usize) -> Option<u8> {
    match window.get(pos) {
        Some(&b) if b != TERMINATOR_FIRST => Some(b),
        _ => None,
    }
}
