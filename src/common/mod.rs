pub mod io;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between the pipeline, its background
/// merge threads, and the signal handler. Clones share the underlying flag.
///
/// Cancellation is polled at line boundaries and before new chunk or merge
/// work — never a preemptive interruption.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Only stores into an atomic, so it is safe to
    /// call from a signal handler.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parse a human-readable size like "64K", "1M", "1gb", "512mb".
/// A trailing 'b'/'B' after the unit letter is accepted, plain digits are
/// bytes, and a bare 'b' suffix means 512-byte blocks (GNU sort -S compat).
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size".to_string());
    }

    // "1gb" / "512MB" style: drop the byte marker, keep the unit letter.
    let stripped = match s.as_bytes() {
        [.., u, b'b' | b'B'] if u.is_ascii_alphabetic() => &s[..s.len() - 1],
        _ => s,
    };

    let (num_part, suffix) = if stripped.ends_with(|c: char| c.is_ascii_alphabetic()) {
        let (n, u) = stripped.split_at(stripped.len() - 1);
        (n, u.chars().next())
    } else {
        (stripped, None)
    };

    let base: usize = num_part
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;

    let multiplier = match suffix {
        Some('K') | Some('k') => 1024,
        Some('M') | Some('m') => 1024 * 1024,
        Some('G') | Some('g') => 1024 * 1024 * 1024,
        Some('T') | Some('t') => 1024usize.pow(4),
        Some('b') => 512,
        Some(c) => return Err(format!("invalid suffix '{}' in size", c)),
        None => 1,
    };

    base.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("64M").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1gb").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("512mb").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_size("2b").unwrap(), 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("12x").is_err());
        assert!(parse_size("garbage").is_err());
        assert!(parse_size("999999999999999999G").is_err());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
