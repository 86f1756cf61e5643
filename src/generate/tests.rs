use std::fs;

use super::core::*;
use crate::common::CancelToken;
use crate::common::io::TERMINATOR;
use crate::error::Error;

fn options(dir: &std::path::Path, target_size: u64, max_line_size: usize) -> GenerateOptions {
    GenerateOptions {
        output: dir.join("generated.txt"),
        target_size,
        max_line_size,
    }
}

#[test]
fn test_rejects_too_small_line_size() {
    let dir = tempfile::tempdir().unwrap();
    let err = generate_file(&options(dir.path(), 1024, MIN_LINE_SIZE - 1), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::LineTooShort { .. }));
}

#[test]
fn test_generates_grammar_lines_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 4096, 32);
    let generated = generate_file(&opts, &CancelToken::new()).unwrap();

    let content = fs::read(&opts.output).unwrap();
    assert_eq!(content.len() as u64, generated.bytes);
    assert!(generated.bytes >= 4096);
    // The last line may overshoot the target by less than one line.
    assert!(generated.bytes < 4096 + 32);

    let mut lines = 0u64;
    for line in content.split(|&b| b == *TERMINATOR.last().unwrap()) {
        if line.is_empty() {
            continue; // trailing split after the final terminator
        }
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        assert!(line.len() + TERMINATOR.len() <= 32);

        let dot = line.iter().position(|&b| b == b'.').unwrap();
        assert!(dot > 0);
        assert!(line[..dot].iter().all(|b| b.is_ascii_digit()));
        assert_eq!(line[dot + 1], b' ');

        let payload = &line[dot + 2..];
        assert!(!payload.is_empty());
        assert!(payload.iter().all(|b| b.is_ascii_uppercase()));
        lines += 1;
    }
    assert_eq!(lines, generated.lines);
}

#[test]
fn test_cancelled_generation_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path(), 4096, 32);

    let cancel = CancelToken::new();
    cancel.cancel();
    let generated = generate_file(&opts, &cancel).unwrap();

    assert_eq!(generated, Generated { bytes: 0, lines: 0 });
    assert_eq!(fs::read(&opts.output).unwrap(), b"");
}
