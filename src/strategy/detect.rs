// Delimiter detection
//
// Runs once per session on the first buffer of input:
// 1. Remove quoted regions (RFC4180) or escaped bytes (Escape) so embedded
//    candidates are not counted.
// 2. Split the sample into lines; the last line is dropped when there is more
//    than one, since the buffer may have cut it short.
// 3. Keep candidates that occur on every line and rank them by total count.
//    Ties go to the earlier candidate. The configured delimiter wins outright
//    when it occurs on every line of a multi-line sample.

use memchr::memmem;

use crate::core::newlines::Newlines;
use crate::dialect::{Dialect, Mode};

/// Pick a delimiter for `sample`, or `None` when no candidate occurs on every
/// line.
pub fn detect_delimiter(sample: &[u8], dialect: &Dialect) -> Option<String> {
    let text = strip_escaped(sample, dialect);
    let newlines = Newlines::from_dialect(dialect.newline());
    let mut lines = split_lines(&text, &newlines);
    if lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return None;
    }

    let candidates = dialect.detect_delimiter_values();
    let mut ranked: Vec<(usize, &str)> = Vec::new();
    for candidate in candidates {
        let finder = memmem::Finder::new(candidate.as_bytes());
        let mut total = 0;
        let mut on_every_line = true;
        for line in &lines {
            let count = finder.find_iter(line).count();
            if count == 0 {
                on_every_line = false;
                break;
            }
            total += count;
        }
        if on_every_line {
            ranked.push((total, candidate.as_str()));
        }
    }
    if ranked.is_empty() {
        return None;
    }

    if lines.len() > 1 && ranked.iter().any(|(_, c)| *c == dialect.delimiter()) {
        return Some(dialect.delimiter().to_string());
    }
    // Stable sort keeps candidate order for equal totals
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.first().map(|(_, c)| c.to_string())
}

fn strip_escaped(sample: &[u8], dialect: &Dialect) -> Vec<u8> {
    let mut out = Vec::with_capacity(sample.len());
    match dialect.mode() {
        Mode::Rfc4180 => {
            let quote = dialect.quote();
            let mut in_quotes = false;
            for &b in sample {
                if b == quote {
                    in_quotes = !in_quotes;
                } else if !in_quotes {
                    out.push(b);
                }
            }
        }
        Mode::Escape => {
            let escape = dialect.escape();
            let mut bytes = sample.iter();
            while let Some(&b) = bytes.next() {
                if b == escape {
                    bytes.next();
                } else {
                    out.push(b);
                }
            }
        }
        Mode::NoEscape => out.extend_from_slice(sample),
    }
    out
}

fn split_lines<'a>(text: &'a [u8], newlines: &Newlines) -> Vec<&'a [u8]> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let hit = match newlines {
            Newlines::Auto => memchr::memchr2(b'\r', b'\n', rest).map(|i| {
                let len = if rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                (i, len)
            }),
            Newlines::Exact(pattern) => memmem::find(rest, pattern).map(|i| (i, pattern.len())),
        };
        match hit {
            Some((i, len)) => {
                lines.push(&rest[..i + len]);
                rest = &rest[i + len..];
            }
            None => {
                lines.push(rest);
                rest = &[];
            }
        }
    }
    lines
}
