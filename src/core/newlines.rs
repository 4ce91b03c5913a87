// Record terminator matching
//
// `Auto` accepts `\r\n`, `\r` and `\n` (greedy: `\r\n` is one terminator),
// `Exact` accepts one configured sequence. A bare `\r` at the end of the
// buffered data cannot be resolved until the next byte is known, so it
// reports `NeedMore` unless the stream has ended.

use super::matcher::{match_sequence, MatchResult, PartialMatch};
use crate::dialect::Newline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Newlines {
    Auto,
    Exact(Vec<u8>),
}

impl Newlines {
    pub fn from_dialect(newline: &Newline) -> Self {
        match newline {
            Newline::Auto => Newlines::Auto,
            Newline::Explicit(nl) => Newlines::Exact(nl.as_bytes().to_vec()),
        }
    }

    /// Bytes a terminator can start with.
    pub fn first_bytes(&self) -> Vec<u8> {
        match self {
            Newlines::Auto => vec![b'\r', b'\n'],
            Newlines::Exact(p) => vec![p[0]],
        }
    }

    /// Match a terminator at the start of `data`.
    ///
    /// `progress` is the state returned by an earlier `NeedMore` for the same
    /// position; bytes it covers are not compared again.
    #[inline]
    pub fn try_match(&self, data: &[u8], progress: PartialMatch, eof: bool) -> MatchResult {
        match self {
            Newlines::Auto => {
                // A partial match here always means "\r seen"
                if progress == PartialMatch::NoMatch {
                    match data.first() {
                        Some(b'\n') => return MatchResult::Matched(1),
                        Some(b'\r') => {}
                        Some(_) => return MatchResult::NoMatch,
                        None if eof => return MatchResult::NoMatch,
                        None => return MatchResult::NeedMore(PartialMatch::NoMatch),
                    }
                }
                match data.get(1) {
                    Some(b'\n') => MatchResult::Matched(2),
                    Some(_) => MatchResult::Matched(1),
                    None if eof => MatchResult::Matched(1),
                    None => MatchResult::NeedMore(PartialMatch::Partial(1)),
                }
            }
            Newlines::Exact(pattern) => match_sequence(pattern, data, progress, eof),
        }
    }
}
