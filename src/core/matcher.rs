// Multi-byte token matching with refill-safe partial state
//
// A delimiter or newline may straddle the end of the buffered data. Instead
// of rescanning after a refill, the matcher hands back how many bytes already
// compared equal, and the caller passes that state in again once more data is
// buffered. The matched bytes stay in the buffer (the refill keeps everything
// from the current position onwards), so comparison resumes at byte `k`.

use super::newlines::Newlines;

/// Progress of an unfinished token comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialMatch {
    /// Nothing compared yet.
    #[default]
    NoMatch,
    /// The first `n` bytes already matched.
    Partial(usize),
}

impl PartialMatch {
    #[inline]
    pub fn matched(self) -> usize {
        match self {
            PartialMatch::NoMatch => 0,
            PartialMatch::Partial(n) => n,
        }
    }
}

/// Outcome of one match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The token matched; it is this many bytes long.
    Matched(usize),
    /// The token definitively does not start here.
    NoMatch,
    /// Buffered data ran out mid-comparison; refill and retry with this state.
    NeedMore(PartialMatch),
}

/// Compare `pattern` against the start of `data`, resuming from `progress`.
#[inline]
pub fn match_sequence(
    pattern: &[u8],
    data: &[u8],
    progress: PartialMatch,
    eof: bool,
) -> MatchResult {
    let mut k = progress.matched();
    while k < pattern.len() {
        match data.get(k) {
            Some(&b) if b == pattern[k] => k += 1,
            Some(_) => return MatchResult::NoMatch,
            None if eof => return MatchResult::NoMatch,
            None if k == 0 => return MatchResult::NeedMore(PartialMatch::NoMatch),
            None => return MatchResult::NeedMore(PartialMatch::Partial(k)),
        }
    }
    MatchResult::Matched(pattern.len())
}

/// Which token a match attempt was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Delimiter,
    Newline,
}

/// Delimiter and newline matchers for one session, plus the single-byte
/// markers the state machine compares directly.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    delimiter: Vec<u8>,
    newlines: Newlines,
    pub quote: u8,
    pub escape: u8,
    pub comment: Option<u8>,
}

impl TokenMatcher {
    pub fn new(
        delimiter: &[u8],
        newlines: Newlines,
        quote: u8,
        escape: u8,
        comment: Option<u8>,
    ) -> Self {
        TokenMatcher {
            delimiter: delimiter.to_vec(),
            newlines,
            quote,
            escape,
            comment,
        }
    }

    pub fn newlines(&self) -> &Newlines {
        &self.newlines
    }

    #[inline]
    pub fn delimiter_first(&self) -> u8 {
        self.delimiter[0]
    }

    #[inline]
    pub fn is_newline_first(&self, byte: u8) -> bool {
        match &self.newlines {
            Newlines::Auto => byte == b'\r' || byte == b'\n',
            Newlines::Exact(p) => p[0] == byte,
        }
    }

    /// Try `kind` at the start of `data`.
    #[inline]
    pub fn try_match(
        &self,
        kind: TokenKind,
        data: &[u8],
        progress: PartialMatch,
        eof: bool,
    ) -> MatchResult {
        match kind {
            TokenKind::Delimiter => match_sequence(&self.delimiter, data, progress, eof),
            TokenKind::Newline => self.newlines.try_match(data, progress, eof),
        }
    }
}
