// Streaming reader
//
// Pulls bytes from any `Read` into a fixed-capacity buffer and walks them with
// an explicit state machine, one record per `read()` call. Memory stays
// bounded by the buffer plus the record in progress, however large the input.
//
// Key design:
// - Runs of ordinary bytes are skipped with the session's scanner; the state
//   machine only looks at bytes in the special set of its current state
// - A token at the read cursor is never consumed until it is fully resolved,
//   so a refill can always keep it (multi-byte delimiters, `\r\n`, escapes)
// - Counters move once per consumed line, after the line is complete

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use super::bad_data::{BadData, BadDataHandler, BadDataPolicy};
use super::detect::detect_delimiter;
use crate::core::buffer::Buffer;
use crate::core::cache::FieldCache;
use crate::core::counters::Position;
use crate::core::matcher::{MatchResult, PartialMatch, TokenKind, TokenMatcher};
use crate::core::newlines::Newlines;
use crate::core::record::{OwnedRecord, Record, RecordBuilder};
use crate::core::scanner::{FindSpecial, Scanner, SpecialSet};
use crate::dialect::{Dialect, Mode};
use crate::error::{Error, Result};

/// Parser states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    LineStart,
    FieldStart,
    InUnquotedField,
    InQuotedField,
    /// A quote inside a quoted field, not yet consumed: closing quote or the
    /// first half of a doubled quote.
    QuoteInQuotedField,
    AfterClosingQuote,
    InComment,
    RecordComplete,
}

/// Outcome of parsing one physical line (or one multi-line record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    End,
    Record,
    Skipped,
}

/// Terminators consumed by the line in progress.
#[derive(Debug, Clone, Copy, Default)]
struct LineBreaks {
    count: u64,
    /// Raw offset right after the last consumed terminator.
    last_end: usize,
}

/// Bytes each state has to stop on.
#[derive(Debug, Clone)]
struct SpecialSets {
    unquoted: SpecialSet,
    quoted: SpecialSet,
    comment: SpecialSet,
}

impl SpecialSets {
    fn new(dialect: &Dialect, matcher: &TokenMatcher) -> Self {
        let newline = matcher.newlines().first_bytes();

        let mut unquoted = vec![matcher.delimiter_first()];
        unquoted.extend_from_slice(&newline);
        match dialect.mode() {
            Mode::Rfc4180 => unquoted.push(dialect.quote()),
            Mode::Escape => unquoted.push(dialect.escape()),
            Mode::NoEscape => {}
        }

        let mut quoted = vec![dialect.quote(), dialect.escape()];
        quoted.extend_from_slice(&newline);

        SpecialSets {
            unquoted: SpecialSet::new(&unquoted),
            quoted: SpecialSet::new(&quoted),
            comment: SpecialSet::new(&newline),
        }
    }

    fn largest(&self) -> usize {
        self.unquoted.len().max(self.quoted.len())
    }
}

/// Token matcher, special sets and scanner for one delimiter.
fn tokens(dialect: &Dialect) -> (TokenMatcher, SpecialSets, Scanner) {
    let matcher = TokenMatcher::new(
        dialect.delimiter().as_bytes(),
        Newlines::from_dialect(dialect.newline()),
        dialect.quote(),
        dialect.escape(),
        dialect.allow_comments().then_some(dialect.comment()),
    );
    let sets = SpecialSets::new(dialect, &matcher);
    let scanner = Scanner::select(dialect.scan_strategy(), sets.largest());
    (matcher, sets, scanner)
}

/// Streaming CSV reader over any byte source.
pub struct Reader<R> {
    rdr: Option<R>,
    dialect: Dialect,
    matcher: TokenMatcher,
    sets: SpecialSets,
    scanner: Scanner,
    buf: Buffer,
    builder: RecordBuilder,
    position: Position,
    breaks: LineBreaks,
    handler: Box<dyn BadDataHandler>,
    cache: Option<FieldCache>,
    detect_pending: bool,
}

impl<R: Read> Reader<R> {
    /// Reader with the default RFC4180 dialect.
    pub fn from_reader(rdr: R) -> Self {
        Self::with_dialect(rdr, Dialect::default())
    }

    pub fn with_dialect(rdr: R, dialect: Dialect) -> Self {
        let (matcher, sets, scanner) = tokens(&dialect);
        debug!(
            delimiter = dialect.delimiter(),
            mode = dialect.mode().name(),
            buffer_size = dialect.buffer_size(),
            scanner = scanner.name(),
            "reader created"
        );
        Reader {
            rdr: Some(rdr),
            matcher,
            sets,
            scanner,
            buf: Buffer::new(dialect.buffer_size()),
            builder: RecordBuilder::new(dialect.trim(), dialect.whitespace()),
            position: Position::default(),
            breaks: LineBreaks::default(),
            handler: Box::new(BadDataPolicy::Fail),
            cache: dialect.cache_fields().then(FieldCache::new),
            detect_pending: dialect.detect_delimiter(),
            dialect,
        }
    }

    /// Replace the bad-data callback. Returning an error from it fails the
    /// read; returning Ok keeps the raw text as the field value.
    pub fn on_bad_data<F>(&mut self, handler: F)
    where
        F: FnMut(&BadData<'_>) -> Result<()> + Send + 'static,
    {
        self.handler = Box::new(handler);
    }

    /// Use one of the stock bad-data handlers.
    pub fn bad_data_policy(&mut self, policy: BadDataPolicy) {
        self.handler = Box::new(policy);
    }

    /// Next record, or `None` at end of stream. The record borrows the
    /// reader and is invalidated by the next call.
    ///
    /// Counters advance before bad data is reported, so after a bad-data
    /// error the next call continues with the following record.
    pub fn read(&mut self) -> Result<Option<Record<'_>>> {
        if !self.advance()? {
            return Ok(None);
        }
        Ok(Some(self.builder.record(self.buf.data(), self.position)))
    }

    /// Next record copied out of the reader (values interned when field
    /// caching is enabled).
    pub fn read_owned(&mut self) -> Result<Option<OwnedRecord>> {
        if !self.advance()? {
            return Ok(None);
        }
        let record = self.builder.record(self.buf.data(), self.position);
        Ok(Some(record.to_owned_with(self.cache.as_mut())))
    }

    /// Iterate owned records. Iteration stops after a stream fault or
    /// invalid UTF-8; bad-data errors are yielded and iteration goes on.
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            reader: self,
            done: false,
        }
    }

    /// Counters after the most recently consumed line.
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn row(&self) -> u64 {
        self.position.row
    }

    pub fn raw_row(&self) -> u64 {
        self.position.raw_row
    }

    pub fn char_count(&self) -> u64 {
        self.position.char_count
    }

    pub fn byte_count(&self) -> u64 {
        self.position.byte_count
    }

    /// Active delimiter (the detected one once detection has run).
    pub fn delimiter(&self) -> &str {
        self.dialect.delimiter()
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn is_closed(&self) -> bool {
        self.rdr.is_none()
    }

    /// Release the underlying reader. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.rdr.take().is_some() {
            debug!(row = self.position.row, "reader closed");
        }
    }

    /// The underlying reader. Buffered, unparsed input is discarded.
    pub fn into_inner(mut self) -> Result<R> {
        self.rdr.take().ok_or(Error::Closed)
    }

    // ======================================================================
    // Record loop
    // ======================================================================

    /// Parse up to the next record, consuming skipped lines on the way.
    fn advance(&mut self) -> Result<bool> {
        if self.rdr.is_none() {
            return Err(Error::Closed);
        }
        if self.detect_pending {
            self.detect_pending = false;
            self.detect()?;
        }

        loop {
            let line = self.next_line()?;
            if line == Line::End {
                return Ok(false);
            }

            let raw = self.builder.raw(self.buf.data());
            let mut breaks = self.breaks.count;
            // A final line without terminator still counts
            if raw.len() > self.breaks.last_end {
                breaks += 1;
            }
            let text = std::str::from_utf8(raw).map_err(|e| Error::Utf8 {
                raw_row: self.position.raw_row + breaks,
                offset: self.position.offset + e.valid_up_to() as u64,
            })?;
            let count_bytes = self
                .dialect
                .count_bytes()
                .then(|| self.dialect.encoding());
            self.position.consume(text, count_bytes);
            self.position.raw_row += breaks;

            match line {
                Line::Skipped => {
                    if self.dialect.count_skipped_lines() {
                        self.position.row += 1;
                    }
                }
                _ => {
                    self.position.row += 1;
                    self.report_bad_data()?;
                    return Ok(true);
                }
            }
        }
    }

    fn report_bad_data(&mut self) -> Result<()> {
        let raw = self.builder.raw(self.buf.data());
        let raw_record = std::str::from_utf8(raw).unwrap_or_default();
        for (field_index, range) in self.builder.bad_fields() {
            let bad = BadData {
                field_index,
                field: raw_record.get(range).unwrap_or_default(),
                raw_record,
                row: self.position.row,
                raw_row: self.position.raw_row,
            };
            self.handler.handle(&bad)?;
        }
        Ok(())
    }

    fn detect(&mut self) -> Result<()> {
        self.fill(self.buf.capacity())?;
        let Some(found) = detect_delimiter(self.buf.available(), &self.dialect) else {
            debug!("no delimiter candidate found, keeping configured delimiter");
            return Ok(());
        };
        if found != self.dialect.delimiter() {
            let dialect = self.dialect.with_delimiter(&found)?;
            let (matcher, sets, scanner) = tokens(&dialect);
            self.matcher = matcher;
            self.sets = sets;
            self.scanner = scanner;
            self.dialect = dialect;
        }
        debug!(delimiter = %found, "delimiter detected");
        Ok(())
    }

    // ======================================================================
    // State machine
    // ======================================================================

    fn next_line(&mut self) -> Result<Line> {
        self.buf.mark = self.buf.pos;
        self.builder.clear();
        self.breaks = LineBreaks::default();

        let mut state = State::LineStart;
        loop {
            state = match state {
                State::LineStart => {
                    self.fill(1)?;
                    match self.peek() {
                        None => return Ok(Line::End),
                        Some(b) if self.matcher.comment == Some(b) => {
                            self.buf.pos += 1;
                            State::InComment
                        }
                        Some(_) => State::FieldStart,
                    }
                }
                State::FieldStart => self.field_start()?,
                State::InUnquotedField => self.unquoted_field()?,
                State::InQuotedField => self.quoted_field()?,
                State::QuoteInQuotedField => self.quote_in_quoted_field()?,
                State::AfterClosingQuote => self.after_closing_quote()?,
                State::InComment => {
                    self.comment_line()?;
                    self.complete();
                    return Ok(Line::Skipped);
                }
                State::RecordComplete => {
                    self.complete();
                    if self.builder.is_blank() && self.dialect.ignore_blank_lines() {
                        return Ok(Line::Skipped);
                    }
                    return Ok(Line::Record);
                }
            };
        }
    }

    fn field_start(&mut self) -> Result<State> {
        let raw_start = self.raw_offset();
        self.builder.open_field(raw_start, self.buf.pos);

        if self.dialect.trim().trim {
            loop {
                self.fill(1)?;
                match self.peek() {
                    Some(b) if self.dialect.is_whitespace(b) => {
                        self.builder.skip(self.buf.data(), self.buf.pos, 1);
                        self.buf.pos += 1;
                    }
                    _ => break,
                }
            }
        }

        self.fill(1)?;
        match self.peek() {
            None => {
                self.finish_field();
                Ok(State::RecordComplete)
            }
            Some(b) if self.dialect.mode() == Mode::Rfc4180 && b == self.matcher.quote => {
                self.builder.skip(self.buf.data(), self.buf.pos, 1);
                self.builder.set_quoted();
                self.buf.pos += 1;
                Ok(State::InQuotedField)
            }
            Some(_) => Ok(State::InUnquotedField),
        }
    }

    fn unquoted_field(&mut self) -> Result<State> {
        loop {
            let Some(b) = self.scan_to(Set::Unquoted)? else {
                self.finish_field();
                return Ok(State::RecordComplete);
            };

            if b == self.matcher.delimiter_first() {
                if let Some(n) = self.match_at(TokenKind::Delimiter, 0)? {
                    self.finish_field();
                    self.buf.pos += n;
                    return Ok(State::FieldStart);
                }
            }
            if self.matcher.is_newline_first(b) {
                if let Some(n) = self.match_at(TokenKind::Newline, 0)? {
                    self.finish_field();
                    self.count_break(0, n);
                    self.buf.pos += n;
                    return Ok(State::RecordComplete);
                }
            }
            match self.dialect.mode() {
                Mode::Rfc4180 if b == self.matcher.quote => self.builder.mark_bad(),
                Mode::Escape if b == self.matcher.escape => {
                    if self.escaped_token()? {
                        continue;
                    }
                }
                _ => {}
            }
            self.buf.pos += 1;
        }
    }

    /// Escape mode: the escape at the cursor makes a following delimiter,
    /// newline or escape literal. Returns false when it escapes nothing.
    fn escaped_token(&mut self) -> Result<bool> {
        self.fill(2)?;
        let Some(&next) = self.buf.available().get(1) else {
            return Ok(false);
        };

        let mut len = None;
        if next == self.matcher.escape {
            len = Some(1);
        }
        if len.is_none() && next == self.matcher.delimiter_first() {
            len = self.match_at(TokenKind::Delimiter, 1)?;
        }
        if len.is_none() && self.matcher.is_newline_first(next) {
            if let Some(n) = self.match_at(TokenKind::Newline, 1)? {
                self.count_break(1, n);
                len = Some(n);
            }
        }

        match len {
            Some(n) => {
                self.builder.skip(self.buf.data(), self.buf.pos, 1);
                self.buf.pos += 1 + n;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn quoted_field(&mut self) -> Result<State> {
        let quote = self.matcher.quote;
        let escape = self.matcher.escape;
        loop {
            let Some(b) = self.scan_to(Set::Quoted)? else {
                // Unterminated quoted field
                self.builder.mark_bad();
                self.finish_field();
                return Ok(State::RecordComplete);
            };

            if b == quote {
                if quote == escape {
                    return Ok(State::QuoteInQuotedField);
                }
                self.builder.close_content(self.buf.data(), self.buf.pos);
                self.buf.pos += 1;
                return Ok(State::AfterClosingQuote);
            }
            if b == escape {
                self.fill(2)?;
                match self.buf.available().get(1) {
                    Some(&next) if next == quote || next == escape => {
                        self.builder.skip(self.buf.data(), self.buf.pos, 1);
                        self.buf.pos += 2;
                    }
                    _ => self.buf.pos += 1,
                }
                continue;
            }
            if self.matcher.is_newline_first(b) {
                if let Some(n) = self.match_at(TokenKind::Newline, 0)? {
                    if self.dialect.line_break_in_quoted_field_is_bad_data() {
                        self.builder.mark_bad();
                    }
                    self.count_break(0, n);
                    self.buf.pos += n;
                    continue;
                }
            }
            self.buf.pos += 1;
        }
    }

    /// Doubled quote or closing quote (quote and escape are the same byte).
    fn quote_in_quoted_field(&mut self) -> Result<State> {
        self.fill(2)?;
        if self.buf.available().get(1) == Some(&self.matcher.quote) {
            self.builder.skip(self.buf.data(), self.buf.pos, 1);
            self.buf.pos += 2;
            return Ok(State::InQuotedField);
        }
        self.builder.close_content(self.buf.data(), self.buf.pos);
        self.buf.pos += 1;
        Ok(State::AfterClosingQuote)
    }

    fn after_closing_quote(&mut self) -> Result<State> {
        loop {
            self.fill(1)?;
            let Some(b) = self.peek() else {
                self.finish_field();
                return Ok(State::RecordComplete);
            };
            if b == self.matcher.delimiter_first() {
                if let Some(n) = self.match_at(TokenKind::Delimiter, 0)? {
                    self.finish_field();
                    self.buf.pos += n;
                    return Ok(State::FieldStart);
                }
            }
            if self.matcher.is_newline_first(b) {
                if let Some(n) = self.match_at(TokenKind::Newline, 0)? {
                    self.finish_field();
                    self.count_break(0, n);
                    self.buf.pos += n;
                    return Ok(State::RecordComplete);
                }
            }
            if self.dialect.trim().trim && self.dialect.is_whitespace(b) {
                self.buf.pos += 1;
                continue;
            }
            // Text after the closing quote: the rest of the field is unquoted
            self.builder.mark_bad();
            return Ok(State::InUnquotedField);
        }
    }

    fn comment_line(&mut self) -> Result<()> {
        loop {
            let Some(_) = self.scan_to(Set::Comment)? else {
                return Ok(());
            };
            if let Some(n) = self.match_at(TokenKind::Newline, 0)? {
                self.count_break(0, n);
                self.buf.pos += n;
                return Ok(());
            }
            self.buf.pos += 1;
        }
    }

    // ======================================================================
    // Buffer and token helpers
    // ======================================================================

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.buf.available().first().copied()
    }

    #[inline]
    fn raw_offset(&self) -> usize {
        self.builder.raw_offset(self.buf.mark, self.buf.pos)
    }

    /// Advance the cursor to the next byte of `set`, refilling as needed.
    /// Returns that byte (not consumed), or `None` at end of stream.
    fn scan_to(&mut self, set: Set) -> Result<Option<u8>> {
        loop {
            let special = match set {
                Set::Unquoted => &self.sets.unquoted,
                Set::Quoted => &self.sets.quoted,
                Set::Comment => &self.sets.comment,
            };
            let avail = self.buf.available();
            match self.scanner.find_next(avail, special) {
                Some(off) => {
                    let byte = avail[off];
                    self.buf.pos += off;
                    return Ok(Some(byte));
                }
                None => {
                    let len = avail.len();
                    self.buf.pos += len;
                    self.fill(1)?;
                    if self.buf.remaining() == 0 {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Match `kind` starting `offset` bytes past the cursor, refilling while
    /// the comparison is incomplete. Nothing is consumed.
    fn match_at(&mut self, kind: TokenKind, offset: usize) -> Result<Option<usize>> {
        let mut progress = PartialMatch::NoMatch;
        loop {
            let data = self.buf.available().get(offset..).unwrap_or_default();
            match self.matcher.try_match(kind, data, progress, self.buf.eof()) {
                MatchResult::Matched(n) => return Ok(Some(n)),
                MatchResult::NoMatch => return Ok(None),
                MatchResult::NeedMore(partial) => {
                    trace!(?kind, matched = partial.matched(), "token straddles buffer end");
                    progress = partial;
                    let want = self.buf.remaining() + 1;
                    self.fill(want)?;
                }
            }
        }
    }

    /// A terminator of `len` bytes starts `offset` bytes past the cursor.
    fn count_break(&mut self, offset: usize, len: usize) {
        self.breaks.count += 1;
        self.breaks.last_end = self.raw_offset() + offset + len;
    }

    fn finish_field(&mut self) {
        let raw_end = self.raw_offset();
        self.builder
            .finish_field(self.buf.data(), self.buf.pos, raw_end);
    }

    fn complete(&mut self) {
        self.builder
            .complete(self.buf.data(), self.buf.mark, self.buf.pos);
    }

    /// Make at least `want` bytes available past the cursor, unless the
    /// stream ends first. `want` never exceeds the buffer capacity.
    fn fill(&mut self, want: usize) -> Result<()> {
        while self.buf.remaining() < want && !self.buf.eof() {
            if self.buf.is_full() && self.buf.mark == 0 {
                // The record in progress fills the whole buffer
                self.builder
                    .spill(self.buf.data(), self.buf.mark, self.buf.pos);
                self.buf.mark = self.buf.pos;
                trace!(bytes = self.buf.pos, "record outgrew buffer, spilled");
            }
            let moved = self.buf.shift();
            if moved > 0 {
                self.builder.shift(moved);
            }
            let rdr = self.rdr.as_mut().ok_or(Error::Closed)?;
            let n = self.buf.fill_from(rdr)?;
            trace!(read = n, buffered = self.buf.filled(), "buffer refill");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Set {
    Unquoted,
    Quoted,
    Comment,
}

impl<R: Read + Seek> Reader<R> {
    /// Reposition to a snapshot taken from this stream with this dialect.
    /// Parsing continues with the record after the one that produced it.
    pub fn seek(&mut self, position: Position) -> Result<()> {
        let rdr = self.rdr.as_mut().ok_or(Error::Closed)?;
        rdr.seek(SeekFrom::Start(position.offset))?;
        self.buf.reset();
        self.builder.clear();
        self.position = position;
        debug!(
            offset = position.offset,
            row = position.row,
            raw_row = position.raw_row,
            "reader repositioned"
        );
        Ok(())
    }
}

impl<R> fmt::Debug for Reader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("dialect", &self.dialect)
            .field("scanner", &self.scanner.name())
            .field("position", &self.position)
            .field("closed", &self.rdr.is_none())
            .finish()
    }
}

/// Iterator over owned records, from `Reader::records`.
pub struct Records<'a, R> {
    reader: &'a mut Reader<R>,
    done: bool,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<OwnedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_owned() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                if !matches!(err, Error::BadData { .. }) {
                    self.done = true;
                }
                Some(Err(err))
            }
        }
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Newline, TrimOptions};
    use std::io::Cursor;

    fn parse_with(input: &str, dialect: Dialect) -> Vec<Vec<String>> {
        let mut rdr = Reader::with_dialect(input.as_bytes(), dialect);
        let mut rows = Vec::new();
        while let Some(record) = rdr.read().unwrap() {
            rows.push(record.iter().map(String::from).collect());
        }
        rows
    }

    fn parse(input: &str) -> Vec<Vec<String>> {
        parse_with(input, Dialect::default())
    }

    #[test]
    fn test_simple_records() {
        assert_eq!(parse("a,b\r\n1,2\n"), vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_doubled_quote() {
        assert_eq!(parse("1,\"two \"\" 2\",3"), vec![vec!["1", "two \" 2", "3"]]);
    }

    #[test]
    fn test_missing_trailing_newline() {
        let mut rdr = Reader::from_reader("one,two,three".as_bytes());
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.iter().collect::<Vec<_>>(), vec!["one", "two", "three"]);
        assert_eq!(record.raw_row(), 1);
        assert!(rdr.read().unwrap().is_none());
        assert!(rdr.read().unwrap().is_none());
    }

    #[test]
    fn test_multi_char_delimiter_small_buffer() {
        let dialect = Dialect::builder()
            .delimiter("|~|")
            .buffer_size(16)
            .build()
            .unwrap();
        assert_eq!(
            parse_with("12340000004321|~|2", dialect),
            vec![vec!["12340000004321", "2"]]
        );
    }

    #[test]
    fn test_embedded_newlines_raw_capture() {
        let input = "a,\"line1\nline2\nline3\",c\nx,y,z\n";
        let mut rdr = Reader::from_reader(input.as_bytes());
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.get(1), Some("line1\nline2\nline3"));
        assert_eq!(record.raw_row(), 3);
        assert_eq!(record.raw_record(), "a,\"line1\nline2\nline3\",c\n");
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.raw_row(), 4);
        assert_eq!(record.row(), 2);
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(parse("a\n\n\nb\n"), vec![vec!["a"], vec!["b"]]);
        let keep = Dialect::builder().ignore_blank_lines(false).build().unwrap();
        assert_eq!(
            parse_with("a\n\nb\n", keep),
            vec![vec!["a"], vec![""], vec!["b"]]
        );
        // A quoted empty field is not blank
        assert_eq!(parse("\"\"\nb\n"), vec![vec![""], vec!["b"]]);
    }

    #[test]
    fn test_skipped_lines_advance_raw_row_only() {
        let dialect = Dialect::builder().allow_comments(true).build().unwrap();
        let mut rdr = Reader::with_dialect("#note\n\na\n".as_bytes(), dialect);
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.get(0), Some("a"));
        assert_eq!(record.row(), 1);
        assert_eq!(record.raw_row(), 3);
        assert_eq!(record.char_count(), 9);
    }

    #[test]
    fn test_count_skipped_lines() {
        let dialect = Dialect::builder()
            .allow_comments(true)
            .count_skipped_lines(true)
            .build()
            .unwrap();
        let mut rdr = Reader::with_dialect("#note\na\n".as_bytes(), dialect);
        assert_eq!(rdr.read().unwrap().unwrap().row(), 2);
    }

    #[test]
    fn test_comment_char_mid_line_is_data() {
        let dialect = Dialect::builder().allow_comments(true).build().unwrap();
        assert_eq!(parse_with("a,#b\n", dialect), vec![vec!["a", "#b"]]);
    }

    #[test]
    fn test_quote_in_unquoted_field_is_bad_data() {
        let mut rdr = Reader::from_reader("a,b\"c,d\n".as_bytes());
        match rdr.read() {
            Err(Error::BadData {
                field_index, field, ..
            }) => {
                assert_eq!(field_index, 1);
                assert_eq!(field, "b\"c");
            }
            other => panic!("expected bad data, got {other:?}"),
        }
        // The next read continues after the bad record
        assert!(rdr.read().unwrap().is_none());
    }

    #[test]
    fn test_bad_data_lenient_uses_raw_text() {
        let mut rdr = Reader::from_reader("\"a\"x,b\n".as_bytes());
        rdr.bad_data_policy(BadDataPolicy::Ignore);
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.iter().collect::<Vec<_>>(), vec!["\"a\"x", "b"]);
    }

    #[test]
    fn test_bad_data_callback_sees_context() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut rdr = Reader::from_reader("x\n\"open,1\n".as_bytes());
        rdr.on_bad_data(move |bad| {
            sink.lock()
                .unwrap()
                .push((bad.row, bad.field_index, bad.raw_record.to_string()));
            Ok(())
        });
        while rdr.read().unwrap().is_some() {}
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(2, 0, "\"open,1\n".to_string())]);
    }

    #[test]
    fn test_escape_mode() {
        let dialect = Dialect::builder()
            .mode(Mode::Escape)
            .escape('\\')
            .build()
            .unwrap();
        assert_eq!(
            parse_with("a\\,b,c\\\\d,\"q\"\ne\\\nf,g\\x\n", dialect),
            vec![vec!["a,b", "c\\d", "\"q\""], vec!["e\nf", "g\\x"]]
        );
    }

    #[test]
    fn test_escaped_newline_counts_raw_row() {
        let dialect = Dialect::builder()
            .mode(Mode::Escape)
            .escape('\\')
            .build()
            .unwrap();
        let mut rdr = Reader::with_dialect("a\\\nb\nc\n".as_bytes(), dialect);
        assert_eq!(rdr.read().unwrap().unwrap().raw_row(), 2);
        assert_eq!(rdr.read().unwrap().unwrap().raw_row(), 3);
    }

    #[test]
    fn test_no_escape_mode() {
        let dialect = Dialect::builder().mode(Mode::NoEscape).build().unwrap();
        assert_eq!(
            parse_with("\"a,b\"\n", dialect),
            vec![vec!["\"a", "b\""]]
        );
    }

    #[test]
    fn test_rfc_with_distinct_escape() {
        let dialect = Dialect::builder().escape('\\').build().unwrap();
        assert_eq!(
            parse_with("\"a\\\"b\",\"c\\\\d\",\"e\\f\"\n", dialect),
            vec![vec!["a\"b", "c\\d", "e\\f"]]
        );
    }

    #[test]
    fn test_trim() {
        let dialect = Dialect::builder()
            .trim(TrimOptions {
                trim: true,
                inside_quotes: false,
            })
            .build()
            .unwrap();
        assert_eq!(
            parse_with("  a  , \" b \" ,c\n", dialect),
            vec![vec!["a", " b ", "c"]]
        );
        let inside = Dialect::builder()
            .trim(TrimOptions {
                trim: true,
                inside_quotes: true,
            })
            .build()
            .unwrap();
        assert_eq!(parse_with("\" b \"\n", inside), vec![vec!["b"]]);
    }

    #[test]
    fn test_whitespace_only_line_is_blank_when_trimming() {
        let dialect = Dialect::builder()
            .trim(TrimOptions {
                trim: true,
                inside_quotes: false,
            })
            .build()
            .unwrap();
        assert_eq!(parse_with("a\n   \nb\n", dialect), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_bare_cr_and_crlf_split_across_refills() {
        let dialect = Dialect::builder().buffer_size(3).build().unwrap();
        assert_eq!(
            parse_with("ab\r\ncd\ref\n", dialect),
            vec![vec!["ab"], vec!["cd"], vec!["ef"]]
        );
    }

    #[test]
    fn test_explicit_newline() {
        let dialect = Dialect::builder()
            .newline(Newline::Explicit("<br>".into()))
            .buffer_size(5)
            .build()
            .unwrap();
        assert_eq!(
            parse_with("a,b<br>c\nd<b<br>", dialect),
            vec![vec!["a", "b"], vec!["c\nd<b"]]
        );
    }

    #[test]
    fn test_long_field_spills() {
        let dialect = Dialect::builder().buffer_size(4).build().unwrap();
        let long = "x".repeat(100);
        let input = format!("{long},\"q\"\"{long}\"\nz\n");
        let rows = parse_with(&input, dialect);
        assert_eq!(rows[0][0], long);
        assert_eq!(rows[0][1], format!("q\"{long}"));
        assert_eq!(rows[1], vec!["z"]);
    }

    #[test]
    fn test_long_raw_record_after_spill() {
        let dialect = Dialect::builder().buffer_size(4).build().unwrap();
        let input = "abcdefgh,ijklmnop\nq\n";
        let mut rdr = Reader::with_dialect(input.as_bytes(), dialect);
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.raw_record(), "abcdefgh,ijklmnop\n");
        assert_eq!(record.char_count(), 18);
    }

    #[test]
    fn test_unterminated_quote_is_bad_data() {
        let mut rdr = Reader::from_reader("a,\"bc".as_bytes());
        assert!(matches!(rdr.read(), Err(Error::BadData { field_index: 1, .. })));
    }

    #[test]
    fn test_line_break_in_quoted_field_flag() {
        let dialect = Dialect::builder()
            .line_break_in_quoted_field_is_bad_data(true)
            .build()
            .unwrap();
        let mut rdr = Reader::with_dialect("\"a\nb\"\n".as_bytes(), dialect);
        assert!(matches!(rdr.read(), Err(Error::BadData { .. })));
    }

    #[test]
    fn test_invalid_utf8() {
        let input: &[u8] = b"ok\n\xff\xfe\n";
        let mut rdr = Reader::from_reader(input);
        assert!(rdr.read().unwrap().is_some());
        assert!(matches!(
            rdr.read(),
            Err(Error::Utf8 {
                raw_row: 2,
                offset: 3
            })
        ));
    }

    #[test]
    fn test_seek_resumes_after_record() {
        let input = "a,1\nb,\"2\n2\"\nc,3\n";
        let mut rdr = Reader::from_reader(Cursor::new(input.as_bytes().to_vec()));
        let first = rdr.read().unwrap().unwrap().position();
        let rest: Vec<_> = rdr.records().map(|r| r.unwrap().to_vec()).collect();

        rdr.seek(first).unwrap();
        let again: Vec<_> = rdr.records().map(|r| r.unwrap().to_vec()).collect();
        assert_eq!(rest, again);
        assert_eq!(rdr.row(), 3);
        assert_eq!(rdr.raw_row(), 4);
    }

    #[test]
    fn test_detect_delimiter() {
        let dialect = Dialect::builder().detect_delimiter(true).build().unwrap();
        let mut rdr = Reader::with_dialect("a;b\n1;2\n".as_bytes(), dialect);
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rdr.delimiter(), ";");
    }

    #[test]
    fn test_byte_count() {
        let dialect = Dialect::builder()
            .count_bytes(true)
            .encoding(crate::core::encoding::Encoding::Utf16Le)
            .build()
            .unwrap();
        let mut rdr = Reader::with_dialect("\u{e9},b\n".as_bytes(), dialect);
        let record = rdr.read().unwrap().unwrap();
        assert_eq!(record.char_count(), 4);
        assert_eq!(record.byte_count(), 8);
        assert_eq!(rdr.position().offset, 5);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut rdr = Reader::from_reader("a\n".as_bytes());
        rdr.close();
        rdr.close();
        assert!(rdr.is_closed());
        assert!(matches!(rdr.read(), Err(Error::Closed)));
        assert!(matches!(rdr.into_inner(), Err(Error::Closed)));
    }

    #[test]
    fn test_cached_owned_records_share_values() {
        let dialect = Dialect::builder().cache_fields(true).build().unwrap();
        let mut rdr = Reader::with_dialect("yes,no\nyes,no\n".as_bytes(), dialect);
        let a = rdr.read_owned().unwrap().unwrap();
        let b = rdr.read_owned().unwrap().unwrap();
        assert!(std::sync::Arc::ptr_eq(&a.fields()[0], &b.fields()[0]));
    }

    /// Yields its bytes, then fails every read after that.
    struct FailAfter(&'static [u8]);

    impl Read for FailAfter {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
            }
            let n = self.0.len().min(out.len());
            out[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_source_error_mid_record() {
        let mut rdr = Reader::from_reader(FailAfter(b"aaa"));
        match rdr.read() {
            Err(Error::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::Other);
                assert_eq!(err.to_string(), "boom");
            }
            Err(other) => panic!("expected an io error, got {other:?}"),
            Ok(record) => panic!("expected an io error, got {:?}", record.map(|r| r.len())),
        }
    }

    #[test]
    fn test_source_error_stops_records() {
        let mut rdr = Reader::from_reader(FailAfter(b"a,b"));
        let mut iter = rdr.records();
        assert!(matches!(iter.next(), Some(Err(Error::Io(_)))));
        assert!(iter.next().is_none());
    }
}
