// CSV encoding helpers: quoting decision and field escaping for the writer
//
// The writer asks two questions per field: "does this field need quoting?"
// and "what does its escaped text look like?". Both are pure functions of the
// field text, the dialect and whether the field opens its line.
//
// Scanning strategy: a field that holds none of the trigger bytes (quote,
// first byte of delimiter or newline) cannot need quoting, so the common case
// is one scanner pass. Only fields with a hit get the exact checks.

use std::borrow::Cow;

use memchr::memmem;

use crate::core::matcher::{match_sequence, MatchResult, PartialMatch};
use crate::core::newlines::Newlines;
use crate::core::scanner::{FindSpecial, Scanner, SpecialSet};
use crate::dialect::{Dialect, InjectionOptions, Mode, TrimOptions};
use crate::error::{ConfigError, Error, Result};

/// Field being decided on, as seen by a should-quote override.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub field: &'a str,
    /// Position within the record; 0 is the first field of the line.
    pub index: usize,
    /// Records completed before this one; 0 is the header row if any.
    pub row: u64,
}

/// Quoting and escaping rules of one dialect.
#[derive(Debug, Clone)]
pub struct FieldEncoder {
    mode: Mode,
    delimiter: Vec<u8>,
    newlines: Newlines,
    quote: u8,
    escape: u8,
    comment: u8,
    allow_comments: bool,
    trim: TrimOptions,
    whitespace: Vec<u8>,
    injection: InjectionOptions,
    injection_characters: Vec<char>,
    injection_escape: char,
    triggers: SpecialSet,
    scanner: Scanner,
}

impl FieldEncoder {
    pub fn new(dialect: &Dialect) -> Self {
        let newlines = Newlines::from_dialect(dialect.newline());
        let mut triggers = vec![dialect.quote(), dialect.delimiter().as_bytes()[0]];
        triggers.extend_from_slice(&newlines.first_bytes());
        let triggers = SpecialSet::new(&triggers);
        let scanner = Scanner::select(dialect.scan_strategy(), triggers.len());
        FieldEncoder {
            mode: dialect.mode(),
            delimiter: dialect.delimiter().as_bytes().to_vec(),
            newlines,
            quote: dialect.quote(),
            escape: dialect.escape(),
            comment: dialect.comment(),
            allow_comments: dialect.allow_comments(),
            trim: dialect.trim(),
            whitespace: dialect.whitespace().to_vec(),
            injection: dialect.injection(),
            injection_characters: dialect.injection_characters().to_vec(),
            injection_escape: dialect.injection_escape(),
            triggers,
            scanner,
        }
    }

    // ======================================================================
    // Injection sanitization
    // ======================================================================

    /// Neutralize a leading spreadsheet-formula character. Runs before the
    /// quoting decision, so an escaped field is quoted (or not) with its
    /// prefix in place.
    pub fn sanitize<'a>(&self, field: &'a str) -> Result<Cow<'a, str>> {
        let Some(first) = field.chars().next() else {
            return Ok(Cow::Borrowed(field));
        };
        if !self.injection_characters.contains(&first) {
            return Ok(Cow::Borrowed(field));
        }
        match self.injection {
            InjectionOptions::None => Ok(Cow::Borrowed(field)),
            InjectionOptions::Escape => {
                let mut escaped = String::with_capacity(field.len() + 1);
                escaped.push(self.injection_escape);
                escaped.push_str(field);
                Ok(Cow::Owned(escaped))
            }
            InjectionOptions::Strip => Ok(Cow::Borrowed(
                field.trim_start_matches(|c| self.injection_characters.contains(&c)),
            )),
            InjectionOptions::Exception => Err(Error::Injection {
                field: field.to_string(),
                character: first,
            }),
        }
    }

    // ======================================================================
    // Quoting decision
    // ======================================================================

    /// Default RFC4180 decision: quote when reading the field back unquoted
    /// would not reproduce it.
    pub fn should_quote(&self, field: &str, first_field: bool) -> bool {
        let bytes = field.as_bytes();
        let (Some(&head), Some(&tail)) = (bytes.first(), bytes.last()) else {
            return false;
        };
        if self.trim.trim && (self.is_whitespace(head) || self.is_whitespace(tail)) {
            return true;
        }
        if first_field && head == self.comment {
            return true;
        }
        if self.scanner.find_next(bytes, &self.triggers).is_none() {
            return false;
        }
        bytes.contains(&self.quote)
            || self.contains_newline(bytes)
            || memmem::find(bytes, &self.delimiter).is_some()
            || self.ends_ambiguously(bytes)
    }

    /// Errors for fields that would not read back as written: the
    /// escaping-free modes cannot carry delimiters, line terminators or a
    /// leading comment character, and trimming eats edge whitespace unless
    /// quoting protects it.
    pub fn check_representable(&self, field: &str, first_field: bool, quoted: bool) -> Result<()> {
        let bytes = field.as_bytes();
        let trimmed = if quoted {
            self.trim.inside_quotes
        } else {
            self.trim.trim
        };
        let reason = if trimmed
            && (bytes.first().is_some_and(|&b| self.is_whitespace(b))
                || bytes.last().is_some_and(|&b| self.is_whitespace(b)))
        {
            Some("leading or trailing whitespace would be trimmed")
        } else if self.mode == Mode::Rfc4180 {
            None
        } else if self.mode == Mode::NoEscape && memmem::find(bytes, &self.delimiter).is_some() {
            Some("field contains the delimiter")
        } else if self.mode == Mode::NoEscape && self.contains_newline(bytes) {
            Some("field contains a line terminator")
        } else if self.ends_ambiguously(bytes) {
            Some("field ends with the start of a delimiter or line terminator")
        } else if first_field && self.allow_comments && bytes.first() == Some(&self.comment) {
            Some("first field starts with the comment character")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigError::Unrepresentable {
                field: field.to_string(),
                mode: self.mode.name(),
                reason,
            }
            .into()),
            None => Ok(()),
        }
    }

    fn is_whitespace(&self, byte: u8) -> bool {
        self.whitespace.contains(&byte)
    }

    fn contains_newline(&self, bytes: &[u8]) -> bool {
        match &self.newlines {
            Newlines::Auto => memchr::memchr2(b'\r', b'\n', bytes).is_some(),
            Newlines::Exact(pattern) => memmem::find(bytes, pattern).is_some(),
        }
    }

    /// The field ends with a proper prefix of the delimiter (or explicit
    /// newline) such that the token written after it would be matched
    /// starting inside the field.
    fn ends_ambiguously(&self, bytes: &[u8]) -> bool {
        if ambiguous_tail(bytes, &self.delimiter) {
            return true;
        }
        match &self.newlines {
            Newlines::Auto => false,
            Newlines::Exact(pattern) => ambiguous_tail(bytes, pattern),
        }
    }

    // ======================================================================
    // Escaping
    // ======================================================================

    /// Append the escaped text of `field` to `out`.
    pub fn encode(&self, out: &mut String, field: &str, quote: bool) {
        match self.mode {
            Mode::Rfc4180 if quote => write_quoted_field(out, field, self.quote, self.escape),
            Mode::Rfc4180 | Mode::NoEscape => out.push_str(field),
            Mode::Escape => self.write_escaped_field(out, field),
        }
    }

    /// Escape mode: prefix the escape before every escape character,
    /// delimiter and line terminator.
    fn write_escaped_field(&self, out: &mut String, field: &str) {
        let bytes = field.as_bytes();
        let escape = self.escape;
        let mut run = 0;
        let mut i = 0;
        while i < bytes.len() {
            let rest = &bytes[i..];
            let token = if bytes[i] == escape {
                1
            } else if let MatchResult::Matched(n) =
                match_sequence(&self.delimiter, rest, PartialMatch::NoMatch, true)
            {
                n
            } else if let MatchResult::Matched(n) =
                self.newlines.try_match(rest, PartialMatch::NoMatch, true)
            {
                n
            } else {
                0
            };
            if token == 0 {
                i += 1;
                continue;
            }
            out.push_str(&field[run..i]);
            out.push(escape as char);
            out.push_str(&field[i..i + token]);
            i += token;
            run = i;
        }
        out.push_str(&field[run..]);
    }
}

/// Write a field that needs quoting: quote + field with escaped quotes + quote.
/// With quote == escape this is RFC 4180 quote doubling; otherwise the escape
/// also protects itself.
#[inline]
pub fn write_quoted_field(out: &mut String, field: &str, quote: u8, escape: u8) {
    out.push(quote as char);
    let mut run = 0;
    for (i, &b) in field.as_bytes().iter().enumerate() {
        if b == quote || b == escape {
            out.push_str(&field[run..i]);
            out.push(escape as char);
            run = i;
        }
    }
    out.push_str(&field[run..]);
    out.push(quote as char);
}

/// True if `field` ends with `token[..k]` for some `0 < k < token.len()`
/// where `token[k..] == token[..len - k]`, i.e. the field's tail followed by
/// the token contains a full token that starts inside the field.
fn ambiguous_tail(field: &[u8], token: &[u8]) -> bool {
    let len = token.len();
    (1..len).any(|k| token[k..] == token[..len - k] && field.ends_with(&token[..k]))
}

// ==========================================================================
// Tests
// ==========================================================================
