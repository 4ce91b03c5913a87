// Dialect: the immutable configuration consumed by readers and writers
//
// A Dialect only comes out of DialectBuilder::build(), which validates every
// marker once. Readers and writers never mutate it; delimiter detection builds
// a fresh copy with the detected delimiter after checking it the same way.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::encoding::Encoding;
use crate::error::ConfigError;

/// Default read buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Newline emitted by writers when the dialect newline is `Newline::Auto`.
pub const DEFAULT_WRITE_NEWLINE: &str = "\r\n";

/// Escaping discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Quoted fields with doubled (or escape-prefixed) quotes.
    #[default]
    Rfc4180,
    /// No quoting; an escape character makes the next delimiter, newline or
    /// escape literal.
    Escape,
    /// No quoting or escaping at all.
    NoEscape,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Rfc4180 => "RFC4180",
            Mode::Escape => "Escape",
            Mode::NoEscape => "NoEscape",
        }
    }
}

/// Record terminator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Newline {
    /// Accept `\r\n`, `\r` or `\n` on read; write `\r\n`.
    #[default]
    Auto,
    /// One exact sequence, used for both reading and writing.
    Explicit(String),
}

/// Whitespace trimming around field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrimOptions {
    /// Trim whitespace outside quotes.
    pub trim: bool,
    /// Trim whitespace inside quoted content.
    pub inside_quotes: bool,
}

/// What the writer does with fields that start with an injection character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InjectionOptions {
    #[default]
    None,
    /// Prefix the field with the injection escape character.
    Escape,
    /// Remove leading injection characters.
    Strip,
    /// Refuse to write the field.
    Exception,
}

/// Special-byte search implementation used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScanStrategy {
    /// Pick per session from the size of the special-byte set.
    #[default]
    Auto,
    Scalar,
    Swar,
    Memchr,
}

/// Injection characters used when none are configured.
pub const DEFAULT_INJECTION_CHARACTERS: [char; 4] = ['=', '@', '+', '-'];

/// Stricter injection set that also covers tab and carriage return.
pub const STRICT_INJECTION_CHARACTERS: [char; 6] = ['=', '@', '+', '-', '\t', '\r'];

/// Validated, immutable parse/write configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    delimiter: String,
    quote: u8,
    escape: u8,
    newline: Newline,
    comment: u8,
    allow_comments: bool,
    mode: Mode,
    trim: TrimOptions,
    whitespace: Vec<u8>,
    buffer_size: usize,
    ignore_blank_lines: bool,
    count_skipped_lines: bool,
    count_bytes: bool,
    encoding: Encoding,
    detect_delimiter: bool,
    detect_delimiter_values: Vec<String>,
    cache_fields: bool,
    line_break_in_quoted_field_is_bad_data: bool,
    quote_all: bool,
    quote_none: bool,
    injection: InjectionOptions,
    injection_characters: Vec<char>,
    injection_escape: char,
    scan_strategy: ScanStrategy,
}

impl Default for Dialect {
    fn default() -> Self {
        let b = DialectBuilder::new();
        Dialect {
            delimiter: b.delimiter,
            quote: b'"',
            escape: b'"',
            newline: b.newline,
            comment: b'#',
            allow_comments: b.allow_comments,
            mode: b.mode,
            trim: b.trim,
            whitespace: vec![b' '],
            buffer_size: b.buffer_size,
            ignore_blank_lines: b.ignore_blank_lines,
            count_skipped_lines: b.count_skipped_lines,
            count_bytes: b.count_bytes,
            encoding: b.encoding,
            detect_delimiter: b.detect_delimiter,
            detect_delimiter_values: b.detect_delimiter_values,
            cache_fields: b.cache_fields,
            line_break_in_quoted_field_is_bad_data: b.line_break_in_quoted_field_is_bad_data,
            quote_all: b.quote_all,
            quote_none: b.quote_none,
            injection: b.injection,
            injection_characters: b.injection_characters,
            injection_escape: b.injection_escape,
            scan_strategy: b.scan_strategy,
        }
    }
}

impl Dialect {
    pub fn builder() -> DialectBuilder {
        DialectBuilder::new()
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn quote(&self) -> u8 {
        self.quote
    }

    pub fn escape(&self) -> u8 {
        self.escape
    }

    pub fn newline(&self) -> &Newline {
        &self.newline
    }

    /// The terminator a writer emits.
    pub fn write_newline(&self) -> &str {
        match &self.newline {
            Newline::Auto => DEFAULT_WRITE_NEWLINE,
            Newline::Explicit(nl) => nl,
        }
    }

    pub fn comment(&self) -> u8 {
        self.comment
    }

    pub fn allow_comments(&self) -> bool {
        self.allow_comments
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn trim(&self) -> TrimOptions {
        self.trim
    }

    pub fn whitespace(&self) -> &[u8] {
        &self.whitespace
    }

    #[inline]
    pub fn is_whitespace(&self, byte: u8) -> bool {
        self.whitespace.contains(&byte)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn ignore_blank_lines(&self) -> bool {
        self.ignore_blank_lines
    }

    pub fn count_skipped_lines(&self) -> bool {
        self.count_skipped_lines
    }

    pub fn count_bytes(&self) -> bool {
        self.count_bytes
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn detect_delimiter(&self) -> bool {
        self.detect_delimiter
    }

    pub fn detect_delimiter_values(&self) -> &[String] {
        &self.detect_delimiter_values
    }

    pub fn cache_fields(&self) -> bool {
        self.cache_fields
    }

    pub fn line_break_in_quoted_field_is_bad_data(&self) -> bool {
        self.line_break_in_quoted_field_is_bad_data
    }

    pub fn quote_all(&self) -> bool {
        self.quote_all
    }

    pub fn quote_none(&self) -> bool {
        self.quote_none
    }

    pub fn injection(&self) -> InjectionOptions {
        self.injection
    }

    pub fn injection_characters(&self) -> &[char] {
        &self.injection_characters
    }

    pub fn injection_escape(&self) -> char {
        self.injection_escape
    }

    pub fn scan_strategy(&self) -> ScanStrategy {
        self.scan_strategy
    }

    /// Copy of this dialect with another delimiter, validated like the original.
    pub(crate) fn with_delimiter(&self, delimiter: &str) -> Result<Dialect, ConfigError> {
        validate_delimiter(
            delimiter,
            self.quote,
            self.escape,
            &self.newline,
            &self.whitespace,
            self.allow_comments.then_some(self.comment),
        )?;
        let mut dialect = self.clone();
        dialect.delimiter = delimiter.to_string();
        Ok(dialect)
    }

    /// Longest lookahead the reader needs past the current position.
    pub(crate) fn max_lookahead(&self) -> usize {
        let newline_len = match &self.newline {
            Newline::Auto => 2,
            Newline::Explicit(nl) => nl.len(),
        };
        let candidate_len = if self.detect_delimiter {
            self.detect_delimiter_values
                .iter()
                .map(|c| c.len())
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        // One extra byte for an escape or quote in front of the token.
        1 + self.delimiter.len().max(newline_len).max(candidate_len)
    }
}

/// Builder for `Dialect`. Every setter is unchecked; `build()` validates.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DialectBuilder {
    delimiter: String,
    quote: char,
    escape: char,
    newline: Newline,
    comment: char,
    allow_comments: bool,
    mode: Mode,
    trim: TrimOptions,
    whitespace: Vec<char>,
    buffer_size: usize,
    ignore_blank_lines: bool,
    count_skipped_lines: bool,
    count_bytes: bool,
    encoding: Encoding,
    detect_delimiter: bool,
    detect_delimiter_values: Vec<String>,
    cache_fields: bool,
    line_break_in_quoted_field_is_bad_data: bool,
    quote_all: bool,
    quote_none: bool,
    injection: InjectionOptions,
    injection_characters: Vec<char>,
    injection_escape: char,
    scan_strategy: ScanStrategy,
}

impl Default for DialectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectBuilder {
    pub fn new() -> Self {
        DialectBuilder {
            delimiter: ",".to_string(),
            quote: '"',
            escape: '"',
            newline: Newline::Auto,
            comment: '#',
            allow_comments: false,
            mode: Mode::Rfc4180,
            trim: TrimOptions::default(),
            whitespace: vec![' '],
            buffer_size: DEFAULT_BUFFER_SIZE,
            ignore_blank_lines: true,
            count_skipped_lines: false,
            count_bytes: false,
            encoding: Encoding::Utf8,
            detect_delimiter: false,
            detect_delimiter_values: vec![
                ",".to_string(),
                ";".to_string(),
                "|".to_string(),
                "\t".to_string(),
            ],
            cache_fields: false,
            line_break_in_quoted_field_is_bad_data: false,
            quote_all: false,
            quote_none: false,
            injection: InjectionOptions::None,
            injection_characters: DEFAULT_INJECTION_CHARACTERS.to_vec(),
            injection_escape: '\'',
            scan_strategy: ScanStrategy::Auto,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    pub fn escape(mut self, escape: char) -> Self {
        self.escape = escape;
        self
    }

    pub fn newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }

    pub fn comment(mut self, comment: char) -> Self {
        self.comment = comment;
        self
    }

    pub fn allow_comments(mut self, yes: bool) -> Self {
        self.allow_comments = yes;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn trim(mut self, trim: TrimOptions) -> Self {
        self.trim = trim;
        self
    }

    pub fn whitespace(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.whitespace = chars.into_iter().collect();
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn ignore_blank_lines(mut self, yes: bool) -> Self {
        self.ignore_blank_lines = yes;
        self
    }

    pub fn count_skipped_lines(mut self, yes: bool) -> Self {
        self.count_skipped_lines = yes;
        self
    }

    pub fn count_bytes(mut self, yes: bool) -> Self {
        self.count_bytes = yes;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn detect_delimiter(mut self, yes: bool) -> Self {
        self.detect_delimiter = yes;
        self
    }

    pub fn detect_delimiter_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detect_delimiter_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn cache_fields(mut self, yes: bool) -> Self {
        self.cache_fields = yes;
        self
    }

    pub fn line_break_in_quoted_field_is_bad_data(mut self, yes: bool) -> Self {
        self.line_break_in_quoted_field_is_bad_data = yes;
        self
    }

    pub fn quote_all(mut self, yes: bool) -> Self {
        self.quote_all = yes;
        self
    }

    pub fn quote_none(mut self, yes: bool) -> Self {
        self.quote_none = yes;
        self
    }

    pub fn injection(mut self, options: InjectionOptions) -> Self {
        self.injection = options;
        self
    }

    pub fn injection_characters(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.injection_characters = chars.into_iter().collect();
        self
    }

    pub fn injection_escape(mut self, escape: char) -> Self {
        self.injection_escape = escape;
        self
    }

    pub fn scan_strategy(mut self, strategy: ScanStrategy) -> Self {
        self.scan_strategy = strategy;
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Dialect, ConfigError> {
        let quote = ascii_marker(self.quote, "quote")?;
        let escape = ascii_marker(self.escape, "escape")?;
        let comment = ascii_marker(self.comment, "comment")?;
        let whitespace = self
            .whitespace
            .iter()
            .map(|&c| ascii_marker(c, "whitespace character"))
            .collect::<Result<Vec<u8>, _>>()?;

        match &self.newline {
            Newline::Auto => {
                for (name, byte) in [("quote", quote), ("escape", escape)] {
                    if byte == b'\r' || byte == b'\n' {
                        return Err(collision(name, "newline", byte as char));
                    }
                }
            }
            Newline::Explicit(nl) => {
                if nl.is_empty() {
                    return Err(ConfigError::EmptyNewline);
                }
                if nl.contains('\0') {
                    return Err(ConfigError::ReservedCharacter("newline"));
                }
                for (name, byte) in [("quote", quote), ("escape", escape)] {
                    if nl.as_bytes().contains(&byte) {
                        return Err(collision(name, "newline", byte as char));
                    }
                }
            }
        }

        let active_comment = self.allow_comments.then_some(comment);
        validate_delimiter(
            &self.delimiter,
            quote,
            escape,
            &self.newline,
            &whitespace,
            active_comment,
        )?;

        if self.detect_delimiter {
            if self.detect_delimiter_values.is_empty() {
                return Err(ConfigError::NoDelimiterCandidates);
            }
            for candidate in &self.detect_delimiter_values {
                validate_delimiter(
                    candidate,
                    quote,
                    escape,
                    &self.newline,
                    &whitespace,
                    active_comment,
                )?;
            }
        }

        for &ws in &whitespace {
            if ws == quote || ws == escape {
                return Err(collision("whitespace", "quote/escape", ws as char));
            }
            let in_newline = match &self.newline {
                Newline::Auto => ws == b'\r' || ws == b'\n',
                Newline::Explicit(nl) => nl.as_bytes().contains(&ws),
            };
            if in_newline {
                return Err(collision("whitespace", "newline", ws as char));
            }
        }

        if self.allow_comments {
            if comment == quote || comment == escape {
                return Err(collision("comment", "quote/escape", comment as char));
            }
            let newline_first = match &self.newline {
                Newline::Auto => comment == b'\r' || comment == b'\n',
                Newline::Explicit(nl) => nl.as_bytes()[0] == comment,
            };
            if newline_first {
                return Err(collision("comment", "newline", comment as char));
            }
        }

        if self.quote_all && self.quote_none {
            return Err(ConfigError::ConflictingQuoteToggles);
        }

        let dialect = Dialect {
            delimiter: self.delimiter,
            quote,
            escape,
            newline: self.newline,
            comment,
            allow_comments: self.allow_comments,
            mode: self.mode,
            trim: self.trim,
            whitespace,
            buffer_size: self.buffer_size,
            ignore_blank_lines: self.ignore_blank_lines,
            count_skipped_lines: self.count_skipped_lines,
            count_bytes: self.count_bytes,
            encoding: self.encoding,
            detect_delimiter: self.detect_delimiter,
            detect_delimiter_values: self.detect_delimiter_values,
            cache_fields: self.cache_fields,
            line_break_in_quoted_field_is_bad_data: self.line_break_in_quoted_field_is_bad_data,
            quote_all: self.quote_all,
            quote_none: self.quote_none,
            injection: self.injection,
            injection_characters: self.injection_characters,
            injection_escape: self.injection_escape,
            scan_strategy: self.scan_strategy,
        };

        let min = dialect.max_lookahead();
        if dialect.buffer_size < min {
            return Err(ConfigError::BufferTooSmall {
                size: dialect.buffer_size,
                min,
            });
        }

        Ok(dialect)
    }
}

impl TryFrom<DialectBuilder> for Dialect {
    type Error = ConfigError;

    fn try_from(builder: DialectBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

fn ascii_marker(c: char, name: &'static str) -> Result<u8, ConfigError> {
    if c == '\0' {
        return Err(ConfigError::ReservedCharacter(name));
    }
    if !c.is_ascii() {
        return Err(ConfigError::NotAscii(name));
    }
    Ok(c as u8)
}

fn collision(first: &'static str, second: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Collision {
        first,
        second,
        value: value.to_string(),
    }
}

fn validate_delimiter(
    delimiter: &str,
    quote: u8,
    escape: u8,
    newline: &Newline,
    whitespace: &[u8],
    comment: Option<u8>,
) -> Result<(), ConfigError> {
    if delimiter.is_empty() {
        return Err(ConfigError::EmptyDelimiter);
    }
    if delimiter.contains('\0') {
        return Err(ConfigError::ReservedCharacter("delimiter"));
    }
    let bytes = delimiter.as_bytes();
    if bytes.contains(&quote) {
        return Err(collision("delimiter", "quote", delimiter));
    }
    if bytes.contains(&escape) {
        return Err(collision("delimiter", "escape", delimiter));
    }
    match newline {
        Newline::Auto => {
            if bytes.contains(&b'\r') || bytes.contains(&b'\n') {
                return Err(collision("delimiter", "newline", delimiter));
            }
        }
        Newline::Explicit(nl) => {
            if nl.starts_with(delimiter) || delimiter.starts_with(nl.as_str()) {
                return Err(collision("delimiter", "newline", delimiter));
            }
        }
    }
    if whitespace.contains(&bytes[0]) || whitespace.contains(&bytes[bytes.len() - 1]) {
        return Err(collision("delimiter", "whitespace", delimiter));
    }
    // A line opening with an empty field would read as a comment
    if comment == Some(bytes[0]) {
        return Err(collision("comment", "delimiter", bytes[0] as char));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dialect_matches_builder() {
        assert_eq!(Dialect::default(), DialectBuilder::new().build().unwrap());
    }

    #[test]
    fn test_quote_and_escape_may_be_equal() {
        let d = Dialect::builder().quote('"').escape('"').build().unwrap();
        assert_eq!(d.quote(), d.escape());
    }

    #[test]
    fn test_empty_delimiter_rejected() {
        assert_eq!(
            Dialect::builder().delimiter("").build(),
            Err(ConfigError::EmptyDelimiter)
        );
    }

    #[test]
    fn test_delimiter_collisions() {
        assert!(matches!(
            Dialect::builder().delimiter("\"").build(),
            Err(ConfigError::Collision { first: "delimiter", second: "quote", .. })
        ));
        assert!(matches!(
            Dialect::builder().mode(Mode::Escape).escape('\\').delimiter("a\\").build(),
            Err(ConfigError::Collision { first: "delimiter", second: "escape", .. })
        ));
        assert!(matches!(
            Dialect::builder().delimiter(";\n").build(),
            Err(ConfigError::Collision { first: "delimiter", second: "newline", .. })
        ));
        // Explicit newline that is a prefix of the delimiter
        assert!(matches!(
            Dialect::builder()
                .newline(Newline::Explicit("|".into()))
                .delimiter("|~|")
                .build(),
            Err(ConfigError::Collision { first: "delimiter", second: "newline", .. })
        ));
    }

    #[test]
    fn test_reserved_and_non_ascii_markers() {
        assert_eq!(
            Dialect::builder().quote('\0').build(),
            Err(ConfigError::ReservedCharacter("quote"))
        );
        assert_eq!(
            Dialect::builder().delimiter("a\0").build(),
            Err(ConfigError::ReservedCharacter("delimiter"))
        );
        assert_eq!(
            Dialect::builder().escape('\u{e9}').build(),
            Err(ConfigError::NotAscii("escape"))
        );
    }

    #[test]
    fn test_multi_byte_delimiter_is_fine() {
        let d = Dialect::builder().delimiter("\u{2502}").build().unwrap();
        assert_eq!(d.delimiter().len(), 3);
    }

    #[test]
    fn test_buffer_size_minimum() {
        assert_eq!(
            Dialect::builder().buffer_size(0).build(),
            Err(ConfigError::BufferTooSmall { size: 0, min: 3 })
        );
        assert_eq!(
            Dialect::builder().delimiter("|~|").buffer_size(3).build(),
            Err(ConfigError::BufferTooSmall { size: 3, min: 4 })
        );
        assert!(Dialect::builder().delimiter("|~|").buffer_size(4).build().is_ok());
    }

    #[test]
    fn test_conflicting_quote_toggles() {
        assert_eq!(
            Dialect::builder().quote_all(true).quote_none(true).build(),
            Err(ConfigError::ConflictingQuoteToggles)
        );
    }

    #[test]
    fn test_comment_collisions_only_when_enabled() {
        assert!(Dialect::builder().comment(',').build().is_ok());
        assert!(matches!(
            Dialect::builder().comment(',').allow_comments(true).build(),
            Err(ConfigError::Collision { first: "comment", .. })
        ));
    }

    #[test]
    fn test_whitespace_collisions() {
        assert!(matches!(
            Dialect::builder().whitespace(['\t']).delimiter("\t").build(),
            Err(ConfigError::Collision { first: "delimiter", second: "whitespace", .. })
        ));
        assert!(matches!(
            Dialect::builder().whitespace(['\n']).build(),
            Err(ConfigError::Collision { first: "whitespace", second: "newline", .. })
        ));
    }

    #[test]
    fn test_detect_candidates_validated() {
        assert_eq!(
            Dialect::builder()
                .detect_delimiter(true)
                .detect_delimiter_values(Vec::<String>::new())
                .build(),
            Err(ConfigError::NoDelimiterCandidates)
        );
        assert!(Dialect::builder()
            .detect_delimiter(true)
            .detect_delimiter_values([",", "\""])
            .build()
            .is_err());
    }

    #[test]
    fn test_detect_candidate_equal_to_comment_rejected() {
        assert!(matches!(
            Dialect::builder()
                .allow_comments(true)
                .comment(';')
                .detect_delimiter(true)
                .detect_delimiter_values([",", ";"])
                .build(),
            Err(ConfigError::Collision { first: "comment", second: "delimiter", .. })
        ));
        // Without comments the same candidate is fine
        assert!(Dialect::builder()
            .comment(';')
            .detect_delimiter(true)
            .detect_delimiter_values([",", ";"])
            .build()
            .is_ok());
    }

    #[test]
    fn test_with_delimiter_checks_comment() {
        let d = Dialect::builder().allow_comments(true).build().unwrap();
        assert!(matches!(
            d.with_delimiter("#"),
            Err(ConfigError::Collision { first: "comment", second: "delimiter", .. })
        ));
        assert!(d.with_delimiter("#!").is_err());
        assert_eq!(d.with_delimiter("!#").unwrap().delimiter(), "!#");
    }

    #[test]
    fn test_with_delimiter_revalidates() {
        let d = Dialect::default();
        assert_eq!(d.with_delimiter(";").unwrap().delimiter(), ";");
        assert!(d.with_delimiter("\"").is_err());
    }

    #[test]
    fn test_write_newline() {
        assert_eq!(Dialect::default().write_newline(), "\r\n");
        let d = Dialect::builder()
            .newline(Newline::Explicit("\n".into()))
            .build()
            .unwrap();
        assert_eq!(d.write_newline(), "\n");
    }

    #[test]
    fn test_try_from_builder() {
        let d = Dialect::try_from(DialectBuilder::new().delimiter(";")).unwrap();
        assert_eq!(d.delimiter(), ";");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_builder_from_json() {
        let json = r#"{"delimiter": "|~|", "mode": "Escape", "escape": "\\", "buffer_size": 64}"#;
        let builder: DialectBuilder = serde_json::from_str(json).unwrap();
        let d = builder.build().unwrap();
        assert_eq!(d.delimiter(), "|~|");
        assert_eq!(d.mode(), Mode::Escape);
        assert_eq!(d.escape(), b'\\');
        assert_eq!(d.buffer_size(), 64);
        // Unlisted fields keep their defaults
        assert_eq!(d.quote(), b'"');
        assert!(d.ignore_blank_lines());
    }
}
