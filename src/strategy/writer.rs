// Streaming writer
//
// Fields are sanitized, checked, escaped and transcoded into an output buffer
// that is handed to the underlying `Write` in chunks. The quoting decision
// follows a fixed order: force flag, quote_all/quote_none, the caller's
// override, then the dialect default.

use std::fmt;
use std::io::Write;

use tracing::debug;

use super::encode::{FieldContext, FieldEncoder};
use crate::dialect::{Dialect, Mode};
use crate::error::{Error, Result};

/// Output is passed on to the underlying writer once this much is buffered.
const WRITE_CHUNK: usize = 8 * 1024;

type ShouldQuote = Box<dyn FnMut(&FieldContext<'_>) -> bool + Send>;

/// Streaming CSV writer over any byte sink.
pub struct Writer<W: Write> {
    wtr: Option<W>,
    dialect: Dialect,
    encoder: FieldEncoder,
    should_quote: Option<ShouldQuote>,
    /// Encoded bytes not yet handed to `wtr`.
    out: Vec<u8>,
    /// Escaped text of the field being written.
    scratch: String,
    field_index: usize,
    /// The record so far is a single unquoted empty field.
    lone_empty: bool,
    row: u64,
}

impl<W: Write> Writer<W> {
    /// Writer with the default RFC4180 dialect.
    pub fn from_writer(wtr: W) -> Self {
        Self::with_dialect(wtr, Dialect::default())
    }

    pub fn with_dialect(wtr: W, dialect: Dialect) -> Self {
        debug!(
            delimiter = dialect.delimiter(),
            mode = dialect.mode().name(),
            encoding = ?dialect.encoding(),
            "writer created"
        );
        Writer {
            wtr: Some(wtr),
            encoder: FieldEncoder::new(&dialect),
            dialect,
            should_quote: None,
            out: Vec::with_capacity(WRITE_CHUNK),
            scratch: String::new(),
            field_index: 0,
            lone_empty: false,
            row: 0,
        }
    }

    /// Replace the default quoting decision (RFC4180 only). The predicate
    /// sees the sanitized field.
    pub fn set_should_quote<F>(&mut self, predicate: F)
    where
        F: FnMut(&FieldContext<'_>) -> bool + Send + 'static,
    {
        self.should_quote = Some(Box::new(predicate));
    }

    /// Append a field to the current record.
    pub fn write_field(&mut self, field: &str) -> Result<()> {
        self.write_field_quoted(field, false)
    }

    /// Append a field, quoting it regardless of content when `force_quote`
    /// is set. Forcing has no effect outside RFC4180 mode.
    pub fn write_field_quoted(&mut self, field: &str, force_quote: bool) -> Result<()> {
        if self.wtr.is_none() {
            return Err(Error::Closed);
        }
        let field = self.encoder.sanitize(field)?;
        let first = self.field_index == 0;
        let quote = self.decide_quote(&field, force_quote);
        self.encoder.check_representable(&field, first, quote)?;

        self.scratch.clear();
        if !first {
            self.scratch.push_str(self.dialect.delimiter());
        }
        self.encoder.encode(&mut self.scratch, &field, quote);
        self.dialect.encoding().encode_into(&self.scratch, &mut self.out);

        self.lone_empty = first && field.is_empty() && !quote;
        self.field_index += 1;
        Ok(())
    }

    fn decide_quote(&mut self, field: &str, force_quote: bool) -> bool {
        if self.dialect.mode() != Mode::Rfc4180 {
            return false;
        }
        if force_quote || self.dialect.quote_all() {
            return true;
        }
        if self.dialect.quote_none() {
            return false;
        }
        let first = self.field_index == 0;
        match self.should_quote.as_mut() {
            Some(predicate) => predicate(&FieldContext {
                field,
                index: self.field_index,
                row: self.row,
            }),
            None => self.encoder.should_quote(field, first),
        }
    }

    /// Write every field of `record` and end the record.
    pub fn write_record<I, S>(&mut self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in record {
            self.write_field(field.as_ref())?;
        }
        self.next_record()
    }

    /// End the current record with the dialect's line terminator.
    pub fn next_record(&mut self) -> Result<()> {
        if self.wtr.is_none() {
            return Err(Error::Closed);
        }
        let encoding = self.dialect.encoding();
        // An empty line would read back as a blank line, not an empty field
        if self.lone_empty
            && self.field_index == 1
            && self.dialect.mode() == Mode::Rfc4180
            && !self.dialect.quote_none()
        {
            let quote = char::from(self.dialect.quote());
            self.scratch.clear();
            self.scratch.push(quote);
            self.scratch.push(quote);
            encoding.encode_into(&self.scratch, &mut self.out);
        }
        encoding.encode_into(self.dialect.write_newline(), &mut self.out);
        self.field_index = 0;
        self.lone_empty = false;
        self.row += 1;
        if self.out.len() >= WRITE_CHUNK {
            self.drain()?;
        }
        Ok(())
    }

    /// Records ended so far.
    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn is_closed(&self) -> bool {
        self.wtr.is_none()
    }

    /// Hand buffered output to the underlying writer and flush it.
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;
        match self.wtr.as_mut() {
            Some(wtr) => Ok(wtr.flush()?),
            None => Err(Error::Closed),
        }
    }

    /// Flush and release the underlying writer. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.wtr.is_none() {
            return Ok(());
        }
        self.flush()?;
        self.wtr = None;
        debug!(rows = self.row, "writer closed");
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        self.wtr.take().ok_or(Error::Closed)
    }

    fn drain(&mut self) -> Result<()> {
        let wtr = self.wtr.as_mut().ok_or(Error::Closed)?;
        if !self.out.is_empty() {
            wtr.write_all(&self.out)?;
            self.out.clear();
        }
        Ok(())
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.wtr.is_some() {
            let _ = self.flush();
        }
    }
}

impl<W: Write> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("dialect", &self.dialect)
            .field("row", &self.row)
            .field("buffered", &self.out.len())
            .field("closed", &self.wtr.is_none())
            .finish()
    }
}

// ==========================================================================
// Tests
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoding::Encoding;
    use crate::dialect::{InjectionOptions, Newline};
    use crate::error::ConfigError;

    fn write_all(dialect: Dialect, records: &[&[&str]]) -> String {
        let mut wtr = Writer::with_dialect(Vec::new(), dialect);
        for record in records {
            wtr.write_record(record.iter()).unwrap();
        }
        String::from_utf8(wtr.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_plain_records() {
        let out = write_all(Dialect::default(), &[&["a", "b"], &["1", "2"]]);
        assert_eq!(out, "a,b\r\n1,2\r\n");
    }

    #[test]
    fn test_quotes_when_needed() {
        let out = write_all(Dialect::default(), &[&["a,b", "say \"hi\"", "x\ny", "plain"]]);
        assert_eq!(out, "\"a,b\",\"say \"\"hi\"\"\",\"x\ny\",plain\r\n");
    }

    #[test]
    fn test_lone_empty_field_is_quoted() {
        let out = write_all(Dialect::default(), &[&[""], &["", ""]]);
        assert_eq!(out, "\"\"\r\n,\r\n");
    }

    #[test]
    fn test_comment_char_in_first_field() {
        let out = write_all(Dialect::default(), &[&["#a", "#b"]]);
        assert_eq!(out, "\"#a\",#b\r\n");
    }

    #[test]
    fn test_quote_all_and_force() {
        let dialect = Dialect::builder().quote_all(true).build().unwrap();
        assert_eq!(write_all(dialect, &[&["a", ""]]), "\"a\",\"\"\r\n");

        let mut wtr = Writer::from_writer(Vec::new());
        wtr.write_field("a").unwrap();
        wtr.write_field_quoted("b", true).unwrap();
        wtr.next_record().unwrap();
        assert_eq!(wtr.into_inner().unwrap(), b"a,\"b\"\r\n");
    }

    #[test]
    fn test_quote_none() {
        let dialect = Dialect::builder().quote_none(true).build().unwrap();
        assert_eq!(write_all(dialect, &[&["#a", "c"]]), "#a,c\r\n");
    }

    #[test]
    fn test_should_quote_override() {
        let mut wtr = Writer::from_writer(Vec::new());
        wtr.set_should_quote(|ctx| ctx.row == 0 || ctx.index == 1);
        wtr.write_record(["h1", "h2"]).unwrap();
        wtr.write_record(["a", "b"]).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(out, "\"h1\",\"h2\"\r\na,\"b\"\r\n");
    }

    #[test]
    fn test_escape_mode() {
        let dialect = Dialect::builder()
            .mode(Mode::Escape)
            .escape('\\')
            .build()
            .unwrap();
        assert_eq!(write_all(dialect, &[&["a,b", "c\\d", "\"q\""]]), "a\\,b,c\\\\d,\"q\"\r\n");
    }

    #[test]
    fn test_no_escape_rejects_delimiter() {
        let dialect = Dialect::builder().mode(Mode::NoEscape).build().unwrap();
        let mut wtr = Writer::with_dialect(Vec::new(), dialect);
        wtr.write_field("ok").unwrap();
        let err = wtr.write_field("a,b").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn test_injection_escape_prefix() {
        let dialect = Dialect::builder()
            .injection(InjectionOptions::Escape)
            .injection_escape('\t')
            .build()
            .unwrap();
        assert_eq!(write_all(dialect, &[&["=one", "two"]]), "\t=one,two\r\n");
    }

    #[test]
    fn test_injection_exception() {
        let dialect = Dialect::builder()
            .injection(InjectionOptions::Exception)
            .build()
            .unwrap();
        let mut wtr = Writer::with_dialect(Vec::new(), dialect);
        assert!(matches!(
            wtr.write_field("@cmd"),
            Err(Error::Injection { character: '@', .. })
        ));
    }

    #[test]
    fn test_explicit_newline_and_multi_char_delimiter() {
        let dialect = Dialect::builder()
            .delimiter("::")
            .newline(Newline::Explicit("\n".into()))
            .build()
            .unwrap();
        assert_eq!(write_all(dialect, &[&["a", "b:c", "d::e"]]), "a::b:c::\"d::e\"\n");
    }

    #[test]
    fn test_utf16_output() {
        let dialect = Dialect::builder()
            .encoding(Encoding::Utf16Le)
            .build()
            .unwrap();
        let out = {
            let mut wtr = Writer::with_dialect(Vec::new(), dialect);
            wtr.write_record(["é"]).unwrap();
            wtr.into_inner().unwrap()
        };
        assert_eq!(out, vec![0xE9, 0x00, b'\r', 0x00, b'\n', 0x00]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut wtr = Writer::from_writer(Vec::new());
        wtr.write_record(["a"]).unwrap();
        wtr.close().unwrap();
        wtr.close().unwrap();
        assert!(wtr.is_closed());
        assert!(matches!(wtr.write_field("b"), Err(Error::Closed)));
        assert!(matches!(wtr.next_record(), Err(Error::Closed)));
    }

    #[test]
    fn test_large_output_is_chunked() {
        let mut wtr = Writer::from_writer(Vec::new());
        let field = "x".repeat(1000);
        for _ in 0..20 {
            wtr.write_record([field.as_str()]).unwrap();
        }
        assert!(wtr.out.len() < WRITE_CHUNK);
        let out = wtr.into_inner().unwrap();
        assert_eq!(out.len(), 20 * 1002);
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_on_flush() {
        let mut wtr = Writer::from_writer(FailingSink);
        wtr.write_record(["a", "b"]).unwrap();
        match wtr.flush() {
            Err(Error::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("expected an io error, got {other:?}"),
        }
        assert!(!wtr.is_closed());
    }

    #[test]
    fn test_sink_error_on_next_record() {
        let mut wtr = Writer::from_writer(FailingSink);
        let long = "x".repeat(WRITE_CHUNK);
        wtr.write_field(&long).unwrap();
        assert!(matches!(wtr.next_record(), Err(Error::Io(_))));
    }
}
