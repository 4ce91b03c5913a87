// Bad-data reporting
//
// Malformed fields are collected while a record is parsed and reported once
// the record is complete, so the handler sees the whole raw record. The
// handler decides: returning an error fails the read, returning Ok keeps the
// field (its value is the raw text) and parsing continues.

use tracing::warn;

use crate::error::{Error, Result};

/// Context handed to a bad-data handler.
#[derive(Debug, Clone, Copy)]
pub struct BadData<'a> {
    /// Index of the offending field within its record.
    pub field_index: usize,
    /// Raw text of the field as it appeared in the input.
    pub field: &'a str,
    /// Raw text of the whole record, terminator included.
    pub raw_record: &'a str,
    pub row: u64,
    pub raw_row: u64,
}

impl BadData<'_> {
    pub fn to_error(&self) -> Error {
        Error::BadData {
            row: self.row,
            raw_row: self.raw_row,
            field_index: self.field_index,
            field: self.field.to_string(),
            raw_record: self.raw_record.to_string(),
        }
    }
}

/// Callback invoked for every bad field.
pub trait BadDataHandler: Send {
    fn handle(&mut self, bad: &BadData<'_>) -> Result<()>;
}

impl<F> BadDataHandler for F
where
    F: FnMut(&BadData<'_>) -> Result<()> + Send,
{
    fn handle(&mut self, bad: &BadData<'_>) -> Result<()> {
        self(bad)
    }
}

/// Stock handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadDataPolicy {
    /// Fail the read with `Error::BadData`.
    #[default]
    Fail,
    /// Log through `tracing` and keep going.
    Warn,
    /// Keep going silently.
    Ignore,
}

impl BadDataHandler for BadDataPolicy {
    fn handle(&mut self, bad: &BadData<'_>) -> Result<()> {
        match self {
            BadDataPolicy::Fail => Err(bad.to_error()),
            BadDataPolicy::Warn => {
                warn!(
                    row = bad.row,
                    raw_row = bad.raw_row,
                    field_index = bad.field_index,
                    field = bad.field,
                    "bad data"
                );
                Ok(())
            }
            BadDataPolicy::Ignore => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BadData<'static> {
        BadData {
            field_index: 1,
            field: "b\"c",
            raw_record: "a,b\"c\n",
            row: 1,
            raw_row: 1,
        }
    }

    #[test]
    fn test_fail_policy_builds_error() {
        let err = BadDataPolicy::Fail.handle(&sample()).unwrap_err();
        assert!(matches!(err, Error::BadData { field_index: 1, .. }));
    }

    #[test]
    fn test_lenient_policies() {
        assert!(BadDataPolicy::Warn.handle(&sample()).is_ok());
        assert!(BadDataPolicy::Ignore.handle(&sample()).is_ok());
    }

    fn collect_into(
        seen: &mut Vec<String>,
    ) -> impl FnMut(&BadData<'_>) -> Result<()> + Send + '_ {
        move |bad| {
            seen.push(bad.field.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = Vec::new();
        let mut handler = collect_into(&mut seen);
        handler.handle(&sample()).unwrap();
        drop(handler);
        assert_eq!(seen, vec!["b\"c"]);
    }
}
