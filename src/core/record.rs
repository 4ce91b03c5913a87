// Record assembly
//
// Fields are recorded as ranges, not copied:
//   Span  - an unmodified run of the read buffer (common case, zero-copy)
//   Owned - content materialized into the builder's accumulator, because an
//           escape or doubled quote was dropped from the middle of it or the
//           record outgrew the buffer and had to be spilled
//   Raw   - a range of the raw record text (fields flagged as bad data)
//
// The builder is cleared, not reallocated, between records. A `Record` is a
// borrowed view over the builder and the buffer; it lives until the next read.

use std::fmt;
use std::sync::Arc;

use super::cache::FieldCache;
use super::counters::Position;
use crate::dialect::TrimOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSlot {
    Span { start: usize, end: usize },
    Owned { start: usize, end: usize },
    Raw { start: usize, end: usize },
}

#[derive(Debug, Clone, Copy)]
struct FieldEntry {
    slot: FieldSlot,
    /// Field text range within the raw record (delimiter excluded).
    raw_start: usize,
    raw_end: usize,
    quoted: bool,
    bad: bool,
}

/// The field currently being parsed.
#[derive(Debug, Clone, Copy)]
struct OpenField {
    raw_start: usize,
    /// Buffer offset where the not-yet-copied content run begins.
    run_start: usize,
    /// Part of the content already lives in `scratch`.
    owned: bool,
    quoted: bool,
    bad: bool,
    /// Quoted content that ended at its closing quote.
    closed: Option<FieldSlot>,
}

#[derive(Debug, Clone, Copy)]
enum RawLoc {
    Buffer { start: usize, end: usize },
    Accumulated,
}

#[derive(Debug)]
pub(crate) struct RecordBuilder {
    fields: Vec<FieldEntry>,
    open: Option<OpenField>,
    scratch: Vec<u8>,
    acc: Vec<u8>,
    raw_acc: Vec<u8>,
    raw: RawLoc,
    trim: TrimOptions,
    whitespace: Vec<u8>,
}

impl RecordBuilder {
    pub fn new(trim: TrimOptions, whitespace: &[u8]) -> Self {
        RecordBuilder {
            fields: Vec::with_capacity(16),
            open: None,
            scratch: Vec::new(),
            acc: Vec::new(),
            raw_acc: Vec::new(),
            raw: RawLoc::Buffer { start: 0, end: 0 },
            trim,
            whitespace: whitespace.to_vec(),
        }
    }

    /// Reset for the next record, keeping capacity.
    pub fn clear(&mut self) {
        self.fields.clear();
        self.open = None;
        self.scratch.clear();
        self.acc.clear();
        self.raw_acc.clear();
        self.raw = RawLoc::Buffer { start: 0, end: 0 };
    }

    /// Offset of buffer position `pos` within the raw record.
    #[inline]
    pub fn raw_offset(&self, mark: usize, pos: usize) -> usize {
        self.raw_acc.len() + (pos - mark)
    }

    pub fn open_field(&mut self, raw_start: usize, content_start: usize) {
        self.scratch.clear();
        self.open = Some(OpenField {
            raw_start,
            run_start: content_start,
            owned: false,
            quoted: false,
            bad: false,
            closed: None,
        });
    }

    /// Drop `len` bytes at buffer offset `at` from the open field's content.
    pub fn skip(&mut self, buf: &[u8], at: usize, len: usize) {
        let Some(field) = self.open.as_mut() else {
            return;
        };
        if !field.owned && at == field.run_start {
            field.run_start = at + len;
            return;
        }
        field.owned = true;
        self.scratch.extend_from_slice(&buf[field.run_start..at]);
        field.run_start = at + len;
    }

    pub fn set_quoted(&mut self) {
        if let Some(field) = self.open.as_mut() {
            field.quoted = true;
        }
    }

    pub fn mark_bad(&mut self) {
        if let Some(field) = self.open.as_mut() {
            field.bad = true;
        }
    }

    /// Quoted content of the open field ends at buffer offset `at`.
    pub fn close_content(&mut self, buf: &[u8], at: usize) {
        let Some(field) = self.open else {
            return;
        };
        let slot = self.take_content(buf, &field, at, self.trim.inside_quotes);
        if let Some(open) = self.open.as_mut() {
            open.closed = Some(slot);
            open.run_start = at;
        }
    }

    /// Complete the open field. `at` is the buffer offset where its content
    /// ends, `raw_end` the raw offset of the terminating token.
    pub fn finish_field(&mut self, buf: &[u8], at: usize, raw_end: usize) {
        let Some(field) = self.open.take() else {
            return;
        };
        let slot = if field.bad {
            FieldSlot::Raw {
                start: field.raw_start,
                end: raw_end,
            }
        } else if let Some(closed) = field.closed {
            closed
        } else {
            self.take_content(buf, &field, at, self.trim.trim)
        };
        self.fields.push(FieldEntry {
            slot,
            raw_start: field.raw_start,
            raw_end,
            quoted: field.quoted,
            bad: field.bad,
        });
    }

    fn take_content(&mut self, buf: &[u8], field: &OpenField, at: usize, trim: bool) -> FieldSlot {
        if field.owned {
            self.scratch.extend_from_slice(&buf[field.run_start..at]);
            let (s, e) = self.trimmed(&self.scratch, 0, self.scratch.len(), trim);
            let start = self.acc.len();
            self.acc.extend_from_slice(&self.scratch[s..e]);
            self.scratch.clear();
            FieldSlot::Owned {
                start,
                end: self.acc.len(),
            }
        } else {
            let (start, end) = self.trimmed(buf, field.run_start, at, trim);
            FieldSlot::Span { start, end }
        }
    }

    fn trimmed(&self, data: &[u8], mut start: usize, mut end: usize, trim: bool) -> (usize, usize) {
        if trim {
            while start < end && self.whitespace.contains(&data[start]) {
                start += 1;
            }
            while end > start && self.whitespace.contains(&data[end - 1]) {
                end -= 1;
            }
        }
        (start, end)
    }

    /// The record in progress fills the whole buffer: copy everything parsed
    /// so far (buffer range `mark..pos`) out of it.
    pub fn spill(&mut self, buf: &[u8], mark: usize, pos: usize) {
        self.raw_acc.extend_from_slice(&buf[mark..pos]);
        for entry in &mut self.fields {
            own(&mut entry.slot, buf, &mut self.acc);
        }
        if let Some(field) = self.open.as_mut() {
            match field.closed.as_mut() {
                Some(slot) => own(slot, buf, &mut self.acc),
                None if !field.bad => {
                    field.owned = true;
                    self.scratch.extend_from_slice(&buf[field.run_start..pos]);
                }
                None => {}
            }
            field.run_start = pos;
        }
    }

    /// The buffer moved its live bytes down by `d`.
    pub fn shift(&mut self, d: usize) {
        for entry in &mut self.fields {
            if let FieldSlot::Span { start, end } = &mut entry.slot {
                *start -= d;
                *end -= d;
            }
        }
        if let Some(field) = self.open.as_mut() {
            field.run_start -= d;
            if let Some(FieldSlot::Span { start, end }) = field.closed.as_mut() {
                *start -= d;
                *end -= d;
            }
        }
    }

    /// The record (or skipped line) ends at buffer offset `pos`.
    pub fn complete(&mut self, buf: &[u8], mark: usize, pos: usize) {
        if self.raw_acc.is_empty() {
            self.raw = RawLoc::Buffer {
                start: mark,
                end: pos,
            };
        } else {
            self.raw_acc.extend_from_slice(&buf[mark..pos]);
            self.raw = RawLoc::Accumulated;
        }
    }

    pub fn raw<'a>(&'a self, buf: &'a [u8]) -> &'a [u8] {
        match self.raw {
            RawLoc::Buffer { start, end } => &buf[start..end],
            RawLoc::Accumulated => &self.raw_acc,
        }
    }

    /// A single unquoted empty field.
    pub fn is_blank(&self) -> bool {
        match self.fields.as_slice() {
            [only] => !only.quoted && !only.bad && slot_len(only.slot) == 0,
            _ => false,
        }
    }

    /// Index and raw text range of every field flagged as bad data.
    pub fn bad_fields(&self) -> impl Iterator<Item = (usize, std::ops::Range<usize>)> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.bad)
            .map(|(i, f)| (i, f.raw_start..f.raw_end))
    }

    pub fn record<'a>(&'a self, buf: &'a [u8], position: Position) -> Record<'a> {
        Record {
            builder: self,
            buf,
            raw: self.raw(buf),
            position,
        }
    }
}

fn own(slot: &mut FieldSlot, buf: &[u8], acc: &mut Vec<u8>) {
    if let FieldSlot::Span { start, end } = *slot {
        let owned_start = acc.len();
        acc.extend_from_slice(&buf[start..end]);
        *slot = FieldSlot::Owned {
            start: owned_start,
            end: acc.len(),
        };
    }
}

fn slot_len(slot: FieldSlot) -> usize {
    match slot {
        FieldSlot::Span { start, end }
        | FieldSlot::Owned { start, end }
        | FieldSlot::Raw { start, end } => end - start,
    }
}

// ==========================================================================
// Record views
// ==========================================================================

/// One parsed record, borrowed from its reader until the next read call.
#[derive(Clone, Copy)]
pub struct Record<'r> {
    builder: &'r RecordBuilder,
    buf: &'r [u8],
    raw: &'r [u8],
    position: Position,
}

impl<'r> Record<'r> {
    /// Field `index` as text.
    pub fn get(&self, index: usize) -> Option<&'r str> {
        self.get_bytes(index)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Field `index` as raw UTF-8 bytes.
    pub fn get_bytes(&self, index: usize) -> Option<&'r [u8]> {
        let entry = self.builder.fields.get(index)?;
        Some(match entry.slot {
            FieldSlot::Span { start, end } => &self.buf[start..end],
            FieldSlot::Owned { start, end } => &self.builder.acc[start..end],
            FieldSlot::Raw { start, end } => &self.raw[start..end],
        })
    }

    pub fn len(&self) -> usize {
        self.builder.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'r str> + '_ {
        (0..self.len()).map(|i| self.get(i).unwrap_or_default())
    }

    /// Exact input text of this record, terminator included.
    pub fn raw_record(&self) -> &'r str {
        std::str::from_utf8(self.raw).unwrap_or_default()
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

    /// Counters right after this record.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Copy the record out of the reader.
    pub fn to_owned(&self) -> OwnedRecord {
        self.to_owned_with(None)
    }

    pub(crate) fn to_owned_with(&self, mut cache: Option<&mut FieldCache>) -> OwnedRecord {
        let mut fields = Vec::with_capacity(self.len());
        for value in self.iter() {
            let value = match cache.as_deref_mut() {
                Some(cache) => cache.intern(value),
                None => Arc::from(value),
            };
            fields.push(value);
        }
        OwnedRecord {
            fields,
            raw_record: self.raw_record().to_string(),
            position: self.position,
        }
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("fields", &self.iter().collect::<Vec<_>>())
            .field("row", &self.position.row)
            .field("raw_row", &self.position.raw_row)
            .finish()
    }
}

/// A record detached from its reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    fields: Vec<Arc<str>>,
    raw_record: String,
    position: Position,
}

impl OwnedRecord {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| &**f)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| &**f)
    }

    /// Shared field values, as interned by the reader's field cache.
    pub fn fields(&self) -> &[Arc<str>] {
        &self.fields
    }

    pub fn raw_record(&self) -> &str {
        &self.raw_record
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

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(String::from).collect()
    }
}
