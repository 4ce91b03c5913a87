// Output encodings
//
// Text is always UTF-8 inside the crate. The dialect encoding only decides
// how many bytes a consumed line is worth for ByteCount, and what bytes a
// writer emits. Code points Latin-1 cannot hold become `?`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Target encoding for byte counting and writer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    /// Bytes `text` occupies once encoded.
    pub fn encoded_len(self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Latin1 => count_chars(text.as_bytes()),
            Encoding::Utf16Le | Encoding::Utf16Be => text.encode_utf16().count() * 2,
            Encoding::Utf32Le | Encoding::Utf32Be => count_chars(text.as_bytes()) * 4,
        }
    }

    /// Append the encoded form of `text` to `out`.
    pub fn encode_into(self, text: &str, out: &mut Vec<u8>) {
        match self {
            Encoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            Encoding::Latin1 if text.is_ascii() => out.extend_from_slice(text.as_bytes()),
            Encoding::Latin1 => out.extend(
                text.chars()
                    .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?')),
            ),
            Encoding::Utf16Le => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_le_bytes())),
            Encoding::Utf16Be => text
                .encode_utf16()
                .for_each(|unit| out.extend_from_slice(&unit.to_be_bytes())),
            Encoding::Utf32Le => text
                .chars()
                .for_each(|ch| out.extend_from_slice(&u32::from(ch).to_le_bytes())),
            Encoding::Utf32Be => text
                .chars()
                .for_each(|ch| out.extend_from_slice(&u32::from(ch).to_be_bytes())),
        }
    }
}

/// Chars in a UTF-8 byte slice (every byte that is not a continuation byte).
#[inline]
pub fn count_chars(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}
