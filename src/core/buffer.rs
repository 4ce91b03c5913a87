// Fixed-capacity read buffer
//
// Holds raw input bytes between `mark` (start of the record being parsed) and
// `filled`. A refill shifts [mark..filled) to the front, then reads into the
// free tail. The buffer never grows: when a record fills it completely the
// reader spills what it has parsed so far into the record builder and moves
// the mark forward before shifting.

use std::io::{self, Read};

#[derive(Debug)]
pub struct Buffer {
    data: Vec<u8>,
    filled: usize,
    /// Read cursor.
    pub pos: usize,
    /// Start of the record currently being parsed.
    pub mark: usize,
    eof: bool,
}

impl Buffer {
    pub fn new(capacity: usize) -> Self {
        Buffer {
            data: vec![0; capacity],
            filled: 0,
            pos: 0,
            mark: 0,
            eof: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Everything currently buffered.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Buffered bytes from the read cursor on.
    #[inline]
    pub fn available(&self) -> &[u8] {
        &self.data[self.pos..self.filled]
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.filled - self.pos
    }

    #[inline]
    pub fn filled(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.data.len()
    }

    /// True once the source has reported end of stream.
    #[inline]
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Move [mark..filled) to the front of the buffer. Returns the distance
    /// every live offset moved down by.
    pub fn shift(&mut self) -> usize {
        let d = self.mark;
        if d == 0 {
            return 0;
        }
        self.data.copy_within(d..self.filled, 0);
        self.filled -= d;
        self.pos -= d;
        self.mark = 0;
        d
    }

    /// Read once into the free tail. Returns the number of bytes read; zero
    /// marks end of stream. The caller must make room first.
    pub fn fill_from<R: Read>(&mut self, rdr: &mut R) -> io::Result<usize> {
        debug_assert!(!self.is_full());
        loop {
            match rdr.read(&mut self.data[self.filled..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.filled += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop all buffered data (used after a seek).
    pub fn reset(&mut self) {
        self.filled = 0;
        self.pos = 0;
        self.mark = 0;
        self.eof = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_shift() {
        let mut buf = Buffer::new(8);
        let mut src: &[u8] = b"abcdefghij";
        assert_eq!(buf.fill_from(&mut src).unwrap(), 8);
        assert!(buf.is_full());
        buf.pos = 6;
        buf.mark = 5;
        assert_eq!(buf.shift(), 5);
        assert_eq!(buf.data(), b"fgh");
        assert_eq!(buf.pos, 1);
        assert_eq!(buf.available(), b"gh");
        assert_eq!(buf.fill_from(&mut src).unwrap(), 2);
        assert_eq!(buf.data(), b"fghij");
        assert_eq!(buf.fill_from(&mut src).unwrap(), 0);
        assert!(buf.eof());
    }

    #[test]
    fn test_shift_without_mark_is_noop() {
        let mut buf = Buffer::new(4);
        let mut src: &[u8] = b"ab";
        buf.fill_from(&mut src).unwrap();
        buf.pos = 1;
        assert_eq!(buf.shift(), 0);
        assert_eq!(buf.data(), b"ab");
    }

    struct Flaky {
        interrupted: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "again"));
            }
            buf[0] = b'x';
            Ok(1)
        }
    }

    #[test]
    fn test_interrupted_is_retried() {
        let mut buf = Buffer::new(4);
        let mut src = Flaky { interrupted: false };
        assert_eq!(buf.fill_from(&mut src).unwrap(), 1);
        assert_eq!(buf.data(), b"x");
    }

    #[test]
    fn test_reset() {
        let mut buf = Buffer::new(4);
        let mut src: &[u8] = b"";
        buf.fill_from(&mut src).unwrap();
        assert!(buf.eof());
        buf.reset();
        assert!(!buf.eof());
        assert_eq!(buf.remaining(), 0);
    }
}
