// Special-byte scanning strategies
//
// The state machine only needs to stop on bytes that can change its state:
// quote, escape, the first byte of the delimiter, and the first byte(s) of the
// newline. Everything in between is copied or borrowed as a run. Each strategy
// answers the same question ("offset of the nearest special byte") and must
// agree with the scalar baseline on every input.
//
// Strategies:
//   Scalar: lookup table, one byte at a time
//   Swar:   8 bytes per step in a u64 (SIMD-within-a-register)
//   Memchr: memchr/memchr2/memchr3 (vectorized where the target allows)

use crate::dialect::ScanStrategy;

/// A small set of bytes the state machine must stop on.
#[derive(Clone)]
pub struct SpecialSet {
    bytes: Vec<u8>,
    table: [bool; 256],
}

impl std::fmt::Debug for SpecialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SpecialSet").field(&self.bytes).finish()
    }
}

impl SpecialSet {
    pub fn new(bytes: &[u8]) -> Self {
        let mut table = [false; 256];
        let mut unique = Vec::with_capacity(bytes.len());
        for &b in bytes {
            if !table[b as usize] {
                table[b as usize] = true;
                unique.push(b);
            }
        }
        SpecialSet {
            bytes: unique,
            table,
        }
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.table[byte as usize]
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Locate the next special byte in a buffered segment.
pub trait FindSpecial {
    /// Offset of the first byte of `haystack` that is in `set`, or `None` if
    /// the segment holds no special byte.
    fn find_next(&self, haystack: &[u8], set: &SpecialSet) -> Option<usize>;
}

/// Byte-at-a-time baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarScan;

impl FindSpecial for ScalarScan {
    #[inline]
    fn find_next(&self, haystack: &[u8], set: &SpecialSet) -> Option<usize> {
        haystack.iter().position(|&b| set.contains(b))
    }
}

const LO: u64 = 0x0101_0101_0101_0101;
const HI: u64 = 0x8080_8080_8080_8080;

/// Word-at-a-time scan over little-endian u64 lanes.
///
/// For each needle, `(x - LO) & !x & HI` sets the high bit of every zero byte
/// of `x = word ^ splat(needle)`. Borrows only propagate towards higher bytes,
/// so the lowest set bit is always exact; OR-ing the masks of all needles
/// keeps that property for the union.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarScan;

impl FindSpecial for SwarScan {
    fn find_next(&self, haystack: &[u8], set: &SpecialSet) -> Option<usize> {
        if set.is_empty() {
            return None;
        }
        let mut splats = [0u64; 8];
        // Sets larger than eight bytes never occur in practice; fall back.
        if set.len() > splats.len() {
            return ScalarScan.find_next(haystack, set);
        }
        let n = set.len();
        for (slot, &b) in splats.iter_mut().zip(set.bytes()) {
            *slot = LO * b as u64;
        }

        let mut pos = 0;
        while pos + 8 <= haystack.len() {
            let mut lane = [0u8; 8];
            lane.copy_from_slice(&haystack[pos..pos + 8]);
            let word = u64::from_le_bytes(lane);

            let mut hits = 0u64;
            for &splat in &splats[..n] {
                let x = word ^ splat;
                hits |= x.wrapping_sub(LO) & !x & HI;
            }
            if hits != 0 {
                return Some(pos + (hits.trailing_zeros() / 8) as usize);
            }
            pos += 8;
        }

        // Scalar tail
        haystack[pos..]
            .iter()
            .position(|&b| set.contains(b))
            .map(|off| pos + off)
    }
}

/// memchr-backed scan. Sets of more than three bytes are searched in groups of
/// three, each group limited to the prefix before the best hit so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemchrScan;

impl FindSpecial for MemchrScan {
    fn find_next(&self, haystack: &[u8], set: &SpecialSet) -> Option<usize> {
        let bytes = set.bytes();
        match bytes.len() {
            0 => None,
            1 => memchr::memchr(bytes[0], haystack),
            2 => memchr::memchr2(bytes[0], bytes[1], haystack),
            3 => memchr::memchr3(bytes[0], bytes[1], bytes[2], haystack),
            _ => {
                let mut best: Option<usize> = None;
                for group in bytes.chunks(3) {
                    let limit = best.unwrap_or(haystack.len());
                    let hay = &haystack[..limit];
                    let hit = match group {
                        [a] => memchr::memchr(*a, hay),
                        [a, b] => memchr::memchr2(*a, *b, hay),
                        [a, b, c] => memchr::memchr3(*a, *b, *c, hay),
                        _ => None,
                    };
                    if hit.is_some() {
                        best = hit;
                    }
                }
                best
            }
        }
    }
}

/// Strategy chosen once per session; dispatch is a match on a Copy enum.
#[derive(Debug, Clone, Copy)]
pub enum Scanner {
    Scalar(ScalarScan),
    Swar(SwarScan),
    Memchr(MemchrScan),
}

impl Scanner {
    /// Resolve a configured strategy against the largest set the session uses.
    pub fn select(strategy: ScanStrategy, largest_set: usize) -> Self {
        match strategy {
            ScanStrategy::Scalar => Scanner::Scalar(ScalarScan),
            ScanStrategy::Swar => Scanner::Swar(SwarScan),
            ScanStrategy::Memchr => Scanner::Memchr(MemchrScan),
            ScanStrategy::Auto => {
                if largest_set <= 3 {
                    Scanner::Memchr(MemchrScan)
                } else {
                    Scanner::Swar(SwarScan)
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scanner::Scalar(_) => "scalar",
            Scanner::Swar(_) => "swar",
            Scanner::Memchr(_) => "memchr",
        }
    }
}

impl FindSpecial for Scanner {
    #[inline]
    fn find_next(&self, haystack: &[u8], set: &SpecialSet) -> Option<usize> {
        match self {
            Scanner::Scalar(s) => s.find_next(haystack, set),
            Scanner::Swar(s) => s.find_next(haystack, set),
            Scanner::Memchr(s) => s.find_next(haystack, set),
        }
    }
}

// ==========================================================================
// Tests
// ==========================================================================
