//! Splitting a buffer into newline-terminated records, several bytes at a time.
//!
//! A [`BlockScan`] turns a block of up to 64 bytes into a bit mask of the positions of the
//! delimiter; [`LineScanner`] then peels the set bits off from the lowest one upwards, each
//! one terminating the record that started right after the previous delimiter. The block
//! width only affects speed: every implementation produces the same records as a byte by
//! byte scan.

use std::{marker::PhantomData, ops::Range};

/// The record delimiter.
pub const NEW_LINE: u8 = b'\n';

/// A record as an offset and a length into the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub offset: usize,
    pub len: usize,
}

impl RecordSpan {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// The bytes of this record; `bytes` must be the buffer it was scanned from.
    pub fn slice<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.range()]
    }
}

/// Find every occurrence of a byte within a block.
pub trait BlockScan {
    /// Number of bytes consumed per step; at most 64.
    const WIDTH: usize;

    /// Bit `i` of the result is set iff `block[i] == needle`.
    ///
    /// `block` is exactly [`Self::WIDTH`] bytes long.
    fn mask(block: &[u8], needle: u8) -> u64;
}

/// One byte at a time. Used for the final under-sized block by every scanner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarScan;

impl ScalarScan {
    /// Same as [`BlockScan::mask`], for any block of at most 64 bytes.
    pub fn mask_any(block: &[u8], needle: u8) -> u64 {
        debug_assert!(block.len() <= 64);

        block
            .iter()
            .enumerate()
            .filter(|&(_, &byte)| byte == needle)
            .fold(0, |mask, (pos, _)| mask | (1 << pos))
    }
}

impl BlockScan for ScalarScan {
    const WIDTH: usize = 64;

    fn mask(block: &[u8], needle: u8) -> u64 {
        Self::mask_any(block, needle)
    }
}

/// Eight bytes at a time in a general purpose register.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarScan;

impl SwarScan {
    const LOW_BITS: u64 = 0x7f7f_7f7f_7f7f_7f7f;
    const HIGH_BITS: u64 = 0x8080_8080_8080_8080;
    /// Moves bit `8 * i` of a word to bit `56 + i`.
    const GATHER: u64 = 0x0102_0408_1020_4080;
}

impl BlockScan for SwarScan {
    const WIDTH: usize = 8;

    fn mask(block: &[u8], needle: u8) -> u64 {
        let mut word = [0; 8];
        word.copy_from_slice(block);

        let diff = u64::from_le_bytes(word) ^ (u64::from(needle) * 0x0101_0101_0101_0101);

        // The high bit of each byte is set iff that byte of `diff` is zero. Clearing the high
        // bits first means the addition never carries into the next byte.
        let zeroes = !(((diff & Self::LOW_BITS) + Self::LOW_BITS) | diff | Self::LOW_BITS);

        ((zeroes >> 7).wrapping_mul(Self::GATHER)) >> 56
    }
}

/// Sixteen bytes at a time with SSE2, which every x86_64 target has.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Sse2Scan;

#[cfg(target_arch = "x86_64")]
impl BlockScan for Sse2Scan {
    const WIDTH: usize = 16;

    fn mask(block: &[u8], needle: u8) -> u64 {
        use std::arch::x86_64::{
            _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8,
        };

        assert_eq!(block.len(), Self::WIDTH);

        // SSE2 is part of the x86_64 baseline and the load is unaligned and in bounds.
        unsafe {
            let chunk = _mm_loadu_si128(block.as_ptr().cast());
            let matches = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(needle as i8));

            _mm_movemask_epi8(matches) as u16 as u64
        }
    }
}

/// The fastest scanner available for the build target.
#[cfg(target_arch = "x86_64")]
pub type DefaultScan = Sse2Scan;

/// The fastest scanner available for the build target.
#[cfg(not(target_arch = "x86_64"))]
pub type DefaultScan = SwarScan;

/// An iterator over the records of a byte range, split on [`NEW_LINE`].
///
/// A final record without a trailing delimiter is still produced. Consecutive delimiters
/// produce zero-length records; it is up to the caller to skip them.
pub struct LineScanner<'a, S: BlockScan = DefaultScan> {
    bytes: &'a [u8],
    end: usize,
    /// Start of the record currently being scanned.
    start: usize,
    /// Start of the next block to load.
    cursor: usize,
    /// Position of bit 0 of `mask`.
    base: usize,
    mask: u64,
    _scan: PhantomData<S>,
}

impl<'a> LineScanner<'a> {
    /// Scan the whole of `bytes` with the [`DefaultScan`].
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_range(bytes, 0..bytes.len())
    }
}

impl<'a, S: BlockScan> LineScanner<'a, S> {
    /// Scan `range` of `bytes`; the offsets of the produced spans are relative to `bytes`.
    ///
    /// `range` should start at a record boundary.
    pub fn with_range(bytes: &'a [u8], range: Range<usize>) -> Self {
        debug_assert!(S::WIDTH > 0 && S::WIDTH <= 64);
        debug_assert!(range.end <= bytes.len());

        Self {
            bytes,
            end: range.end,
            start: range.start,
            cursor: range.start,
            base: range.start,
            mask: 0,
            _scan: PhantomData,
        }
    }

    /// Load the next block into `mask`; returns `false` once the range is exhausted.
    fn load(&mut self) -> bool {
        let remaining = self.end - self.cursor;

        if remaining == 0 {
            return false;
        }

        self.base = self.cursor;

        if remaining >= S::WIDTH {
            self.mask = S::mask(&self.bytes[self.cursor..self.cursor + S::WIDTH], NEW_LINE);
            self.cursor += S::WIDTH;
        } else {
            self.mask = ScalarScan::mask_any(&self.bytes[self.cursor..self.end], NEW_LINE);
            self.cursor = self.end;
        }

        true
    }
}

impl<S: BlockScan> Iterator for LineScanner<'_, S> {
    type Item = RecordSpan;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.mask != 0 {
                let pos = self.base + self.mask.trailing_zeros() as usize;
                self.mask &= self.mask - 1;

                let span = RecordSpan::new(self.start, pos - self.start);
                self.start = pos + 1;

                return Some(span);
            }

            if !self.load() {
                break;
            }
        }

        if self.start < self.end {
            let span = RecordSpan::new(self.start, self.end - self.start);
            self.start = self.end;

            return Some(span);
        }

        None
    }
}
