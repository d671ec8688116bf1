use bitvec::prelude::*;

use crate::bitutils::bits_to_u64;

use super::error::ParserError;

/// A read cursor over the session's reconstructed sample bitstream.
///
/// Mirrors the reference parser's `self._cursor` integer plus its
/// `_next_bits(length)` helper: `peek` never moves the cursor, callers
/// advance it explicitly by whatever offset their own branch decided on.
/// This keeps the bit-accounting identical to the original, branch for
/// branch, instead of folding peek+advance into one call.
pub struct BitCursor {
    bits: BitVec<Msb0, u8>,
    pos: usize,
}

impl BitCursor {
    pub fn new(bits: BitVec<Msb0, u8>) -> Self {
        BitCursor { bits, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn remaining(&self) -> usize {
        self.bits.len().saturating_sub(self.pos)
    }

    /// Peek `length` bits starting at the cursor without moving it.
    /// Returns fewer bits than requested if the stream is short, mirroring
    /// Python slicing (`s[a:a+n]` silently truncates at the string end).
    pub fn peek(&self, length: usize) -> &BitSlice<Msb0, u8> {
        let start = self.pos.min(self.bits.len());
        let end = (start + length).min(self.bits.len());
        &self.bits[start..end]
    }

    /// Peek `length` bits starting `offset` bits ahead of the cursor.
    pub fn peek_at(&self, offset: usize, length: usize) -> &BitSlice<Msb0, u8> {
        let start = (self.pos + offset).min(self.bits.len());
        let end = (start + length).min(self.bits.len());
        &self.bits[start..end]
    }

    pub fn advance(&mut self, length: usize) {
        self.pos = (self.pos + length).min(self.bits.len());
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.bits.len());
    }

    /// Peek `length` bits and fail loudly if the stream can't supply them.
    pub fn require(&self, length: usize) -> Result<&BitSlice<Msb0, u8>, ParserError> {
        if self.remaining() < length {
            return Err(ParserError::Truncated { cursor: self.pos });
        }
        Ok(self.peek(length))
    }
}

/// Compares a bit window against a literal `"0"`/`"1"` pattern, used for
/// the fixed prefix markers (e.g. the `10000000` distance/speed unfreeze
/// flag) scattered through the telemetry channels.
pub fn bits_eq(bits: &BitSlice<Msb0, u8>, pattern: &str) -> bool {
    bits.len() == pattern.len()
        && bits
            .iter()
            .zip(pattern.chars())
            .all(|(bit, ch)| *bit == (ch == '1'))
}
