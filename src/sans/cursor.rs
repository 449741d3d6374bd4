//! Bounds-checked reading of 32-bit words.

use thiserror::Error;

/// An error reading from a [`WordCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CursorError {
    /// Attempted to read past the end of the cursor's range.
    #[error("Attempted to read word {position} of a {len} word range.")]
    OutOfBounds { position: usize, len: usize },
}

/// A sequential reader over a range of words.
///
/// The cursor never reads past the end of the slice it was created with. To
/// confine a decoder to part of a buffer, create the cursor over a subslice.
#[derive(Debug, Clone)]
pub struct WordCursor<'a> {
    words: &'a [u32],
    position: usize,
}

impl<'a> WordCursor<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, position: 0 }
    }

    /// Create a cursor starting at an offset into a range of words.
    pub fn at(words: &'a [u32], position: usize) -> Self {
        Self { words, position }
    }

    /// The offset of the next word to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The length of the whole range, including words already read.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// The number of words left to read.
    pub fn remaining(&self) -> usize {
        self.words.len().saturating_sub(self.position)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The underlying range of words.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Read the next word without advancing.
    pub fn peek(&self) -> Result<u32, CursorError> {
        self.words
            .get(self.position)
            .copied()
            .ok_or_else(|| self.out_of_bounds(self.position))
    }

    /// Read the next word and advance past it.
    pub fn take(&mut self) -> Result<u32, CursorError> {
        let word = self.peek()?;
        self.position += 1;
        Ok(word)
    }

    /// Read an exact number of words and advance past them.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u32; N], CursorError> {
        let end = self.position + N;
        let words = self
            .words
            .get(self.position..end)
            .ok_or_else(|| self.out_of_bounds(end.saturating_sub(1)))?;

        let mut out = [0; N];
        out.copy_from_slice(words);
        self.position = end;

        Ok(out)
    }

    /// Advance over a number of words without decoding them.
    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        let end = self.position + n;
        if end > self.words.len() {
            Err(self.out_of_bounds(end - 1))?;
        }

        self.position = end;
        Ok(())
    }

    /// Move to an absolute offset within the range.
    ///
    /// Seeking to the offset just past the last word is allowed, and leaves
    /// the cursor empty.
    pub fn seek(&mut self, position: usize) -> Result<(), CursorError> {
        if position > self.words.len() {
            Err(self.out_of_bounds(position))?;
        }

        self.position = position;
        Ok(())
    }

    /// Advance to the end of the range.
    pub fn finish(&mut self) {
        self.position = self.words.len();
    }

    fn out_of_bounds(&self, position: usize) -> CursorError {
        CursorError::OutOfBounds {
            position,
            len: self.words.len(),
        }
    }
}
