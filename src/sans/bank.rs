//! Splitting physics buffers into per-ROC banks.

use std::collections::BTreeSet;

use tartan_bitfield::bitfield;
use thiserror::Error;

use super::{
    cursor::{CursorError, WordCursor},
    header::PHYSICS_HEADER_WORDS,
};

/// Number of words after the ROC identifier word that precede a bank's
/// payload.
pub const BANK_PREAMBLE_WORDS: usize = 3;

/// An error walking the banks of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BankError {
    /// A bank header ran past the end of the buffer.
    #[error("Truncated bank header: {0}")]
    Truncated(#[from] CursorError),
}

/// A bank of words read out from one ROC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RocBank<'a> {
    pub roc_id: u8,
    /// Number of words following the count word, as declared by the bank.
    pub word_count: u32,
    pub payload: &'a [u32],
    /// Whether the declared count ran past the end of the buffer, in which
    /// case the payload was cut short at the buffer's end.
    pub truncated: bool,
}

/// Iterator over the ROC banks of a physics buffer.
///
/// Banks whose ROC is in the ignore set are stepped over without being
/// parsed. After an error the iterator is exhausted.
#[derive(Debug)]
pub struct BankWalker<'a> {
    cursor: WordCursor<'a>,
    ignore: &'a BTreeSet<u8>,
    done: bool,
}

impl<'a> BankWalker<'a> {
    /// Walk the banks of a physics buffer, starting after its fixed header.
    pub fn new(words: &'a [u32], ignore: &'a BTreeSet<u8>) -> Self {
        Self::at(words, PHYSICS_HEADER_WORDS, ignore)
    }

    /// Walk banks starting from an arbitrary offset.
    pub fn at(words: &'a [u32], offset: usize, ignore: &'a BTreeSet<u8>) -> Self {
        Self {
            cursor: WordCursor::at(words, offset),
            ignore,
            done: false,
        }
    }

    fn next_bank(&mut self) -> Result<Option<RocBank<'a>>, BankError> {
        bitfield! {
            struct BankWord(u32) {
                [16..24] roc_id: u8,
            }
        }

        loop {
            if self.cursor.is_empty() {
                return Ok(None);
            }

            let word_count = self.cursor.take()?;
            let declared_end = self.cursor.position().saturating_add(word_count as usize);
            let roc_id = BankWord(self.cursor.take()?).roc_id();

            let len = self.cursor.len();
            let truncated = declared_end > len;
            // A bank always spans at least its own header words.
            let end = declared_end.min(len).max(self.cursor.position());

            if self.ignore.contains(&roc_id) {
                tracing::trace!(roc_id, word_count, "skipping ignored bank");
                self.cursor.seek(end)?;
                continue;
            }

            let start = (self.cursor.position() + BANK_PREAMBLE_WORDS).min(end);
            let payload = &self.cursor.words()[start..end];
            self.cursor.seek(end)?;

            return Ok(Some(RocBank {
                roc_id,
                word_count,
                payload,
                truncated,
            }));
        }
    }
}

impl<'a> Iterator for BankWalker<'a> {
    type Item = Result<RocBank<'a>, BankError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_bank() {
            Ok(Some(bank)) => Some(Ok(bank)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
