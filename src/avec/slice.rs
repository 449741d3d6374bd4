//! Slice-based event source.

use crate::sans::header::{EVENT_HEADER_WORDS, RawBuffer};

use super::{EventSource, ReadError};

/// Read buffers from an in-memory stream of self-delimited buffers.
///
/// The first word of each buffer holds its length minus one, so buffers are
/// simply concatenated. A buffer running past the end of the slice ends the
/// stream.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    words: &'a [u32],
    position: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, position: 0 }
    }

    /// The offset of the next buffer.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl EventSource for SliceSource<'_> {
    fn read(&mut self) -> Result<RawBuffer, ReadError> {
        let r = &self.words[self.position..];

        let Some(&first) = r.first() else {
            return Err(ReadError::EndOfStream);
        };

        let total = (first as usize).saturating_add(1);

        let Some(words) = r.get(..total) else {
            tracing::warn!(
                position = self.position,
                declared = total,
                available = r.len(),
                "buffer runs past end of stream"
            );
            self.position = self.words.len();
            return Err(ReadError::EndOfStream);
        };

        self.position += total;

        if total < EVENT_HEADER_WORDS {
            Err(ReadError::Corrupt(format!("buffer of {total} words has no event header")))?;
        }

        RawBuffer::new(words.to_vec()).map_err(|err| ReadError::Corrupt(err.to_string()))
    }
}
