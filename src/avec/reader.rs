//! Reader-based event source.

use std::io::{self, ErrorKind, Read};

use zerocopy::{
    FromBytes,
    byteorder::{BigEndian, ByteOrder, LittleEndian, U32},
};

use crate::sans::header::{EVENT_HEADER_WORDS, RawBuffer};

use super::{EventSource, ReadError};

/// Largest buffer accepted, in words. Longer buffers are skipped as corrupt.
pub const MAX_BUFFER_WORDS: usize = 200_000;

/// Byte order of the words in a stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    #[default]
    Little,
    Big,
}

/// Read buffers from a byte stream of self-delimited buffers.
#[derive(Debug)]
pub struct ReaderSource<R> {
    r: R,
    order: WordOrder,
    /// Words read so far, used to locate errors.
    position: usize,
    bytes: Vec<u8>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(r: R, order: WordOrder) -> Self {
        Self {
            r,
            order,
            position: 0,
            bytes: Vec::new(),
        }
    }

    /// The number of words consumed from the reader.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.r
    }

    /// Read words into the scratch buffer. Returns the number of words read,
    /// which is short only at the end of the stream.
    fn fill(&mut self, words: usize) -> Result<usize, io::Error> {
        self.bytes.resize(words * 4, 0);

        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.r.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => Err(err)?,
            }
        }

        self.bytes.truncate(filled - filled % 4);
        self.position += filled / 4;

        Ok(filled / 4)
    }

    fn decode_words(&self) -> Result<Vec<u32>, ReadError> {
        fn decode<O: ByteOrder>(bytes: &[u8]) -> Result<Vec<u32>, ReadError> {
            let words = <[U32<O>]>::ref_from_bytes(bytes)
                .map_err(|_| ReadError::Corrupt("misaligned word stream".into()))?;
            Ok(words.iter().map(|w| w.get()).collect())
        }

        match self.order {
            WordOrder::Little => decode::<LittleEndian>(&self.bytes),
            WordOrder::Big => decode::<BigEndian>(&self.bytes),
        }
    }

    fn skip(&mut self, words: usize) -> Result<(), io::Error> {
        let skipped = io::copy(&mut self.r.by_ref().take(words as u64 * 4), &mut io::sink())?;
        self.position += (skipped / 4) as usize;
        Ok(())
    }
}

impl<R: Read> EventSource for ReaderSource<R> {
    fn read(&mut self) -> Result<RawBuffer, ReadError> {
        let start = self.position;

        if self.fill(1)? == 0 {
            return Err(ReadError::EndOfStream);
        }

        let mut words = self.decode_words()?;
        let Some(&first) = words.first() else {
            return Err(ReadError::EndOfStream);
        };
        let total = (first as usize).saturating_add(1);

        if total > MAX_BUFFER_WORDS {
            self.skip(total - 1)?;
            Err(ReadError::Corrupt(format!(
                "buffer at word {start} declares {total} words, more than {MAX_BUFFER_WORDS}"
            )))?;
        }

        let rest = total - 1;
        if self.fill(rest)? < rest {
            tracing::warn!(position = start, declared = total, "buffer runs past end of stream");
            return Err(ReadError::EndOfStream);
        }

        words.extend(self.decode_words()?);

        if total < EVENT_HEADER_WORDS {
            Err(ReadError::Corrupt(format!("buffer of {total} words has no event header")))?;
        }

        RawBuffer::new(words).map_err(|err| ReadError::Corrupt(err.to_string()))
    }
}
