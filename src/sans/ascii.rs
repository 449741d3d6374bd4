//! Text payloads of spill-counter and slow-control buffers.
//!
//! Both carry ASCII text packed four bytes to a word, starting after a fixed
//! header. NUL padding is dropped.

use serde::{Deserialize, Serialize};

/// Offset of the first text word in a buffer.
pub const TEXT_OFFSET: usize = 4;

/// Slow-control line holding the target position, by default.
pub const TARGET_LINE: usize = 117;

/// Number of fields on a well-formed target position line.
const TARGET_FIELDS: usize = 4;

/// The order in which the bytes of a word hold characters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ByteOrder {
    /// The least significant byte holds the first character, as written by
    /// the acquisition system.
    #[default]
    LowByteFirst,
    HighByteFirst,
}

/// Unpack the text held by a buffer.
pub fn decode_text(words: &[u32], order: ByteOrder) -> String {
    words
        .iter()
        .skip(TEXT_OFFSET)
        .flat_map(|w| match order {
            ByteOrder::LowByteFirst => w.to_le_bytes(),
            ByteOrder::HighByteFirst => w.to_be_bytes(),
        })
        .filter(|&b| b != 0)
        .map(char::from)
        .collect()
}

/// Parse the integer prefix of a string, after any leading whitespace.
///
/// A string without one yields zero; values beyond the range of `i32`
/// saturate.
pub fn parse_int(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            (acc * 10 + (d - b'0') as i64).min(i32::MAX as i64 + 1)
        });

    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Decode the spill id carried by a spill-counter buffer.
pub fn decode_spill_id(words: &[u32], order: ByteOrder) -> i32 {
    parse_int(&decode_text(words, order))
}

/// Decode the target position carried by a slow-control buffer.
///
/// Returns `None` when the text has too few lines, or the target line does
/// not hold exactly four space-separated fields.
pub fn decode_target_position(words: &[u32], order: ByteOrder, line: usize) -> Option<i32> {
    let text = decode_text(words, order);
    let line = text.split('\n').filter(|l| !l.is_empty()).nth(line)?;

    let fields: Vec<&str> = line.split(' ').filter(|f| !f.is_empty()).collect();
    if fields.len() != TARGET_FIELDS {
        return None;
    }

    Some(parse_int(fields[2]))
}
