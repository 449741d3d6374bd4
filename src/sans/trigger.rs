//! Trigger-timestamp tables.

use super::{
    cursor::{CursorError, WordCursor},
    scan::FromBank,
};

/// Decode a trigger-timestamp table following its marker word.
///
/// The table opens with a word count, and holds one (trigger type, sequence
/// tag) pair per event. Returns the number of pairs read.
pub fn decode_table(c: &mut WordCursor, o: &mut impl FromBank) -> Result<usize, CursorError> {
    let count = c.take()?;
    let pairs = count.saturating_sub(1) as usize / 2;

    for _ in 0..pairs {
        let [trigger_type, _tag] = c.take_array()?;
        o.add_trigger_type(trigger_type);
    }

    Ok(pairs)
}

/// Decode the (sequence tag, trigger type) pair tagging V1495 hits, following
/// its marker word.
pub fn decode_pair(c: &mut WordCursor, o: &mut impl FromBank) -> Result<(), CursorError> {
    let [tag, trigger_type] = c.take_array()?;
    o.set_v1495_tag(tag, trigger_type);

    Ok(())
}
