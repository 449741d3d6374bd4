//! TW-TDC and QIE blocks.
//!
//! A block opens with a control word naming the board and the number of
//! logical words that follow. Each logical word is then one of:
//!
//! - an event boundary carrying the board's sequence tag (top nibble clear),
//! - a header carrying the trigger time and hit count (top bit set),
//! - a hit.
//!
//! QIE blocks only carry event boundaries, in words whose low half is set.

use tartan_bitfield::bitfield;

use super::{
    cursor::{CursorError, WordCursor},
    marker::MarkerTable,
    scan::FromBank,
    time::{BOARD_OFFSET, TdcHeader, TdcHit},
};

/// Largest word count a sane control word can declare.
pub const CONTROL_WORD_CEILING: u16 = 0x0FFF;

/// The field layout of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdcFlavor {
    TwTdc,
    Qie,
}

/// How decoding of a block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Decoded { board: i32, word_count: u16 },
    /// The control word failed its sanity checks; nothing after it in the
    /// bank can be trusted.
    ArmDead { control: u32 },
}

bitfield! {
    struct ControlWord(u32) {
        [0..16] word_count: u16,
        [24..28] board: u8,
        [30..32] fault: u8,
    }
}

bitfield! {
    struct DataWord(u32) {
        [0..16] low: u16,
        [28..32] kind: u8,
        [31] is_header,
    }
}

/// Decode a block following its marker word, publishing to a receiver.
pub fn decode_block(
    c: &mut WordCursor,
    flavor: TdcFlavor,
    markers: &MarkerTable,
    o: &mut impl FromBank,
) -> Result<BlockOutcome, CursorError> {
    let control = c.take()?;
    let fields = ControlWord(control);

    if fields.fault() != 0 || fields.word_count() > CONTROL_WORD_CEILING {
        o.arm_dead(control);
        return Ok(BlockOutcome::ArmDead { control });
    }

    let board = fields.board() as i32 - BOARD_OFFSET;
    let word_count = fields.word_count();

    let mut slot = 0;
    while slot < word_count {
        let word = c.take()?;

        if word == markers.filler {
            continue;
        }

        // The count is echoed in the first two slots by some firmware.
        if word == word_count as u32 && slot < 2 {
            slot += 1;
            continue;
        }

        let data = DataWord(word);
        match flavor {
            TdcFlavor::TwTdc if data.kind() == 0 => o.finalize(board, word),
            TdcFlavor::TwTdc if data.is_header() => o.open_header(board, TdcHeader(word)),
            TdcFlavor::TwTdc => o.add_hit(board, TdcHit(word)),
            TdcFlavor::Qie if data.low() != 0 => o.finalize(board, word),
            TdcFlavor::Qie => {}
        }

        slot += 1;
    }

    Ok(BlockOutcome::Decoded { board, word_count })
}
