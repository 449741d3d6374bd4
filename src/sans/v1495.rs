//! V1495 FPGA TDC blocks.

use tartan_bitfield::bitfield;

use super::{
    cursor::{CursorError, WordCursor},
    marker::MarkerTable,
    scan::FromBank,
    time::V1495Hit,
};

/// The fixed words opening a V1495 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V1495Block {
    /// Board identifier word. The memory-card event id it shares space with
    /// is not decoded.
    pub board_word: u32,
    pub time_window: u32,
    pub hit_count: u16,
    pub common_stop: u16,
    /// Whether the board was misread, in which case no hits were read.
    pub misread: bool,
}

bitfield! {
    struct LowHalf(u32) {
        [0..16] value: u16,
    }
}

bitfield! {
    struct StopWord(u32) {
        [0..12] common_stop: u16,
    }
}

/// Decode a block following its marker word, publishing to a receiver.
pub fn decode_block(
    c: &mut WordCursor,
    board: i32,
    markers: &MarkerTable,
    o: &mut impl FromBank,
) -> Result<V1495Block, CursorError> {
    let [board_word, time_window, count, stop] = c.take_array()?;

    let hit_count = LowHalf(count).value();
    let misread =
        hit_count == markers.v1495_misread && LowHalf(stop).value() == markers.v1495_misread;

    let block = V1495Block {
        board_word,
        time_window,
        hit_count: if misread { 0 } else { hit_count },
        common_stop: StopWord(stop).common_stop(),
        misread,
    };

    if misread {
        tracing::debug!(board, board_word, "V1495 board misread, taking no hits");
        return Ok(block);
    }

    for _ in 0..block.hit_count {
        let hit = V1495Hit(c.take()?);
        o.add_v1495_hit(board, hit, block.common_stop);
    }

    Ok(block)
}
