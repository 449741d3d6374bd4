//! Conversion of raw time fields into physical units.
//!
//! TW-TDC words carry a 12-bit rough time counted in 4 ns ticks and a 4-bit
//! fine time subdividing one tick into ninths, counted down. Hit times are
//! measured back from the trigger time held by the preceding header word.
//! V1495 hits carry a byte counted back from the board's common stop.

use tartan_bitfield::bitfield;

/// Full range of TW-TDC hit times, added to wrap negative differences.
pub const TIME_RANGE: f64 = 4096.0;

/// Width of one rough-time tick.
pub const ROUGH_TICK: f64 = 4.0;

/// Number of fine-time subdivisions of one rough tick.
pub const FINE_DIVISIONS: f64 = 9.0;

/// Offset subtracted from the channel byte of a TW-TDC hit.
pub const CHANNEL_OFFSET: i32 = 0x40;

/// Offset subtracted from the board field of a TDC control word.
pub const BOARD_OFFSET: i32 = 9;

/// Nanoseconds spanned by [`V1495_DIVISIONS`] V1495 TDC counts.
pub const V1495_PERIOD: f64 = 18.86;

/// Number of V1495 TDC counts per [`V1495_PERIOD`].
pub const V1495_DIVISIONS: f64 = 16.0;

/// Hit count reported by a board whose hit counter saturated.
pub const HIT_COUNT_OVERFLOW: usize = 255;

bitfield! {
    struct TimeFields(u32) {
        [0..4] fine: u8,
        [4..16] rough: u16,
    }
}

bitfield! {
    struct HeaderFields(u32) {
        [20..28] hit_field: u8,
    }
}

bitfield! {
    struct HitFields(u32) {
        [24..32] channel: u8,
    }
}

bitfield! {
    struct V1495Fields(u32) {
        [0..8] counts: u8,
        [8..16] channel: u8,
    }
}

/// Decode the rough and fine time fields of a TW-TDC word.
pub fn decode_time(word: u32) -> f64 {
    let fields = TimeFields(word);
    time_from_fields(fields.rough(), fields.fine())
}

/// Combine a rough time (in ticks) and a fine time (in ninths of a tick,
/// counted down) into nanoseconds.
pub fn time_from_fields(rough: u16, fine: u8) -> f64 {
    let fine = ROUGH_TICK - fine as f64 * ROUGH_TICK / FINE_DIVISIONS;
    let rough = rough as f64 * ROUGH_TICK;

    rough + fine
}

/// A TW-TDC header word, opening a logical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdcHeader(pub u32);

impl TdcHeader {
    pub fn trigger_time(self) -> f64 {
        decode_time(self.0)
    }

    /// The number of hits the board reports for this event.
    pub fn expected_hits(self) -> i32 {
        HeaderFields(self.0).hit_field() as i32 - 1
    }
}

/// A TW-TDC hit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdcHit(pub u32);

impl TdcHit {
    pub fn channel(self) -> i32 {
        HitFields(self.0).channel() as i32 - CHANNEL_OFFSET
    }

    /// The hit time relative to a trigger time, wrapped to be non-negative.
    pub fn time(self, trigger_time: f64) -> f64 {
        let time = trigger_time - decode_time(self.0);
        if time < 0.0 { time + TIME_RANGE } else { time }
    }
}

/// A V1495 hit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V1495Hit(pub u32);

impl V1495Hit {
    pub fn channel(self) -> i32 {
        V1495Fields(self.0).channel() as i32
    }

    /// The hit time in nanoseconds before the board's common stop.
    pub fn time(self, common_stop: u16) -> f64 {
        let counts = common_stop as i32 - V1495Fields(self.0).counts() as i32;
        counts as f64 * V1495_PERIOD / V1495_DIVISIONS
    }
}
