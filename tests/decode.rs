mod support;

use std::collections::BTreeSet;

use coda_tdc::sans::{
    ascii::{self, ByteOrder},
    bank::BankWalker,
    cursor::{CursorError, WordCursor},
    header::{EventType, RawBuffer},
    scan::{self, BankEnd, FromBank, ScanError},
    tdc::{self, BlockOutcome, TdcFlavor},
    time::{self, TdcHeader, TdcHit, V1495Hit},
    trigger, v1495,
};
use proptest::prelude::*;

use support::*;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Trigger(u32),
    Header(i32, u32),
    Hit(i32, u32),
    Finalize(i32, u32),
    Dead(u32),
    Tag(u32, u32),
    V1495(i32, u32, u16),
}

#[derive(Debug, Default)]
struct Events(Vec<Event>);

impl FromBank for Events {
    fn add_trigger_type(&mut self, trigger_type: u32) {
        self.0.push(Event::Trigger(trigger_type));
    }
    fn open_header(&mut self, board: i32, header: TdcHeader) {
        self.0.push(Event::Header(board, header.0));
    }
    fn add_hit(&mut self, board: i32, hit: TdcHit) {
        self.0.push(Event::Hit(board, hit.0));
    }
    fn finalize(&mut self, board: i32, tag: u32) {
        self.0.push(Event::Finalize(board, tag));
    }
    fn arm_dead(&mut self, control: u32) {
        self.0.push(Event::Dead(control));
    }
    fn set_v1495_tag(&mut self, tag: u32, trigger_type: u32) {
        self.0.push(Event::Tag(tag, trigger_type));
    }
    fn add_v1495_hit(&mut self, board: i32, hit: V1495Hit, common_stop: u16) {
        self.0.push(Event::V1495(board, hit.0, common_stop));
    }
}

#[test]
fn cursor_bounds() {
    let c = &mut WordCursor::new(&[1, 2, 3]);
    assert_eq!(c.take(), Ok(1));
    assert_eq!(c.take_array::<2>(), Ok([2, 3]));
    assert!(c.is_empty());
    assert_eq!(c.take(), Err(CursorError::OutOfBounds { position: 3, len: 3 }));

    let c = &mut WordCursor::at(&[1, 2, 3], 1);
    assert_eq!(c.take_array::<3>(), Err(CursorError::OutOfBounds { position: 3, len: 3 }));
    assert_eq!(c.position(), 1);
    assert!(c.seek(3).is_ok());
    assert!(c.seek(4).is_err());
}

#[test]
fn event_types() {
    assert_eq!(EventType::from_code(11), EventType::BeginOfSpill);
    assert_eq!(EventType::from_code(12), EventType::EndOfSpill);
    assert_eq!(EventType::from_code(14), EventType::V1495Trigger);
    assert_eq!(EventType::from_code(20), EventType::EndOfRun);
    assert_eq!(EventType::from_code(129), EventType::SpillCounter);
    assert_eq!(EventType::from_code(130), EventType::SlowControl);
    assert_eq!(EventType::from_code(140), EventType::Other(140));
    assert_eq!(EventType::from_code(5), EventType::Physics(5));
    assert!(EventType::EndOfRun.is_boundary());
    assert!(!EventType::EndOfSpill.is_boundary());
}

#[test]
fn raw_buffer_header() {
    assert!(RawBuffer::new(vec![0]).is_err());

    let buffer = RawBuffer::new(vec![3, 0x0081_002A, 7, 8, 9, 10]).unwrap();
    let header = buffer.header();
    assert_eq!(header.event_type, EventType::SpillCounter);
    assert_eq!(header.tag, 42);
    assert_eq!(header.total_words, 4);
    assert_eq!(buffer.words(), &[3, 0x0081_002A, 7, 8]);

    let short = RawBuffer::new(vec![9, 0x000B_0000]).unwrap();
    assert!(short.is_short());
    assert_eq!(short.words().len(), 2);
}

#[test]
fn times_and_channels() {
    let header = TdcHeader(HEADER);
    assert_eq!(header.trigger_time(), 100.0);
    assert_eq!(header.expected_hits(), 2);

    assert_eq!(TdcHit(HIT_A).channel(), 5);
    assert_eq!(TdcHit(HIT_A).time(100.0), 56.0);
    assert_eq!(TdcHit(HIT_B).channel(), 7);
    assert_eq!(TdcHit(HIT_B).time(100.0), 4076.0);

    assert_eq!(time::time_from_fields(0, 9), 0.0);
    assert_eq!(time::time_from_fields(1, 0), 8.0);

    let hit = V1495Hit(0x0000_0510);
    assert_eq!(hit.channel(), 5);
    assert!((hit.time(0x100) - 240.0 * 18.86 / 16.0).abs() < 1e-9);
    assert!(hit.time(0) < 0.0);
}

proptest! {
    #[test]
    fn hit_time_wraps_into_range(trigger in 0u32..1024, rough in 0u32..1024, fine in 0u32..16) {
        let trigger_time = TdcHeader(trigger << 4).trigger_time();
        let t = TdcHit(rough << 4 | fine).time(trigger_time);
        prop_assert!(t >= 0.0);
        prop_assert!(t < time::TIME_RANGE + time::ROUGH_TICK);
    }

    #[test]
    fn time_increases_with_rough(rough in 0u16..4095, fine in 0u8..16) {
        prop_assert!(time::time_from_fields(rough + 1, fine) > time::time_from_fields(rough, fine));
    }
}

#[test]
fn tdc_block_round_trip() {
    let block = tdc_block(0, &tdc_event(HEADER, &[HIT_A, HIT_B], 0x66));
    let c = &mut WordCursor::new(&block[1..]);
    let o = &mut Events::default();

    let outcome = tdc::decode_block(c, TdcFlavor::TwTdc, &markers(), o).unwrap();
    assert_eq!(outcome, BlockOutcome::Decoded { board: 0, word_count: 4 });
    assert_eq!(
        o.0,
        vec![
            Event::Header(0, HEADER),
            Event::Hit(0, HIT_A),
            Event::Hit(0, HIT_B),
            Event::Finalize(0, 0x66),
        ]
    );
    assert!(c.is_empty());
}

#[test]
fn tdc_block_skips_filler_and_echoed_count() {
    let filler = markers().filler;
    let words = [0x0A00_0003, 3, filler, EMPTY_HEADER, filler, 0x101];
    let c = &mut WordCursor::new(&words);
    let o = &mut Events::default();

    let outcome = tdc::decode_block(c, TdcFlavor::TwTdc, &markers(), o).unwrap();
    assert_eq!(outcome, BlockOutcome::Decoded { board: 1, word_count: 3 });
    assert_eq!(o.0, vec![Event::Header(1, EMPTY_HEADER), Event::Finalize(1, 0x101)]);
}

#[test]
fn tdc_block_dead_arm() {
    for control in [0xC900_0001, 0x0900_1000] {
        let words = [control, HEADER];
        let c = &mut WordCursor::new(&words);
        let o = &mut Events::default();

        let outcome = tdc::decode_block(c, TdcFlavor::TwTdc, &markers(), o).unwrap();
        assert_eq!(outcome, BlockOutcome::ArmDead { control });
        assert_eq!(o.0, vec![Event::Dead(control)]);
    }
}

#[test]
fn qie_block_only_seals_events() {
    let c = &mut WordCursor::new(&[0x0C00_0003, 0x8000_0000, 0x0000_0007, 0x4000_0000]);
    let o = &mut Events::default();

    tdc::decode_block(c, TdcFlavor::Qie, &markers(), o).unwrap();
    assert_eq!(o.0, vec![Event::Finalize(3, 7)]);
}

#[test]
fn scan_skips_unknown_words() {
    let mut payload = vec![0xDEAD_BEEF];
    payload.extend(tdc_block(0, &tdc_event(EMPTY_HEADER, &[], 0x100)));
    payload.push(0x1234_5678);
    payload.extend(tdc_block(1, &tdc_event(EMPTY_HEADER, &[], 0x200)));

    let o = &mut Events::default();
    let end = scan::scan_roc_bank(&payload, &markers(), o).unwrap();

    assert_eq!(end, BankEnd::Exhausted);
    assert_eq!(
        o.0,
        vec![
            Event::Header(0, EMPTY_HEADER),
            Event::Finalize(0, 0x100),
            Event::Header(1, EMPTY_HEADER),
            Event::Finalize(1, 0x200),
        ]
    );
}

#[test]
fn scan_stops_at_trigger_table_and_dead_arm() {
    let mut payload = trigger_table(&[3, 5]);
    payload.extend(tdc_block(0, &tdc_event(EMPTY_HEADER, &[], 0x100)));

    let o = &mut Events::default();
    let end = scan::scan_roc_bank(&payload, &markers(), o).unwrap();
    assert_eq!(end, BankEnd::TriggerTable);
    assert_eq!(o.0, vec![Event::Trigger(3), Event::Trigger(5)]);

    let mut payload = vec![markers().tw_tdc, 0xC000_0000];
    payload.extend(tdc_block(0, &tdc_event(EMPTY_HEADER, &[], 0x100)));

    let o = &mut Events::default();
    let end = scan::scan_roc_bank(&payload, &markers(), o).unwrap();
    assert_eq!(end, BankEnd::ArmDead { control: 0xC000_0000 });
    assert_eq!(o.0, vec![Event::Dead(0xC000_0000)]);
}

#[test]
fn scan_reports_truncated_block() {
    let payload = [markers().tw_tdc, 0x0900_0004, EMPTY_HEADER];
    let o = &mut Events::default();

    let err = scan::scan_roc_bank(&payload, &markers(), o).unwrap_err();
    assert!(matches!(err, ScanError::Truncated { .. }));
    assert_eq!(o.0, vec![Event::Header(0, EMPTY_HEADER)]);
}

#[test]
fn trigger_table_pairs() {
    let c = &mut WordCursor::new(&[6, 1, 10, 2, 11, 99]);
    let o = &mut Events::default();

    assert_eq!(trigger::decode_table(c, o), Ok(2));
    assert_eq!(o.0, vec![Event::Trigger(1), Event::Trigger(2)]);
    assert_eq!(c.position(), 5);
}

#[test]
fn v1495_blocks() {
    let c = &mut WordCursor::new(&[0xB0, 0, 2, 0x100, 0x0110, 0x0220]);
    let o = &mut Events::default();

    let block = v1495::decode_block(c, 3, &markers(), o).unwrap();
    assert_eq!(block.hit_count, 2);
    assert_eq!(block.common_stop, 0x100);
    assert!(!block.misread);
    assert_eq!(o.0, vec![Event::V1495(3, 0x0110, 0x100), Event::V1495(3, 0x0220, 0x100)]);

    let c = &mut WordCursor::new(&[0xB0, 0, 0xD1AD, 0xD1AD, 0x0110]);
    let o = &mut Events::default();

    let block = v1495::decode_block(c, 0, &markers(), o).unwrap();
    assert!(block.misread);
    assert_eq!(block.hit_count, 0);
    assert!(o.0.is_empty());
    assert_eq!(c.position(), 4);

    // A stop word alone matching the sentinel is a real stop time.
    let c = &mut WordCursor::new(&[0xB0, 0, 1, 0xD1AD, 0x0110]);
    let o = &mut Events::default();

    let block = v1495::decode_block(c, 0, &markers(), o).unwrap();
    assert!(!block.misread);
    assert_eq!(block.hit_count, 1);
    assert_eq!(block.common_stop, 0x1AD);
    assert_eq!(o.0, vec![Event::V1495(0, 0x0110, 0x1AD)]);
    assert_eq!(c.position(), 5);
}

#[test]
fn v1495_buffer() {
    let mut payload = v1495_block([0, 0, 1, 0x100], &[0x0110]);
    payload.extend([markers().trigger_timestamp, 77, 4]);
    payload.extend(v1495_block([0, 0, 1, 0x100], &[0x0220]));
    let words = buffer(V1495_TRIGGER, &payload);

    let o = &mut Events::default();
    scan::scan_v1495_buffer(&words, &markers(), o).unwrap();
    assert_eq!(
        o.0,
        vec![
            Event::V1495(0, 0x0110, 0x100),
            Event::Tag(77, 4),
            Event::V1495(1, 0x0220, 0x100),
        ]
    );
}

#[test]
fn bank_walker() {
    let words = physics(&[
        bank(14, &[1, 2]),
        bank(25, &[3, 4, 5]),
        vec![0, 12 << 16],
        bank(18, &[6]),
    ]);

    let ignore = BTreeSet::from([25]);
    let banks: Vec<_> = BankWalker::new(&words, &ignore).map(Result::unwrap).collect();

    let ids: Vec<_> = banks.iter().map(|b| b.roc_id).collect();
    assert_eq!(ids, vec![14, 12, 18]);
    assert_eq!(banks[0].payload, &[1, 2]);
    assert!(banks[1].payload.is_empty());
    assert_eq!(banks[2].payload, &[6]);
    assert!(banks.iter().all(|b| !b.truncated));
}

#[test]
fn bank_walker_truncated() {
    let mut words = physics(&[bank(14, &[1, 2, 3])]);
    words.truncate(words.len() - 2);

    let ignore = BTreeSet::new();
    let banks: Vec<_> = BankWalker::new(&words, &ignore).collect();
    assert_eq!(banks.len(), 1);

    let bank = banks[0].unwrap();
    assert!(bank.truncated);
    assert_eq!(bank.payload, &[1]);

    let words: [u32; 8] = [0, 0, 0, 0, 0, 0, 0, 5];
    let mut walker = BankWalker::new(&words, &ignore);
    assert!(walker.next().unwrap().is_err());
    assert!(walker.next().is_none());
}

#[test]
fn ascii_text() {
    let words = text(SPILL_COUNTER, "1234\n");
    assert_eq!(ascii::decode_text(&words, ByteOrder::LowByteFirst), "1234\n");
    assert_eq!(ascii::decode_spill_id(&words, ByteOrder::LowByteFirst), 1234);
    assert_eq!(ascii::decode_spill_id(&words, ByteOrder::HighByteFirst), 4321);

    assert_eq!(ascii::parse_int("  -17 apples"), -17);
    assert_eq!(ascii::parse_int("none"), 0);
    assert_eq!(ascii::parse_int("99999999999"), i32::MAX);
}

#[test]
fn ascii_target_position() {
    let words = text(SLOW_CONTROL, "header\n\nTARGPOS CONTROL 3 1\nTARGPOS 5\n");
    let order = ByteOrder::LowByteFirst;

    assert_eq!(ascii::decode_target_position(&words, order, 1), Some(3));
    assert_eq!(ascii::decode_target_position(&words, order, 2), None);
    assert_eq!(ascii::decode_target_position(&words, order, 3), None);
}
