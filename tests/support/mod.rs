#![allow(dead_code)]

use coda_tdc::{
    avec::{HitRecord, HitSink, SpillSummary},
    sans::marker::MarkerTable,
};

pub const PHYSICS: u16 = 1;
pub const BEGIN_OF_SPILL: u16 = 11;
pub const END_OF_SPILL: u16 = 12;
pub const V1495_TRIGGER: u16 = 14;
pub const END_OF_RUN: u16 = 20;
pub const SPILL_COUNTER: u16 = 129;
pub const SLOW_CONTROL: u16 = 130;

pub fn markers() -> MarkerTable {
    MarkerTable::default()
}

/// A buffer of some type holding a payload after its two header words.
pub fn buffer(event_type: u16, payload: &[u32]) -> Vec<u32> {
    let mut words = vec![0, (event_type as u32) << 16];
    words.extend_from_slice(payload);
    words[0] = words.len() as u32 - 1;
    words
}

pub fn boundary(event_type: u16) -> Vec<u32> {
    buffer(event_type, &[0, 0])
}

/// A physics buffer holding banks after its fixed header.
pub fn physics(banks: &[Vec<u32>]) -> Vec<u32> {
    let mut payload = vec![0; 5];
    banks.iter().for_each(|b| payload.extend_from_slice(b));
    buffer(PHYSICS, &payload)
}

/// A ROC bank: count, ROC word, three preamble words, payload.
pub fn bank(roc: u8, payload: &[u32]) -> Vec<u32> {
    let mut words = vec![4 + payload.len() as u32, (roc as u32) << 16, 0, 0, 0];
    words.extend_from_slice(payload);
    words
}

/// A TW-TDC block holding logical words.
pub fn tdc_block(board: i32, words: &[u32]) -> Vec<u32> {
    let control = ((board + 9) as u32) << 24 | words.len() as u32;
    let mut block = vec![markers().tw_tdc, control];
    block.extend_from_slice(words);
    block
}

/// The logical words of one event: header, hits, then the sequence tag.
pub fn tdc_event(header: u32, hits: &[u32], tag: u32) -> Vec<u32> {
    let mut words = vec![header];
    words.extend_from_slice(hits);
    words.push(tag);
    words
}

/// A header opening an event with no hits and a trigger time of 4 ns.
pub const EMPTY_HEADER: u32 = 0x8010_0000;

/// A header with a trigger time of 100 ns expecting two hits.
pub const HEADER: u32 = 0x8030_0180;

/// Channel 5, 56 ns before [`HEADER`].
pub const HIT_A: u32 = 0x4500_00A0;

/// Channel 7, 4076 ns after wrapping around [`HEADER`].
pub const HIT_B: u32 = 0x4700_01E9;

pub fn trigger_table(types: &[u32]) -> Vec<u32> {
    let mut words = vec![markers().trigger_timestamp, 1 + 2 * types.len() as u32];
    for (i, &t) in types.iter().enumerate() {
        words.extend_from_slice(&[t, i as u32 + 1]);
    }
    words
}

pub fn v1495_block(words: [u32; 4], hits: &[u32]) -> Vec<u32> {
    let mut block = vec![markers().v1495];
    block.extend_from_slice(&words);
    block.extend_from_slice(hits);
    block
}

/// A buffer carrying text packed low byte first.
pub fn text(event_type: u16, s: &str) -> Vec<u32> {
    let mut payload = vec![0, 0];
    payload.extend(s.as_bytes().chunks(4).map(|chunk| {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(bytes)
    }));
    buffer(event_type, &payload)
}

/// Concatenate buffers into a stream.
pub fn stream(buffers: &[Vec<u32>]) -> Vec<u32> {
    buffers.concat()
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub hits: Vec<HitRecord>,
    pub spills: Vec<SpillSummary>,
    /// Hits received per spill, checked when the spill ends.
    open: usize,
}

impl HitSink for Recorder {
    fn add_hit(&mut self, hit: &HitRecord) {
        self.hits.push(*hit);
        self.open += 1;
    }

    fn end_spill(&mut self, summary: &SpillSummary) {
        assert_eq!(summary.hits, self.open);
        self.open = 0;
        self.spills.push(*summary);
    }
}
