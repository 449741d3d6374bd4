//! Spill reconstruction over event sources and hit sinks.
//!
//! A [`RunController`] consumes raw buffers one at a time, accumulating the
//! logical events of every board, and flushes a spill's hits to a [`HitSink`]
//! when the next begin-of-spill (or the end of the run) shows the spill to
//! be complete. The [`decode`] function drives a controller from an
//! [`EventSource`] until the stream or the run ends.
//!
//! Sources are provided for in-memory word streams ([`slice::SliceSource`])
//! and for readers ([`reader::ReaderSource`]).

pub mod accumulator;
pub mod config;
pub mod health;
pub mod reader;
pub mod run;
pub mod slice;

use thiserror::Error;

use crate::sans::header::RawBuffer;

pub use config::DecoderConfig;
pub use run::{DiscardReason, Error, RunController, RunReport, RunState, SpillContext, decode};

/// Trigger type reported for events with no trigger-timestamp entry.
pub const TRIGGER_UNKNOWN: i32 = -1;

/// Errors reading from an event source.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The stream has no more buffers.
    #[error("Reached the end of the event stream.")]
    EndOfStream,
    /// A single buffer could not be read; the next one may be.
    #[error("Corrupt event buffer: {0}.")]
    Corrupt(String),
    /// An error from the underlying reader.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Produce raw buffers, one per call.
pub trait EventSource {
    /// Read the next buffer.
    fn read(&mut self) -> Result<RawBuffer, ReadError>;

    /// Release the source. The default implementation does nothing.
    fn close(&mut self) {}
}

/// One decoded hit, as handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub roc_id: u32,
    pub board_id: i32,
    /// The board's native event id where known, otherwise the coda sequence
    /// at which the event was sealed.
    pub sequence_tag: i64,
    pub channel: i32,
    /// Time in nanoseconds.
    pub time: f64,
    /// Trigger type, or [`TRIGGER_UNKNOWN`].
    pub trigger_type: i32,
}

/// State of a spill at the time it was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillSummary {
    pub spill_id: i32,
    pub target_position: i32,
    pub bos_sequence: i64,
    pub eos_sequence: i64,
    /// Number of event indices flushed from every board.
    pub events: usize,
    pub hits: usize,
}

/// Receive hits flushed from complete spills.
///
/// The default implementation of [`HitSink::end_spill`] ignores the summary.
#[allow(unused_variables)]
pub trait HitSink {
    /// Add a hit of the spill being flushed.
    fn add_hit(&mut self, hit: &HitRecord);

    /// Close the spill being flushed, after its last hit.
    fn end_spill(&mut self, summary: &SpillSummary) {}
}

impl HitSink for Vec<HitRecord> {
    fn add_hit(&mut self, hit: &HitRecord) {
        self.push(*hit);
    }
}
