//! Stateless word-level decoders.
//!
//! This module is intended for applications that need to drive decoding
//! themselves. See [`crate::avec`] for the run controller that ties these
//! decoders to accumulated spill state.
//!
//! # Architecture
//!
//! Every decoder reads 32-bit words through a [`cursor::WordCursor`] bounded
//! to the range it is allowed to see, so a malformed length field can at
//! worst end decoding of its own bank early. Nothing here retains state
//! between calls.
//!
//! A physics buffer is split by [`bank::BankWalker`] into per-ROC banks.
//! Each bank payload is then scanned word by word by [`scan::scan_roc_bank`],
//! which recognises marker words from a [`marker::MarkerTable`] and hands the
//! following payload to the matching grammar:
//!
//! - [`trigger`] for trigger-timestamp tables,
//! - [`tdc`] for TW-TDC and QIE blocks,
//! - [`v1495`] for V1495 FPGA TDC blocks.
//!
//! Decoded values are published to a [`scan::FromBank`] receiver, which is
//! where the caller keeps whatever state it needs. Words that match no marker
//! are skipped one at a time, so payloads written by newer firmware never
//! desynchronise the blocks around them.
//!
//! Some areas of the decoding process are not represented here and must be
//! handled by the caller:
//!
//! - Classifying whole buffers by [`header::EventType`] and deciding which of
//! them to scan.
//!
//! - Tracking spill boundaries and deciding when accumulated events are
//! complete.

pub mod ascii;
pub mod bank;
pub mod cursor;
pub mod header;
pub mod marker;
pub mod scan;
pub mod tdc;
pub mod time;
pub mod trigger;
pub mod v1495;
