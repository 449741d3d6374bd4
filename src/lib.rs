//! A decoder reconstructing per-board TDC hits from CODA event streams.
//!
//! The crate ingests raw CODA event buffers one at a time and rebuilds, for
//! every read-out crate (ROC) and every time-digitizing board on it, the
//! ordered sequence of logical events and their hits. Hits are handed to a
//! sink spill by spill, once a spill has been closed by a begin-of-spill (or
//! end-of-run) boundary and found to be complete.
//!
//! Most users should begin with [`avec::decode`], which drives an
//! [`avec::RunController`] from an [`avec::EventSource`] into an
//! [`avec::HitSink`]. The stateless word-level decoders it is built on live in
//! the [`sans`] module.
//!
//! ## Logging
//!
//! Anomalies (corrupt buffers, dead ARM cores, truncated banks) and spill
//! boundaries are reported through [`tracing`]. No subscriber is installed by
//! this crate.

pub mod avec;
pub mod sans;
