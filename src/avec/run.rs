//! The run controller and its driver loop.
//!
//! Buffers are consumed strictly in order. Physics buffers add to the
//! accumulated events of each board; administrative buffers update the spill
//! context. A begin-of-spill or end-of-run buffer closes the accumulating
//! spill, which is flushed only if it is known to be complete:
//!
//! - its spill id is above the configured floor,
//! - it is not the partial spill preceding the first boundary,
//! - no ARM core died during it,
//! - an end-of-spill buffer arrived after its begin-of-spill.
//!
//! Whether flushed or not, every accumulator and dead flag is then reset.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::sans::{
    ascii,
    bank::BankWalker,
    header::{EventType, RawBuffer},
    scan::{self, BankEnd, FromBank},
    time::{TdcHeader, TdcHit, V1495Hit},
};

use super::{
    EventSource, HitRecord, HitSink, ReadError, SpillSummary, TRIGGER_UNKNOWN,
    accumulator::{BoardAccumulator, Hit, RocAccumulator, V1495Accumulator},
    config::{ConfigError, DecoderConfig},
    health::{DeadArmPolicy, HealthMonitor},
};

/// Errors ending a decoding run early.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The event source failed.
    #[error("Failed to read from the event source: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the controller is in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Events are accumulating, but no boundary has been seen yet, so the
    /// spill they belong to started before the stream did.
    AwaitingFirstBoundary,
    Accumulating,
    /// A complete spill is being handed to the sink.
    Flushing,
    /// The run has ended; further buffers are ignored.
    Terminated,
}

/// Why a spill was closed without being flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    FirstBoundary,
    BelowSpillFloor,
    ArmDead,
    NoEndOfSpill,
    EndOfStream,
}

/// The state of the spill being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillContext {
    pub spill_id: i32,
    pub target_position: i32,
    /// Coda sequence of the last begin-of-spill.
    pub bos_sequence: i64,
    /// Coda sequence of the last end-of-spill.
    pub eos_sequence: i64,
    pub first_boundary_seen: bool,
    pub health: HealthMonitor,
}

/// Counters over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub buffers: u64,
    pub corrupt: u64,
    pub spills_flushed: u64,
    pub spills_discarded: u64,
    pub hits: u64,
    pub state: RunState,
}

/// Reconstructs spills from a sequence of raw buffers.
#[derive(Debug, Clone)]
pub struct RunController {
    config: DecoderConfig,
    state: RunState,
    spill: SpillContext,
    rocs: Vec<RocAccumulator>,
    roc_index: BTreeMap<u8, usize>,
    triggers: Vec<i32>,
    v1495: V1495Accumulator,
    coda_sequence: i64,
    report: RunReport,
}

impl RunController {
    pub fn new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let rocs: Vec<_> = config
            .active_rocs()
            .map(|t| RocAccumulator::new(t.roc, t.boards))
            .collect();

        let roc_index = rocs
            .iter()
            .enumerate()
            .map(|(i, roc)| (roc.roc_id(), i))
            .collect();

        let health = HealthMonitor::new(rocs.iter().map(RocAccumulator::roc_id), config.dead_arm_policy);

        Ok(Self {
            state: RunState::AwaitingFirstBoundary,
            spill: SpillContext {
                spill_id: 0,
                target_position: 0,
                bos_sequence: 0,
                eos_sequence: 0,
                first_boundary_seen: false,
                health,
            },
            rocs,
            roc_index,
            triggers: Vec::new(),
            v1495: V1495Accumulator::default(),
            coda_sequence: 1,
            report: RunReport {
                buffers: 0,
                corrupt: 0,
                spills_flushed: 0,
                spills_discarded: 0,
                hits: 0,
                state: RunState::AwaitingFirstBoundary,
            },
            config,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn spill(&self) -> &SpillContext {
        &self.spill
    }

    /// The sequence number the next buffer will be given.
    pub fn coda_sequence(&self) -> i64 {
        self.coda_sequence
    }

    /// Accumulators of the active ROCs, in flush order.
    pub fn rocs(&self) -> &[RocAccumulator] {
        &self.rocs
    }

    pub fn roc(&self, roc_id: u8) -> Option<&RocAccumulator> {
        self.roc_index.get(&roc_id).map(|&i| &self.rocs[i])
    }

    /// Trigger types queued for the accumulating spill, in event order.
    pub fn trigger_types(&self) -> &[i32] {
        &self.triggers
    }

    pub fn v1495(&self) -> &V1495Accumulator {
        &self.v1495
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            state: self.state,
            ..self.report
        }
    }

    /// Consume one buffer, flushing to a sink if it closes a complete spill.
    ///
    /// Returns the state of the run after the buffer.
    pub fn consume(&mut self, buffer: &RawBuffer, sink: &mut impl HitSink) -> RunState {
        if self.state == RunState::Terminated {
            tracing::debug!("run terminated, ignoring buffer");
            return self.state;
        }

        self.report.buffers += 1;

        match buffer.event_type() {
            t @ (EventType::BeginOfSpill | EventType::EndOfRun) => self.close_spill(t, sink),
            EventType::EndOfSpill => self.spill.eos_sequence = self.coda_sequence,
            EventType::SpillCounter => {
                self.spill.spill_id = ascii::decode_spill_id(buffer.words(), self.config.ascii_order);
                tracing::debug!(spill_id = self.spill.spill_id, "spill counter");
            }
            EventType::SlowControl => {
                let line = self.config.slow_control.target_line;
                match ascii::decode_target_position(buffer.words(), self.config.ascii_order, line) {
                    Some(position) => self.spill.target_position = position,
                    None => tracing::debug!("slow control without a target position"),
                }
            }
            EventType::V1495Trigger => self.decode_v1495(buffer),
            EventType::Physics(_) => self.decode_physics(buffer),
            EventType::Other(_) => {}
        }

        self.coda_sequence += 1;
        self.state
    }

    /// End the run at the end of the event stream, discarding the spill being
    /// accumulated.
    pub fn end_of_stream(&mut self) {
        if self.state == RunState::Terminated {
            return;
        }

        if self.spill.first_boundary_seen {
            self.discard(DiscardReason::EndOfStream);
        }

        self.reset_spill();
        self.terminate();
    }

    /// Consume buffers from a source until the stream or the run ends.
    ///
    /// Corrupt buffers are skipped. The source is closed before returning.
    pub fn run(
        &mut self,
        source: &mut impl EventSource,
        sink: &mut impl HitSink,
    ) -> Result<RunReport, Error> {
        while self.state != RunState::Terminated {
            match source.read() {
                Ok(buffer) => {
                    self.consume(&buffer, sink);
                }
                Err(ReadError::EndOfStream) => self.end_of_stream(),
                Err(ReadError::Corrupt(reason)) => {
                    tracing::warn!(coda_sequence = self.coda_sequence, "skipping corrupt buffer: {reason}");
                    self.report.corrupt += 1;
                }
                Err(ReadError::Io(err)) => {
                    source.close();
                    Err(err)?;
                }
            }
        }

        source.close();
        Ok(self.report())
    }

    fn decode_physics(&mut self, buffer: &RawBuffer) {
        if self.spill.spill_id <= self.config.min_spill_id {
            tracing::trace!(spill_id = self.spill.spill_id, "below spill floor, not decoding");
            return;
        }

        if self.spill.health.any_dead() {
            tracing::trace!("ARM dead, not decoding");
            return;
        }

        let coda_sequence = self.coda_sequence;
        let Self {
            config,
            spill,
            rocs,
            roc_index,
            triggers,
            v1495,
            ..
        } = self;

        v1495.begin_buffer();

        for bank in BankWalker::new(buffer.words(), &config.ignore_rocs) {
            let bank = match bank {
                Ok(bank) => bank,
                Err(err) => {
                    tracing::warn!(coda_sequence, "{err}");
                    break;
                }
            };

            if bank.truncated {
                tracing::warn!(roc_id = bank.roc_id, coda_sequence, "bank runs past end of buffer");
            }

            let Some(&index) = roc_index.get(&bank.roc_id) else {
                tracing::trace!(roc_id = bank.roc_id, "bank from unknown ROC, watching for dead ARM only");
                let mut o = DeadArmWatch {
                    roc_id: bank.roc_id,
                    health: &mut spill.health,
                };
                if let Err(err) = scan::scan_roc_bank(bank.payload, &config.markers, &mut o) {
                    tracing::trace!(roc_id = bank.roc_id, "{err}");
                }
                continue;
            };

            let mut o = BankReceiver {
                roc_id: bank.roc_id,
                roc: Some(&mut rocs[index]),
                health: &mut spill.health,
                triggers: &mut *triggers,
                v1495: &mut *v1495,
                coda_sequence,
            };

            match scan::scan_roc_bank(bank.payload, &config.markers, &mut o) {
                Ok(BankEnd::ArmDead { control }) => {
                    tracing::debug!(roc_id = bank.roc_id, control, "abandoned bank");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(roc_id = bank.roc_id, coda_sequence, "{err}"),
            }
        }

        let held = v1495.end_buffer(coda_sequence);
        if held > 0 {
            tracing::debug!(held, coda_sequence, "V1495 hits in physics buffer have no trigger tag");
        }
    }

    fn decode_v1495(&mut self, buffer: &RawBuffer) {
        let Some(v1495) = self.config.v1495 else {
            return;
        };

        if self.spill.health.any_dead() {
            return;
        }

        self.v1495.begin_buffer();

        let mut o = BankReceiver {
            roc_id: v1495.roc,
            roc: None,
            health: &mut self.spill.health,
            triggers: &mut self.triggers,
            v1495: &mut self.v1495,
            coda_sequence: self.coda_sequence,
        };

        if let Err(err) = scan::scan_v1495_buffer(buffer.words(), &self.config.markers, &mut o) {
            tracing::warn!(roc_id = v1495.roc, coda_sequence = self.coda_sequence, "{err}");
        }

        let held = self.v1495.end_buffer(self.coda_sequence);
        if held > 0 {
            tracing::debug!(held, coda_sequence = self.coda_sequence, "V1495 buffer has no trigger tag");
        }
    }

    fn close_spill(&mut self, boundary: EventType, sink: &mut impl HitSink) {
        match self.discard_reason() {
            None => {
                self.state = RunState::Flushing;
                self.flush(sink);
                self.spill.target_position = 0;
            }
            Some(reason) => self.discard(reason),
        }

        let dead = self.spill.health.any_dead();
        self.spill.first_boundary_seen = true;
        self.reset_spill();

        if dead && self.spill.health.policy() == DeadArmPolicy::TerminateRun {
            tracing::warn!(spill_id = self.spill.spill_id, "ending run after dead ARM");
            self.terminate();
            return;
        }

        if boundary == EventType::BeginOfSpill {
            self.spill.bos_sequence = self.coda_sequence;
            self.state = RunState::Accumulating;
        } else {
            self.terminate();
        }
    }

    fn discard_reason(&self) -> Option<DiscardReason> {
        let spill = &self.spill;

        if !spill.first_boundary_seen {
            Some(DiscardReason::FirstBoundary)
        } else if spill.spill_id <= self.config.min_spill_id {
            Some(DiscardReason::BelowSpillFloor)
        } else if spill.health.any_dead() {
            Some(DiscardReason::ArmDead)
        } else if spill.eos_sequence <= spill.bos_sequence {
            Some(DiscardReason::NoEndOfSpill)
        } else {
            None
        }
    }

    fn discard(&mut self, reason: DiscardReason) {
        match reason {
            DiscardReason::FirstBoundary => {
                tracing::debug!("discarding events preceding the first boundary");
            }
            DiscardReason::EndOfStream => {
                tracing::warn!(spill_id = self.spill.spill_id, "discarding partial spill at end of stream");
                self.report.spills_discarded += 1;
            }
            _ => {
                tracing::info!(
                    spill_id = self.spill.spill_id,
                    bos = self.spill.bos_sequence,
                    eos = self.spill.eos_sequence,
                    ?reason,
                    "spill discarded"
                );
                self.report.spills_discarded += 1;
            }
        }
    }

    fn flush(&mut self, sink: &mut impl HitSink) {
        let events = self
            .rocs
            .iter()
            .filter_map(RocAccumulator::common_completed)
            .min()
            .unwrap_or(0);

        let mut hits = 0;

        for index in 0..events {
            let trigger_type = self.triggers.get(index).copied().unwrap_or(TRIGGER_UNKNOWN);

            for roc in &self.rocs {
                for board in roc.boards() {
                    let Some(event) = board.completed().get(index) else {
                        continue;
                    };

                    for hit in event.hits() {
                        sink.add_hit(&HitRecord {
                            roc_id: roc.roc_id() as u32,
                            board_id: board.board_id(),
                            sequence_tag: event.sequence_tag(),
                            channel: hit.channel,
                            time: hit.time,
                            trigger_type,
                        });
                        hits += 1;
                    }
                }
            }
        }

        for record in self.v1495.hits() {
            sink.add_hit(&HitRecord {
                roc_id: record.roc_id as u32,
                board_id: record.board,
                sequence_tag: record.sequence_tag,
                channel: record.hit.channel,
                time: record.hit.time,
                trigger_type: record.trigger_type,
            });
            hits += 1;
        }

        let pending = self.v1495.pending().len();
        if pending > 0 {
            tracing::warn!(pending, "dropping V1495 hits from buffers without a trigger tag");
        }

        for roc in &self.rocs {
            for check in roc.check() {
                tracing::debug!(
                    roc_id = roc.roc_id(),
                    board_id = check.board_id,
                    completed = check.completed,
                    sequence_jumps = check.sequence_jumps,
                    hit_mismatches = check.hit_mismatches,
                    "board check"
                );
            }
        }

        let summary = SpillSummary {
            spill_id: self.spill.spill_id,
            target_position: self.spill.target_position,
            bos_sequence: self.spill.bos_sequence,
            eos_sequence: self.spill.eos_sequence,
            events,
            hits,
        };

        sink.end_spill(&summary);

        tracing::info!(
            spill_id = summary.spill_id,
            target_position = summary.target_position,
            bos = summary.bos_sequence,
            eos = summary.eos_sequence,
            events,
            hits,
            "spill flushed"
        );

        self.report.spills_flushed += 1;
        self.report.hits += hits as u64;
    }

    fn reset_spill(&mut self) {
        self.rocs.iter_mut().for_each(RocAccumulator::reset);
        self.spill.health.clear();
        self.triggers.clear();
        self.v1495.reset();
    }

    fn terminate(&mut self) {
        tracing::info!(
            buffers = self.report.buffers,
            spills_flushed = self.report.spills_flushed,
            spills_discarded = self.report.spills_discarded,
            "run terminated"
        );
        self.state = RunState::Terminated;
    }
}

/// Decode a whole event stream into a sink.
///
/// This function is also re-exported as `coda_tdc::avec::decode`.
pub fn decode(
    source: &mut impl EventSource,
    sink: &mut impl HitSink,
    config: DecoderConfig,
) -> Result<RunReport, Error> {
    RunController::new(config)?.run(source, sink)
}

/// Receiver applying the values decoded from one bank to the controller's
/// state.
struct BankReceiver<'a> {
    roc_id: u8,
    roc: Option<&'a mut RocAccumulator>,
    health: &'a mut HealthMonitor,
    triggers: &'a mut Vec<i32>,
    v1495: &'a mut V1495Accumulator,
    coda_sequence: i64,
}

impl BankReceiver<'_> {
    fn board(&mut self, board: i32) -> Option<&mut BoardAccumulator> {
        let found = self.roc.as_deref_mut()?.board_mut(board);
        if found.is_none() {
            tracing::debug!(roc_id = self.roc_id, board, "word for unknown board");
        }

        found
    }
}

impl FromBank for BankReceiver<'_> {
    fn add_trigger_type(&mut self, trigger_type: u32) {
        self.triggers.push(trigger_type as i32);
    }

    fn open_header(&mut self, board: i32, header: TdcHeader) {
        let coda_sequence = self.coda_sequence;
        if let Some(b) = self.board(board) {
            b.open_header(header, coda_sequence);
        }
    }

    fn add_hit(&mut self, board: i32, hit: TdcHit) {
        if let Some(b) = self.board(board) {
            b.add_hit(hit);
        }
    }

    fn finalize(&mut self, board: i32, tag: u32) {
        let coda_sequence = self.coda_sequence;
        if let Some(b) = self.board(board) {
            b.finalize(coda_sequence, tag);
        }
    }

    fn arm_dead(&mut self, control: u32) {
        self.health.flag(self.roc_id, control);
    }

    fn set_v1495_tag(&mut self, tag: u32, trigger_type: u32) {
        self.v1495.set_tag(tag, trigger_type);
    }

    fn add_v1495_hit(&mut self, board: i32, hit: V1495Hit, common_stop: u16) {
        let hit = Hit {
            channel: hit.channel(),
            time: hit.time(common_stop),
        };
        self.v1495.add_hit(self.roc_id, board, hit);
    }
}

/// Scans banks of ROCs outside the topology for dead ARMs only.
struct DeadArmWatch<'a> {
    roc_id: u8,
    health: &'a mut HealthMonitor,
}

impl FromBank for DeadArmWatch<'_> {
    fn arm_dead(&mut self, control: u32) {
        self.health.flag(self.roc_id, control);
    }
}
