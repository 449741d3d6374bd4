//! Per-board accumulation of logical events.

use std::mem;

use crate::sans::time::{HIT_COUNT_OVERFLOW, TdcHeader, TdcHit};

/// Native sequence tags further apart than this many coda sequences are not
/// compared by [`BoardAccumulator::check`].
const SEQUENCE_JUMP_WINDOW: i64 = 9000;

/// A decoded hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub channel: i32,
    /// Time in nanoseconds.
    pub time: f64,
}

/// The hits a board recorded for one trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalEvent {
    coda_sequence: i64,
    native_tag: Option<i64>,
    trigger_time: f64,
    expected_hits: i32,
    hits: Vec<Hit>,
}

impl Default for LogicalEvent {
    fn default() -> Self {
        Self {
            coda_sequence: -1,
            native_tag: None,
            trigger_time: -1.0,
            expected_hits: 0,
            hits: Vec::new(),
        }
    }
}

impl LogicalEvent {
    /// The coda sequence of the buffer that last opened or sealed this event,
    /// or -1.
    pub fn coda_sequence(&self) -> i64 {
        self.coda_sequence
    }

    /// The board's own event id, once sealed.
    pub fn native_tag(&self) -> Option<i64> {
        self.native_tag
    }

    /// The native tag if known, otherwise the coda sequence.
    pub fn sequence_tag(&self) -> i64 {
        self.native_tag.unwrap_or(self.coda_sequence)
    }

    /// Trigger time from the header word, or -1 if no header was seen.
    pub fn trigger_time(&self) -> f64 {
        self.trigger_time
    }

    pub fn expected_hits(&self) -> i32 {
        self.expected_hits
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Whether the hit count matches the header, allowing for a saturated
    /// hit counter.
    pub fn is_consistent(&self) -> bool {
        self.hits.len() == HIT_COUNT_OVERFLOW
            || i32::try_from(self.hits.len()).is_ok_and(|n| n == self.expected_hits)
    }

    fn open_header(&mut self, header: TdcHeader, coda_sequence: i64) {
        self.trigger_time = header.trigger_time();
        self.expected_hits = header.expected_hits();
        self.coda_sequence = coda_sequence;
    }

    fn add_hit(&mut self, hit: TdcHit) {
        self.hits.push(Hit {
            channel: hit.channel(),
            time: hit.time(self.trigger_time),
        });
    }
}

/// Consistency counters for one board, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardCheck {
    pub board_id: i32,
    pub completed: usize,
    /// Consecutive events whose native tags do not step by one.
    pub sequence_jumps: usize,
    /// Events whose hit count disagrees with their header.
    pub hit_mismatches: usize,
}

/// The logical events of one board, oldest first.
///
/// There is always exactly one open event, which receives headers and hits
/// until it is sealed by [`BoardAccumulator::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoardAccumulator {
    board_id: i32,
    completed: Vec<LogicalEvent>,
    current: LogicalEvent,
}

impl BoardAccumulator {
    pub fn new(board_id: i32) -> Self {
        Self {
            board_id,
            completed: Vec::new(),
            current: LogicalEvent::default(),
        }
    }

    pub fn board_id(&self) -> i32 {
        self.board_id
    }

    /// Sealed events, oldest first.
    pub fn completed(&self) -> &[LogicalEvent] {
        &self.completed
    }

    /// The open event.
    pub fn current(&self) -> &LogicalEvent {
        &self.current
    }

    pub fn open_header(&mut self, header: TdcHeader, coda_sequence: i64) {
        self.current.open_header(header, coda_sequence);
    }

    pub fn add_hit(&mut self, hit: TdcHit) {
        self.current.add_hit(hit);
    }

    /// Seal the open event with its native tag and open the next one.
    pub fn finalize(&mut self, coda_sequence: i64, tag: u32) {
        let mut event = mem::take(&mut self.current);
        event.coda_sequence = coda_sequence;
        event.native_tag = Some(tag as i64);

        self.completed.push(event);
    }

    /// Drop every event, leaving a single empty open event.
    pub fn reset(&mut self) {
        self.completed.clear();
        self.current = LogicalEvent::default();
    }

    pub fn check(&self) -> BoardCheck {
        let sequence_jumps = self
            .completed
            .windows(2)
            .filter(|pair| {
                let (a, b) = (&pair[0], &pair[1]);
                match (a.native_tag, b.native_tag) {
                    (Some(x), Some(y)) if x > 0 && y > 0 => {
                        y - x != 1 && b.coda_sequence - a.coda_sequence < SEQUENCE_JUMP_WINDOW
                    }
                    _ => false,
                }
            })
            .count();

        let hit_mismatches = self.completed.iter().filter(|e| !e.is_consistent()).count();

        BoardCheck {
            board_id: self.board_id,
            completed: self.completed.len(),
            sequence_jumps,
            hit_mismatches,
        }
    }
}

/// The boards of one ROC.
#[derive(Debug, Clone, PartialEq)]
pub struct RocAccumulator {
    roc_id: u8,
    boards: Vec<BoardAccumulator>,
}

impl RocAccumulator {
    /// Create a ROC with boards numbered from zero.
    pub fn new(roc_id: u8, boards: usize) -> Self {
        Self {
            roc_id,
            boards: (0..boards as i32).map(BoardAccumulator::new).collect(),
        }
    }

    pub fn roc_id(&self) -> u8 {
        self.roc_id
    }

    pub fn boards(&self) -> &[BoardAccumulator] {
        &self.boards
    }

    pub fn board(&self, board: i32) -> Option<&BoardAccumulator> {
        usize::try_from(board).ok().and_then(|i| self.boards.get(i))
    }

    pub fn board_mut(&mut self, board: i32) -> Option<&mut BoardAccumulator> {
        usize::try_from(board).ok().and_then(|i| self.boards.get_mut(i))
    }

    /// The number of sealed events held by every board, or `None` for a ROC
    /// without boards.
    pub fn common_completed(&self) -> Option<usize> {
        self.boards.iter().map(|b| b.completed().len()).min()
    }

    pub fn reset(&mut self) {
        self.boards.iter_mut().for_each(BoardAccumulator::reset);
    }

    pub fn check(&self) -> Vec<BoardCheck> {
        self.boards.iter().map(BoardAccumulator::check).collect()
    }
}

/// A V1495 hit tagged with the trigger it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct V1495Record {
    pub roc_id: u8,
    pub board: i32,
    pub sequence_tag: i64,
    pub trigger_type: i32,
    pub hit: Hit,
}

/// The V1495 hits of one spill.
///
/// A (sequence tag, trigger type) pair tags every hit of the buffer it was
/// read from, wherever in the buffer it appears. Hits are staged while a
/// buffer is scanned and tagged once the scan ends. Hits from a buffer
/// without a pair are held back as pending and are never flushed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct V1495Accumulator {
    tag: Option<(u32, u32)>,
    staged: Vec<(u8, i32, Hit)>,
    hits: Vec<V1495Record>,
    pending: Vec<(u8, i32, Hit)>,
}

impl V1495Accumulator {
    /// The pair of the buffer being scanned, or of the last one scanned.
    pub fn tag(&self) -> Option<(u32, u32)> {
        self.tag
    }

    /// Start scanning a buffer, forgetting the previous buffer's pair.
    pub fn begin_buffer(&mut self) {
        self.tag = None;
        self.staged.clear();
    }

    pub fn set_tag(&mut self, tag: u32, trigger_type: u32) {
        self.tag = Some((tag, trigger_type));
    }

    /// Stage a hit of the buffer being scanned.
    pub fn add_hit(&mut self, roc_id: u8, board: i32, hit: Hit) {
        self.staged.push((roc_id, board, hit));
    }

    /// Finish scanning a buffer, tagging its staged hits with its pair.
    ///
    /// A zero sequence tag falls back to the coda sequence of the buffer.
    /// Returns the number of hits held back for lack of a pair.
    pub fn end_buffer(&mut self, coda_sequence: i64) -> usize {
        match self.tag {
            Some((tag, trigger_type)) => {
                let sequence_tag = if tag != 0 { tag as i64 } else { coda_sequence };
                let records = self.staged.drain(..).map(|(roc_id, board, hit)| V1495Record {
                    roc_id,
                    board,
                    sequence_tag,
                    trigger_type: trigger_type as i32,
                    hit,
                });
                self.hits.extend(records);
                0
            }
            None => {
                let held = self.staged.len();
                self.pending.append(&mut self.staged);
                held
            }
        }
    }

    /// Tagged hits, in arrival order.
    pub fn hits(&self) -> &[V1495Record] {
        &self.hits
    }

    /// Hits from buffers without a pair, which will not be flushed.
    pub fn pending(&self) -> &[(u8, i32, Hit)] {
        &self.pending
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
