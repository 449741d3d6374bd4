//! Marker-driven scanning of bank payloads.

use thiserror::Error;

use super::{
    cursor::{CursorError, WordCursor},
    header::EVENT_HEADER_WORDS,
    marker::{MarkerTable, SubBankKind},
    tdc::{self, BlockOutcome, TdcFlavor},
    time::{TdcHeader, TdcHit, V1495Hit},
    trigger, v1495,
};

/// An error scanning a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    /// A sub-bank ran past the end of its bank.
    #[error("Truncated {kind:?} block: {source}")]
    Truncated {
        kind: SubBankKind,
        #[source]
        source: CursorError,
    },
}

/// How scanning of a bank ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankEnd {
    /// Every word of the bank was scanned.
    Exhausted,
    /// A trigger-timestamp table was read, which closes its bank.
    TriggerTable,
    /// A TDC control word failed its sanity checks and the rest of the bank
    /// was abandoned.
    ArmDead { control: u32 },
}

/// Receive values decoded from a bank.
///
/// Board numbers are published as decoded, after removal of the board offset,
/// and may name boards the receiver does not know about.
///
/// The default implementation of each method ignores received values.
#[allow(unused_variables)]
pub trait FromBank {
    /// Add an entry of a trigger-timestamp table.
    fn add_trigger_type(&mut self, trigger_type: u32) {}
    /// Open the current event of a board with a header word.
    fn open_header(&mut self, board: i32, header: TdcHeader) {}
    /// Add a hit to the current event of a board.
    fn add_hit(&mut self, board: i32, hit: TdcHit) {}
    /// Seal the current event of a board with its sequence tag.
    fn finalize(&mut self, board: i32, tag: u32) {}
    /// Report a TDC control word that failed its sanity checks.
    fn arm_dead(&mut self, control: u32) {}
    /// Set the (sequence tag, trigger type) pair tagging V1495 hits.
    fn set_v1495_tag(&mut self, tag: u32, trigger_type: u32) {}
    /// Add a hit read from a V1495 board.
    fn add_v1495_hit(&mut self, board: i32, hit: V1495Hit, common_stop: u16) {}
}

/// Scan the payload of a ROC bank, publishing to a receiver.
pub fn scan_roc_bank(
    payload: &[u32],
    markers: &MarkerTable,
    o: &mut impl FromBank,
) -> Result<BankEnd, ScanError> {
    let c = &mut WordCursor::new(payload);
    let mut v1495_board = 0;

    while let Ok(word) = c.take() {
        let Some(kind) = markers.classify(word) else {
            continue;
        };

        match kind {
            SubBankKind::TriggerTimestamp => {
                trigger::decode_table(c, o).map_err(truncated(kind))?;
                return Ok(BankEnd::TriggerTable);
            }
            SubBankKind::TwTdc | SubBankKind::Qie => {
                let flavor = match kind {
                    SubBankKind::Qie => TdcFlavor::Qie,
                    _ => TdcFlavor::TwTdc,
                };

                let outcome = tdc::decode_block(c, flavor, markers, o).map_err(truncated(kind))?;
                if let BlockOutcome::ArmDead { control } = outcome {
                    return Ok(BankEnd::ArmDead { control });
                }
            }
            SubBankKind::V1495 => {
                v1495::decode_block(c, v1495_board, markers, o).map_err(truncated(kind))?;
                v1495_board += 1;
            }
        }
    }

    Ok(BankEnd::Exhausted)
}

/// Scan a whole V1495 trigger buffer, publishing to a receiver.
///
/// Here the trigger-timestamp marker introduces a single (sequence tag,
/// trigger type) pair, and boards are numbered in the order their blocks
/// appear. TDC markers are not recognised.
pub fn scan_v1495_buffer(
    words: &[u32],
    markers: &MarkerTable,
    o: &mut impl FromBank,
) -> Result<BankEnd, ScanError> {
    let c = &mut WordCursor::at(words, EVENT_HEADER_WORDS);
    let mut board = 0;

    while let Ok(word) = c.take() {
        match markers.classify(word) {
            Some(kind @ SubBankKind::TriggerTimestamp) => {
                trigger::decode_pair(c, o).map_err(truncated(kind))?;
            }
            Some(kind @ SubBankKind::V1495) => {
                v1495::decode_block(c, board, markers, o).map_err(truncated(kind))?;
                board += 1;
            }
            _ => {}
        }
    }

    Ok(BankEnd::Exhausted)
}

fn truncated(kind: SubBankKind) -> impl Fn(CursorError) -> ScanError {
    move |source| ScanError::Truncated { kind, source }
}
