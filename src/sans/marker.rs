//! Marker words introducing sub-banks.

use serde::{Deserialize, Serialize};

/// The payload grammar introduced by a marker word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubBankKind {
    /// Trigger-timestamp table, or inside a V1495 buffer a single
    /// (sequence tag, trigger type) pair.
    TriggerTimestamp,
    /// Windowed time-digitizer block.
    TwTdc,
    /// Charge-integrating digitizer block.
    Qie,
    /// V1495 FPGA TDC block.
    V1495,
}

/// The marker constants of one hardware generation.
///
/// Defaults are those written by the E906 read-out firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerTable {
    pub trigger_timestamp: u32,
    pub tw_tdc: u32,
    pub qie: u32,
    pub v1495: u32,
    /// Filler word padding TDC blocks, skipped without consuming a slot.
    pub filler: u32,
    /// Value found in both the hit-count and common-stop words of a V1495
    /// board that was misread.
    pub v1495_misread: u16,
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self {
            trigger_timestamp: 0xE906_F00F,
            tw_tdc: 0xE906_F018,
            qie: 0xE906_F01B,
            v1495: 0x1337_8EEF,
            filler: 0xE906_E906,
            v1495_misread: 0xD1AD,
        }
    }
}

impl MarkerTable {
    /// Identify the grammar introduced by a word, if it is a marker.
    pub fn classify(&self, word: u32) -> Option<SubBankKind> {
        if word == self.trigger_timestamp {
            Some(SubBankKind::TriggerTimestamp)
        } else if word == self.tw_tdc {
            Some(SubBankKind::TwTdc)
        } else if word == self.qie {
            Some(SubBankKind::Qie)
        } else if word == self.v1495 {
            Some(SubBankKind::V1495)
        } else {
            None
        }
    }

    /// Find a pair of sub-bank markers sharing one value, if any.
    pub fn collision(&self) -> Option<(&'static str, &'static str)> {
        let markers = [
            ("trigger_timestamp", self.trigger_timestamp),
            ("tw_tdc", self.tw_tdc),
            ("qie", self.qie),
            ("v1495", self.v1495),
            ("filler", self.filler),
        ];

        markers.iter().enumerate().find_map(|(i, (a, x))| {
            markers[i + 1..]
                .iter()
                .find(|(_, y)| x == y)
                .map(|(b, _)| (*a, *b))
        })
    }
}
