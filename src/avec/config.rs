//! Decoder configuration.
//!
//! Everything that differs between deployments of the decoder lives here:
//! which ROCs are read out and how many boards each hosts, which ROCs to
//! ignore, the marker constants of the read-out firmware, and the policies
//! applied to incomplete spills.
//!
//! # Examples
//!
//! ```toml
//! min_spill_id = 0
//! ignore_rocs = [25]
//! dead_arm_policy = "terminate-run"
//!
//! [[topology]]
//! roc = 14
//! boards = 5
//!
//! [[topology]]
//! roc = 18
//! boards = 7
//!
//! [markers]
//! tw_tdc = 0xE906F018
//!
//! [v1495]
//! roc = 15
//! ```

use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sans::{
    ascii::{ByteOrder, TARGET_LINE},
    marker::MarkerTable,
};

use super::health::DeadArmPolicy;

/// ROCs read out by the production spectrometer, and their board counts.
const DEFAULT_TOPOLOGY: [(u8, usize); 15] = [
    (12, 6),
    (13, 3),
    (14, 5),
    (15, 6),
    (17, 7),
    (18, 7),
    (19, 6),
    (21, 6),
    (22, 6),
    (23, 7),
    (25, 0),
    (26, 7),
    (28, 5),
    (30, 7),
    (31, 5),
];

/// ROC carrying V1495 data inside physics buffers, which are not decoded.
const DEFAULT_IGNORED_ROC: u8 = 25;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid TOML of the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A ROC is listed twice in the topology.
    #[error("ROC {0} appears more than once in the topology.")]
    DuplicateRoc(u8),
    /// V1495 hits would be attributed to an ignored ROC.
    #[error("V1495 ROC {0} is in the ignore set.")]
    V1495Ignored(u8),
    /// Two markers share a value, so one could never be recognised.
    #[error("Markers `{0}` and `{1}` share a value.")]
    MarkerCollision(&'static str, &'static str),
}

/// A ROC and the number of boards it hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RocTopology {
    pub roc: u8,
    pub boards: usize,
}

/// Decoding of V1495 trigger buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct V1495Config {
    /// ROC the V1495 hits are attributed to.
    pub roc: u8,
}

/// Reading of slow-control buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlowControlConfig {
    /// Line holding the target position.
    pub target_line: usize,
}

impl Default for SlowControlConfig {
    fn default() -> Self {
        Self {
            target_line: TARGET_LINE,
        }
    }
}

/// Configuration of a [`RunController`](super::RunController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    /// ROCs and their board counts, in the order hits are flushed.
    pub topology: Vec<RocTopology>,
    /// ROCs whose banks are skipped unread.
    pub ignore_rocs: BTreeSet<u8>,
    /// Spills with an id no greater than this are neither decoded nor
    /// flushed.
    pub min_spill_id: i32,
    pub markers: MarkerTable,
    /// Decoding of V1495 trigger buffers, if enabled.
    pub v1495: Option<V1495Config>,
    pub dead_arm_policy: DeadArmPolicy,
    pub slow_control: SlowControlConfig,
    /// Byte order of text in spill-counter and slow-control buffers.
    pub ascii_order: ByteOrder,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            topology: DEFAULT_TOPOLOGY
                .iter()
                .map(|&(roc, boards)| RocTopology { roc, boards })
                .collect(),
            ignore_rocs: BTreeSet::from([DEFAULT_IGNORED_ROC]),
            min_spill_id: -1,
            markers: MarkerTable::default(),
            v1495: None,
            dead_arm_policy: DeadArmPolicy::default(),
            slow_control: SlowControlConfig::default(),
            ascii_order: ByteOrder::default(),
        }
    }
}

impl DecoderConfig {
    /// Create a configuration for a topology, with nothing ignored and
    /// defaults elsewhere.
    pub fn new(topology: impl IntoIterator<Item = (u8, usize)>) -> Self {
        Self {
            topology: topology
                .into_iter()
                .map(|(roc, boards)| RocTopology { roc, boards })
                .collect(),
            ignore_rocs: BTreeSet::new(),
            ..Self::default()
        }
    }

    /// Parse and validate a configuration from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        if let Some(t) = self.topology.iter().find(|t| !seen.insert(t.roc)) {
            Err(ConfigError::DuplicateRoc(t.roc))?;
        }

        if let Some(v1495) = self.v1495 {
            if self.ignore_rocs.contains(&v1495.roc) {
                Err(ConfigError::V1495Ignored(v1495.roc))?;
            }
        }

        if let Some((a, b)) = self.markers.collision() {
            Err(ConfigError::MarkerCollision(a, b))?;
        }

        Ok(())
    }

    /// ROCs of the topology that are not ignored, in flush order.
    pub fn active_rocs(&self) -> impl Iterator<Item = RocTopology> + '_ {
        self.topology
            .iter()
            .copied()
            .filter(|t| !self.ignore_rocs.contains(&t.roc))
    }
}
