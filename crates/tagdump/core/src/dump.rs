//! Card dump data model
//!
//! A dump is an ordered list of units (sectors, page groups or a single
//! metadata record). Failures are kept as explicit entries so the unit count
//! always matches the topology.

use serde::{Deserialize, Serialize};

use crate::auth::AuthState;
use crate::tag::Technology;
use crate::topology::Topology;

/// Outcome of reading or writing one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Raw payload bytes
    Success {
        /// Payload, hex encoded in records
        #[serde(with = "hex::serde")]
        data: Vec<u8>,
    },
    /// The unit could not be read
    Failure {
        /// Human-readable cause
        reason: String,
    },
}

impl Outcome {
    /// Successful outcome
    pub fn success(data: impl Into<Vec<u8>>) -> Self {
        Self::Success { data: data.into() }
    }

    /// Failed outcome
    pub fn failure(reason: impl ToString) -> Self {
        Self::Failure {
            reason: reason.to_string(),
        }
    }

    /// Payload when successful
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Whether this is a failure entry
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// One Classic block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDump {
    /// Absolute block number
    pub block: u8,
    /// Read outcome
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// One Classic sector with all its blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorDump {
    /// Sector index
    pub sector: u8,
    /// How the sector was opened
    pub auth: AuthState,
    /// Every block of the sector, trailer included
    pub blocks: Vec<BlockDump>,
}

/// Four consecutive Ultralight pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGroupDump {
    /// First page of the group
    pub page: u8,
    /// Read outcome
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Anti-collision metadata of an NfcA tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDump {
    /// Identifier
    #[serde(with = "hex::serde")]
    pub uid: Vec<u8>,
    /// ATQA
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::tag::opt_hex")]
    pub atqa: Option<Vec<u8>>,
    /// SAK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sak: Option<u8>,
    /// Always `false`: memory contents are not part of this record
    pub exhaustive: bool,
}

/// One record of a dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DumpUnit {
    /// Classic sector
    Sector(SectorDump),
    /// Ultralight page group
    Pages(PageGroupDump),
    /// NfcA metadata
    Metadata(MetadataDump),
}

impl DumpUnit {
    /// Failed reads inside this unit
    ///
    /// An unauthenticated sector counts each of its blocks.
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Sector(sector) => sector.blocks.iter().filter(|b| b.outcome.is_failure()).count(),
            Self::Pages(group) => usize::from(group.outcome.is_failure()),
            Self::Metadata(_) => 0,
        }
    }
}

/// Raw memory captured from one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDump {
    /// Technology the dump was read through
    pub technology: Technology,
    /// Layout the units follow
    pub topology: Topology,
    /// Units in topology order
    pub units: Vec<DumpUnit>,
}

impl CardDump {
    /// Total failed reads across all units
    pub fn failure_count(&self) -> usize {
        self.units.iter().map(DumpUnit::failure_count).sum()
    }

    /// Whether the unit count matches the topology
    pub fn is_complete(&self) -> bool {
        self.units.len() == self.topology.unit_count()
    }
}
