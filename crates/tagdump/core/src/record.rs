//! Persisted dump records
//!
//! A record pairs the technology name with the captured content and the card
//! family label. Records are pretty-printed JSON named
//! `dmrc_card_dump_<tech>_<millis>.json`.

use serde::{Deserialize, Serialize};

use crate::dump::CardDump;
use crate::probe::ProbeReport;
use crate::tag::Technology;
use crate::{Error, Result};

/// Card family label written into every record
pub const DEFAULT_CARD_FAMILY: &str = "DMRC Metro Card";

/// Content captured from one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Capture {
    /// Memory dump (Classic, Ultralight, NfcA)
    Dump(CardDump),
    /// Probe report (IsoDep)
    Probes(ProbeReport),
}

impl Capture {
    /// Failed units or probes
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Dump(dump) => dump.failure_count(),
            Self::Probes(report) => report.failure_count(),
        }
    }

    /// Technology the content was captured through
    pub const fn technology(&self) -> Technology {
        match self {
            Self::Dump(dump) => dump.technology,
            Self::Probes(_) => Technology::IsoDep,
        }
    }

    /// Memory dump, if this capture holds one
    pub const fn as_dump(&self) -> Option<&CardDump> {
        match self {
            Self::Dump(dump) => Some(dump),
            Self::Probes(_) => None,
        }
    }
}

/// Serialized form of a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpRecord {
    /// Technology the content was captured through
    pub tech: Technology,
    /// Captured content
    pub dump: Capture,
    /// Card family label
    #[serde(rename = "cardType")]
    pub card_type: String,
}

impl DumpRecord {
    /// Create a record
    pub fn new(tech: Technology, dump: Capture, card_type: impl Into<String>) -> Self {
        Self {
            tech,
            dump,
            card_type: card_type.into(),
        }
    }

    /// Pretty JSON with two-space indentation
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// File name for a record captured at `millis` since the Unix epoch
    pub fn file_name(&self, millis: u128) -> String {
        format!("dmrc_card_dump_{}_{millis}.json", self.tech)
    }

    /// Memory dump for the writer
    pub fn into_dump(self) -> Result<CardDump> {
        match self.dump {
            Capture::Dump(dump) => Ok(dump),
            Capture::Probes(_) => Err(Error::DumpMismatch(format!(
                "{} record holds a probe report, not a memory dump",
                self.tech
            ))),
        }
    }
}
