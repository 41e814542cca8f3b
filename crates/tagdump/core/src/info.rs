//! Card inspection report

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dump::Outcome;
use crate::tag::{Tag, TechnologySet};

/// What a tag tells about itself before any memory is touched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    /// Identifier as uppercase hex
    pub id: String,
    /// Advertised technologies
    pub technologies: TechnologySet,
    /// ATQA
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::tag::opt_hex")]
    pub atqa: Option<Vec<u8>>,
    /// SAK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sak: Option<u8>,
    /// ISO 14443-4 historical bytes
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::tag::opt_hex")]
    pub historical_bytes: Option<Vec<u8>>,
    /// Response to SELECT of the NCMC application, IsoDep tags only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ncmc_select: Option<Outcome>,
}

impl CardInfo {
    /// Report built from discovery data alone
    pub fn from_tag(tag: &Tag) -> Self {
        let metadata = tag.metadata();
        Self {
            id: tag.id_hex(),
            technologies: tag.technologies().clone(),
            atqa: metadata.atqa.clone(),
            sak: metadata.sak,
            historical_bytes: metadata.historical_bytes.clone(),
            ncmc_select: None,
        }
    }
}

impl fmt::Display for CardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "Technologies: {}", self.technologies)?;
        if let Some(atqa) = &self.atqa {
            writeln!(f, "ATQA: {}", hex::encode_upper(atqa))?;
        }
        if let Some(sak) = self.sak {
            writeln!(f, "SAK: {sak:02X}")?;
        }
        if let Some(bytes) = &self.historical_bytes {
            writeln!(f, "Historical bytes: {}", hex::encode_upper(bytes))?;
        }
        match &self.ncmc_select {
            Some(Outcome::Success { data }) => {
                writeln!(f, "NCMC select: {}", hex::encode_upper(data))?;
            }
            Some(Outcome::Failure { reason }) => writeln!(f, "NCMC select failed: {reason}")?,
            None => {}
        }
        Ok(())
    }
}
