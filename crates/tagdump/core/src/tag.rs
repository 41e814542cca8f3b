//! Discovered tags and the technologies they advertise

use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Protocol family a tag can be addressed through
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    /// MIFARE Classic sector/block memory with Crypto1 authentication
    MifareClassic,
    /// MIFARE Ultralight / NTAG page memory
    MifareUltralight,
    /// Plain ISO 14443-3A
    NfcA,
    /// ISO 14443-4 (APDU capable)
    IsoDep,
    /// Tag that can be formatted to hold NDEF
    NdefFormatable,
}

impl Technology {
    /// Dispatch precedence, highest first
    pub const PRECEDENCE: [Self; 4] = [
        Self::MifareClassic,
        Self::MifareUltralight,
        Self::IsoDep,
        Self::NfcA,
    ];
}

/// Set of technologies advertised by a tag, in advertisement order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnologySet(Vec<Technology>);

impl TechnologySet {
    /// Create a set, dropping duplicate entries
    pub fn new(technologies: impl IntoIterator<Item = Technology>) -> Self {
        let mut set = Self::default();
        for technology in technologies {
            set.insert(technology);
        }
        set
    }

    /// Add a technology if not already present
    pub fn insert(&mut self, technology: Technology) {
        if !self.contains(technology) {
            self.0.push(technology);
        }
    }

    /// Check whether a technology is advertised
    pub fn contains(&self, technology: Technology) -> bool {
        self.0.contains(&technology)
    }

    /// Iterate in advertisement order
    pub fn iter(&self) -> impl Iterator<Item = Technology> + '_ {
        self.0.iter().copied()
    }

    /// Whether nothing is advertised
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Technology> for TechnologySet {
    fn from_iter<I: IntoIterator<Item = Technology>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for TechnologySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// MIFARE Classic memory sizes
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassicSize {
    /// 320 bytes, 5 sectors
    #[display("Mini")]
    Mini,
    /// 1 KiB, 16 sectors
    #[default]
    #[display("1K")]
    OneK,
    /// 2 KiB, 32 sectors
    #[display("2K")]
    TwoK,
    /// 4 KiB, 40 sectors
    #[display("4K")]
    FourK,
}

impl ClassicSize {
    /// Number of sectors for this size
    pub const fn sector_count(&self) -> u8 {
        match self {
            Self::Mini => 5,
            Self::OneK => 16,
            Self::TwoK => 32,
            Self::FourK => 40,
        }
    }
}

/// Anti-collision metadata reported alongside the identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMetadata {
    /// ATQA (answer to request, type A)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex")]
    pub atqa: Option<Vec<u8>>,
    /// SAK (select acknowledge)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sak: Option<u8>,
    /// ISO 14443-4 historical bytes
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex")]
    pub historical_bytes: Option<Vec<u8>>,
    /// MIFARE Classic memory size, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classic_size: Option<ClassicSize>,
}

/// A physical tag present in the field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    id: Vec<u8>,
    technologies: TechnologySet,
    metadata: TagMetadata,
}

impl Tag {
    /// Create a tag from a discovery event
    ///
    /// A tag without identifier bytes cannot be tracked and is rejected.
    pub fn new(id: impl Into<Vec<u8>>, technologies: TechnologySet) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::MissingIdentifier);
        }
        Ok(Self {
            id,
            technologies,
            metadata: TagMetadata::default(),
        })
    }

    /// Attach anti-collision metadata
    pub fn with_metadata(mut self, metadata: TagMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Raw identifier bytes
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Identifier as uppercase hex without separators
    pub fn id_hex(&self) -> String {
        hex::encode_upper(&self.id)
    }

    /// Advertised technologies
    pub const fn technologies(&self) -> &TechnologySet {
        &self.technologies
    }

    /// Anti-collision metadata
    pub const fn metadata(&self) -> &TagMetadata {
        &self.metadata
    }

    /// Classic memory size, defaulting to 1K when the discovery layer did not report one
    pub fn classic_size(&self) -> ClassicSize {
        self.metadata.classic_size.unwrap_or_default()
    }
}

pub(crate) mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
