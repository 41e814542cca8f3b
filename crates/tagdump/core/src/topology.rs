//! Static memory topology per technology
//!
//! A dump always has exactly [`Topology::unit_count`] records, whatever
//! happened while reading.

use serde::{Deserialize, Serialize};

use crate::commands::storage::PAGES_PER_READ;
use crate::tag::{ClassicSize, Tag, Technology};

/// Pages read by default from an Ultralight-family tag
pub const DEFAULT_ULTRALIGHT_PAGES: u16 = 64;

/// Highest page count addressable with one-byte page numbers
pub const MAX_ULTRALIGHT_PAGES: u16 = 256;

/// Memory layout of a tag for a negotiated technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum Topology {
    /// Sector/block memory
    Classic {
        /// Card size
        size: ClassicSize,
    },
    /// Page memory read four pages at a time
    Ultralight {
        /// Total pages covered
        pages: u16,
    },
    /// A single metadata record (NfcA)
    Metadata,
}

impl Topology {
    /// Topology for a negotiated technology; `None` for technologies without bulk memory
    pub fn for_tag(tag: &Tag, technology: Technology, ultralight_pages: u16) -> Option<Self> {
        match technology {
            Technology::MifareClassic => Some(Self::Classic {
                size: tag.classic_size(),
            }),
            Technology::MifareUltralight => Some(Self::Ultralight {
                pages: ultralight_pages.min(MAX_ULTRALIGHT_PAGES),
            }),
            Technology::NfcA => Some(Self::Metadata),
            Technology::IsoDep | Technology::NdefFormatable => None,
        }
    }

    /// Number of records a complete dump holds
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Classic { size } => usize::from(size.sector_count()),
            Self::Ultralight { pages } => page_groups(*pages).count(),
            Self::Metadata => 1,
        }
    }
}

/// Blocks in a Classic sector: 4 in the first 32 sectors, 16 above
pub const fn block_count_in_sector(sector: u8) -> u8 {
    if sector < 32 { 4 } else { 16 }
}

/// First block of a Classic sector
pub const fn sector_to_block(sector: u8) -> u8 {
    if sector < 32 {
        sector * 4
    } else {
        128 + (sector - 32) * 16
    }
}

/// Trailer (keys and access bits) block of a Classic sector
pub const fn trailer_block(sector: u8) -> u8 {
    sector_to_block(sector) + block_count_in_sector(sector) - 1
}

/// First page of every four-page read group
pub fn page_groups(pages: u16) -> impl Iterator<Item = u8> {
    (0..pages.min(MAX_ULTRALIGHT_PAGES))
        .step_by(usize::from(PAGES_PER_READ))
        .map(|page| page as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{TagMetadata, TechnologySet};

    #[test]
    fn test_classic_addressing() {
        assert_eq!(sector_to_block(0), 0);
        assert_eq!(sector_to_block(15), 60);
        assert_eq!(trailer_block(15), 63);
        assert_eq!(sector_to_block(32), 128);
        assert_eq!(block_count_in_sector(32), 16);
        assert_eq!(trailer_block(39), 255);
    }

    #[test]
    fn test_unit_counts() {
        let tag = Tag::new(vec![1, 2, 3, 4], TechnologySet::default())
            .unwrap()
            .with_metadata(TagMetadata {
                classic_size: Some(ClassicSize::FourK),
                ..Default::default()
            });

        let classic = Topology::for_tag(&tag, Technology::MifareClassic, 64).unwrap();
        assert_eq!(classic.unit_count(), 40);

        let ultralight = Topology::for_tag(&tag, Technology::MifareUltralight, 64).unwrap();
        assert_eq!(ultralight.unit_count(), 16);

        let ntag = Topology::Ultralight { pages: 231 };
        assert_eq!(ntag.unit_count(), 58);

        assert_eq!(Topology::Metadata.unit_count(), 1);
        assert!(Topology::for_tag(&tag, Technology::IsoDep, 64).is_none());
    }

    #[test]
    fn test_page_groups() {
        let groups: Vec<u8> = page_groups(16).collect();
        assert_eq!(groups, vec![0, 4, 8, 12]);
        assert_eq!(page_groups(1000).last(), Some(252));
    }
}
