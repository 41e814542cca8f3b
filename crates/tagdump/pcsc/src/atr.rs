//! Technology discovery from contactless ATRs
//!
//! Contactless readers synthesize an ATR for the tag in the field (PC/SC
//! Part 3, 3.1.3.2.3). Storage tags carry the PC/SC RID, a standard byte and
//! a two-byte card name; ISO 14443-4 tags carry their historical bytes.

use tagdump_core::{ClassicSize, TagMetadata, Technology, TechnologySet};

use crate::util::match_atr;

/// PC/SC workgroup registered application provider identifier
pub const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

/// ISO 14443 A part 3 in the standard byte
const STANDARD_ISO14443A_3: u8 = 0x03;

/// `3B 8F 80 01 80 4F 0C <RID>`
const STORAGE_PATTERN: [u8; 12] = [
    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06,
];

/// `3B 8n 80 01`: low nibble of T0 is the historical byte count
const ISO14443_4_PATTERN: [u8; 4] = [0x3B, 0x80, 0x80, 0x01];
const ISO14443_4_MASK: [u8; 4] = [0xFF, 0xF0, 0xFF, 0xFF];

/// Technologies and metadata derived from an ATR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtrInfo {
    /// Advertised technologies
    pub technologies: TechnologySet,
    /// Metadata the ATR reveals
    pub metadata: TagMetadata,
}

/// Storage card names of PC/SC Part 3, supplemental document
fn storage_card(name: u16) -> Option<(Technology, Option<ClassicSize>)> {
    let card = match name {
        0x0001 => (Technology::MifareClassic, Some(ClassicSize::OneK)),
        0x0002 => (Technology::MifareClassic, Some(ClassicSize::FourK)),
        0x0026 => (Technology::MifareClassic, Some(ClassicSize::Mini)),
        // MIFARE Plus in security level 1 behaves as Classic
        0x0036 => (Technology::MifareClassic, Some(ClassicSize::TwoK)),
        0x0037 => (Technology::MifareClassic, Some(ClassicSize::FourK)),
        0x0003 | 0x003A => (Technology::MifareUltralight, None),
        _ => return None,
    };
    Some(card)
}

/// Parse an ATR synthesized by a contactless reader
///
/// Returns `None` for contact cards and unknown layouts.
pub fn parse(atr: &[u8]) -> Option<AtrInfo> {
    if match_atr(atr, &STORAGE_PATTERN, None) {
        return parse_storage(atr);
    }
    if match_atr(atr, &ISO14443_4_PATTERN, Some(&ISO14443_4_MASK)) {
        let count = usize::from(atr[1] & 0x0F);
        let historical = atr.get(4..4 + count)?;
        return Some(AtrInfo {
            technologies: TechnologySet::new([Technology::NfcA, Technology::IsoDep]),
            metadata: TagMetadata {
                historical_bytes: Some(historical.to_vec()),
                ..Default::default()
            },
        });
    }
    None
}

fn parse_storage(atr: &[u8]) -> Option<AtrInfo> {
    let [standard, name_hi, name_lo] = atr.get(12..15)? else {
        return None;
    };

    let mut technologies = TechnologySet::default();
    if *standard == STANDARD_ISO14443A_3 {
        technologies.insert(Technology::NfcA);
    }

    let mut metadata = TagMetadata::default();
    if let Some((technology, size)) = storage_card(u16::from_be_bytes([*name_hi, *name_lo])) {
        technologies.insert(technology);
        metadata.classic_size = size;
    }

    Some(AtrInfo {
        technologies,
        metadata,
    })
}
