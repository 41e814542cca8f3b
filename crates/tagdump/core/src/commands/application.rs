//! IsoDep application commands used by the probe runner

use std::fmt;

use bytes::Bytes;

use crate::apdu::Command;
use crate::{Error, Result};

/// NCMC transit application
pub const NCMC_AID: [u8; 7] = [0xA0, 0x00, 0x00, 0x03, 0x97, 0x00, 0x00];

/// NFC Forum Type 4 NDEF application
pub const NDEF_AID: [u8; 7] = [0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];

/// Shortest accepted caller AID in hex characters
pub const MIN_AID_HEX_LEN: usize = 14;

/// Longest AID permitted by ISO/IEC 7816-5
pub const MAX_AID_LEN: usize = 16;

/// Application identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aid(Bytes);

impl Aid {
    /// Create from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parse a caller-supplied AID of at least 14 hex characters
    pub fn from_hex(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.len() < MIN_AID_HEX_LEN {
            return Err(Error::InvalidAid("expected at least 14 hex characters"));
        }
        let bytes = hex::decode(input).map_err(|_| Error::InvalidAid("not a hex string"))?;
        if bytes.len() > MAX_AID_LEN {
            return Err(Error::InvalidAid("longer than 16 bytes"));
        }
        Ok(Self(bytes.into()))
    }

    /// Raw AID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

/// DESFire GET_VERSION, wrapped in ISO 7816 framing
pub const fn get_version() -> Command {
    Command::new_with_le(0x90, 0x60, 0x00, 0x00, 0x00)
}

/// DESFire GET_APPLICATION_IDS, wrapped in ISO 7816 framing
pub const fn get_application_ids() -> Command {
    Command::new_with_le(0x90, 0x6A, 0x00, 0x00, 0x00)
}

/// SELECT by DF name
pub fn select(aid: &Aid) -> Command {
    Command::new_with_data(0x00, 0xA4, 0x04, 0x00, aid.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_frames() {
        let select_ncmc = select(&Aid::new(NCMC_AID.to_vec()));
        assert_eq!(
            select_ncmc.to_bytes().as_ref(),
            hex::decode("00A4040007A0000003970000").unwrap()
        );
        let select_ndef = select(&Aid::new(NDEF_AID.to_vec()));
        assert_eq!(
            select_ndef.to_bytes().as_ref(),
            hex::decode("00A4040007D2760000850101").unwrap()
        );
    }

    #[test]
    fn test_native_frames() {
        assert_eq!(get_version().to_bytes().as_ref(), &[0x90, 0x60, 0x00, 0x00, 0x00]);
        assert_eq!(
            get_application_ids().to_bytes().as_ref(),
            &[0x90, 0x6A, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_aid_validation() {
        assert!(Aid::from_hex("A000000397").is_err());
        assert!(Aid::from_hex("A00000039700ZZ").is_err());
        assert!(Aid::from_hex("A000000397000").is_err());
        assert!(Aid::from_hex(&"A0".repeat(17)).is_err());
        assert_eq!(
            Aid::from_hex("a0000003970001").unwrap().to_string(),
            "A0000003970001"
        );
    }
}
