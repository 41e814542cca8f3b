//! PC/SC storage-card pseudo-APDUs (PC/SC Part 3, class `FF`)
//!
//! Contactless readers expose MIFARE Classic and Ultralight memory through
//! these commands; the reader performs the Crypto1 exchange itself.

use crate::apdu::Command;
use crate::keys::{Key, KeySlot};

/// Bytes per MIFARE Classic block
pub const CLASSIC_BLOCK_SIZE: usize = 16;

/// Bytes per Ultralight page
pub const ULTRALIGHT_PAGE_SIZE: usize = 4;

/// Pages returned by one Ultralight READ
pub const PAGES_PER_READ: u8 = 4;

/// Reader key slot used for loaded keys
pub const READER_KEY_NUMBER: u8 = 0x00;

const CLA: u8 = 0xFF;
const INS_GET_DATA: u8 = 0xCA;
const INS_LOAD_KEY: u8 = 0x82;
const INS_GENERAL_AUTHENTICATE: u8 = 0x86;
const INS_READ_BINARY: u8 = 0xB0;
const INS_UPDATE_BINARY: u8 = 0xD6;

/// GET DATA for the tag UID
pub const fn get_uid() -> Command {
    Command::new_with_le(CLA, INS_GET_DATA, 0x00, 0x00, 0x00)
}

/// LOAD KEYS into a volatile reader key slot
pub fn load_key(key: &Key, key_number: u8) -> Command {
    Command::new_with_data(CLA, INS_LOAD_KEY, 0x00, key_number, key.as_bytes().to_vec())
}

/// GENERAL AUTHENTICATE a block with a previously loaded key
pub fn authenticate(block: u8, slot: KeySlot, key_number: u8) -> Command {
    Command::new_with_data(
        CLA,
        INS_GENERAL_AUTHENTICATE,
        0x00,
        0x00,
        vec![0x01, 0x00, block, slot.key_type(), key_number],
    )
}

/// READ BINARY of one Classic block or four Ultralight pages
pub const fn read_binary(address: u8, length: u8) -> Command {
    Command::new_with_le(CLA, INS_READ_BINARY, 0x00, address, length)
}

/// UPDATE BINARY of one Classic block or one Ultralight page
pub fn update_binary(address: u8, data: &[u8]) -> Command {
    Command::new_with_data(CLA, INS_UPDATE_BINARY, 0x00, address, data.to_vec())
}

/// Whether a frame is a storage-card pseudo-APDU
pub(crate) fn is_storage_frame(frame: &[u8]) -> bool {
    frame.first() == Some(&CLA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::FACTORY_KEY;

    #[test]
    fn test_storage_frames() {
        assert_eq!(get_uid().to_bytes().as_ref(), &[0xFF, 0xCA, 0x00, 0x00, 0x00]);
        assert_eq!(
            load_key(&FACTORY_KEY, 0).to_bytes().as_ref(),
            hex::decode("FF82000006FFFFFFFFFFFF").unwrap()
        );
        assert_eq!(
            authenticate(0x0C, KeySlot::B, 0).to_bytes().as_ref(),
            hex::decode("FF8600000501000C6100").unwrap()
        );
        assert_eq!(
            read_binary(0x0C, 0x10).to_bytes().as_ref(),
            &[0xFF, 0xB0, 0x00, 0x0C, 0x10]
        );
        assert!(is_storage_frame(&update_binary(4, &[0; 4]).to_bytes()));
    }
}
