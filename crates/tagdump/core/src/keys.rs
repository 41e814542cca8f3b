//! MIFARE Classic keys and key rings

use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Length of a MIFARE Classic key in bytes
pub const KEY_LENGTH: usize = 6;

/// Transport-default key shipped on blank cards
pub const FACTORY_KEY: Key = Key([0xFF; KEY_LENGTH]);

/// NFC Forum MAD/NDEF public key for data sectors
pub const NDEF_KEY: Key = Key([0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7]);

/// Key slot used in a sector authentication
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySlot {
    /// Key A (`0x60`)
    #[display("A")]
    A,
    /// Key B (`0x61`)
    #[display("B")]
    B,
}

impl KeySlot {
    /// Slots in the order they are attempted
    pub const ORDER: [Self; 2] = [Self::A, Self::B];

    /// Key type byte of the GENERAL AUTHENTICATE data field
    pub const fn key_type(&self) -> u8 {
        match self {
            Self::A => 0x60,
            Self::B => 0x61,
        }
    }
}

/// A 6-byte MIFARE Classic key
///
/// Caller-supplied keys are secrets; the bytes are wiped on drop and never
/// printed in full.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    /// Create a key from raw bytes
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a key from exactly 12 hex characters
    pub fn from_hex(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.len() != KEY_LENGTH * 2 {
            return Err(Error::InvalidKey("expected exactly 12 hex characters"));
        }
        let mut bytes = [0u8; KEY_LENGTH];
        hex::decode_to_slice(input, &mut bytes)
            .map_err(|_| Error::InvalidKey("not a hex string"))?;
        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub const fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:02X}…)", self.0[0])
    }
}

/// Ordered candidate keys tried until one authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    keys: Vec<Key>,
}

impl KeyRing {
    /// Build a ring from an optional caller key followed by the defaults
    pub fn new(custom: Option<Key>, defaults: &[Key]) -> Self {
        let keys = custom.into_iter().chain(defaults.iter().cloned()).collect();
        Self { keys }
    }

    /// Build a ring from an optional caller key string
    ///
    /// A string that is not exactly 12 hex characters is ignored and only the
    /// defaults are used.
    pub fn from_input(custom: Option<&str>, defaults: &[Key]) -> Self {
        let custom = custom
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match Key::from_hex(s) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "Ignoring caller key");
                    None
                }
            });
        Self::new(custom, defaults)
    }

    /// Keys in attempt order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the ring holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for KeyRing {
    fn default() -> Self {
        Self::new(None, &[FACTORY_KEY, NDEF_KEY])
    }
}
