//! Engine configuration

use crate::commands::application::Aid;
use crate::keys::{FACTORY_KEY, Key, KeyRing, NDEF_KEY};
use crate::probe;
use crate::record::DEFAULT_CARD_FAMILY;
use crate::topology::DEFAULT_ULTRALIGHT_PAGES;

/// Configuration options for the acquisition engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Caller key string; used only when it is exactly 12 hex characters
    pub custom_key: Option<String>,

    /// Caller AID string; used only when it is at least 14 hex characters
    pub custom_aid: Option<String>,

    /// Keys tried after the caller key
    pub default_keys: Vec<Key>,

    /// Pages read from Ultralight-family tags
    pub ultralight_pages: u16,

    /// Card family label written into records
    pub card_family: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            custom_key: None,
            custom_aid: None,
            default_keys: vec![FACTORY_KEY, NDEF_KEY],
            ultralight_pages: DEFAULT_ULTRALIGHT_PAGES,
            card_family: DEFAULT_CARD_FAMILY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the caller key
    pub fn with_custom_key(mut self, key: impl Into<String>) -> Self {
        self.custom_key = Some(key.into());
        self
    }

    /// Set the caller AID
    pub fn with_custom_aid(mut self, aid: impl Into<String>) -> Self {
        self.custom_aid = Some(aid.into());
        self
    }

    /// Replace the default keys
    pub fn with_default_keys(mut self, keys: Vec<Key>) -> Self {
        self.default_keys = keys;
        self
    }

    /// Set the Ultralight page count
    pub const fn with_ultralight_pages(mut self, pages: u16) -> Self {
        self.ultralight_pages = pages;
        self
    }

    /// Set the card family label
    pub fn with_card_family(mut self, family: impl Into<String>) -> Self {
        self.card_family = family.into();
        self
    }

    /// Key ring: the caller key when well-formed, then the defaults
    pub fn key_ring(&self) -> KeyRing {
        KeyRing::from_input(self.custom_key.as_deref(), &self.default_keys)
    }

    /// Caller AID when well-formed
    pub fn aid(&self) -> Option<Aid> {
        probe::custom_aid(self.custom_aid.as_deref())
    }
}
