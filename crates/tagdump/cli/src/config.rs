use std::path::PathBuf;

use eyre::OptionExt;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tagdump_core::{EngineConfig, Key};
use tagdump_transport_pcsc::{PcscConfig, ShareMode};

/// CLI settings merged from `~/.tagdump/tagdump.toml`, `TAGDUMP_*` variables and flags
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) aid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) output_dir: Option<PathBuf>,
    /// Replaces the built-in default key list when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) default_keys: Option<Vec<String>>,
    /// Pages read from Ultralight-family tags (NTAG216 has 231)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ultralight_pages: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) card_family: Option<String>,
    /// Open the reader in shared mode instead of exclusively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) auto_reconnect: Option<bool>,
}

/// Returns the base config directory for tagdump
pub(crate) fn config_dir() -> eyre::Result<PathBuf> {
    Ok(std::env::home_dir()
        .ok_or_eyre("home directory not found")?
        .join(".tagdump"))
}

impl Settings {
    /// Load the config file and environment, then apply `overrides` on top
    pub(crate) fn load(overrides: Self) -> eyre::Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(config_dir()?.join("tagdump.toml")))
            .merge(Env::prefixed("TAGDUMP_"));
        Self::layered(figment, overrides)
    }

    fn layered(figment: Figment, overrides: Self) -> eyre::Result<Self> {
        Ok(figment.merge(Serialized::defaults(overrides)).extract()?)
    }

    /// Engine configuration for these settings
    ///
    /// Malformed custom keys and AIDs are left to the engine, which ignores
    /// them with a warning. A malformed default key is an error.
    pub(crate) fn engine_config(&self) -> eyre::Result<EngineConfig> {
        let mut config = EngineConfig::new();
        if let Some(key) = &self.key {
            config = config.with_custom_key(key.as_str());
        }
        if let Some(aid) = &self.aid {
            config = config.with_custom_aid(aid.as_str());
        }
        if let Some(keys) = &self.default_keys {
            let keys = keys
                .iter()
                .map(|k| Key::from_hex(k))
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_default_keys(keys);
        }
        if let Some(pages) = self.ultralight_pages {
            config = config.with_ultralight_pages(pages);
        }
        if let Some(family) = &self.card_family {
            config = config.with_card_family(family.as_str());
        }
        Ok(config)
    }

    /// Reader connection options for these settings
    pub(crate) fn pcsc_config(&self) -> PcscConfig {
        let mut config = PcscConfig::new();
        if self.shared == Some(true) {
            config = config.with_share_mode(ShareMode::Shared);
        }
        if let Some(auto_reconnect) = self.auto_reconnect {
            config = config.with_auto_reconnect(auto_reconnect);
        }
        config
    }
}
