//! Bridge options
//!
//! Options can be built in code or loaded from a TOML document:
//!
//! ```toml
//! pin_grabbed_proxies = true
//! bind_destroyed_callbacks = true
//!
//! [resurrection]
//! properties = true
//! metadata_overrides = false
//! ```
//!
//! Every key is optional and falls back to [`BridgeOptions::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the options file
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which registrations are replayed after the native engine reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResurrectionOptions {
    /// Rebind surviving property wrappers to fresh native registrations
    pub properties: bool,
    /// Re-apply recorded metadata overrides
    pub metadata_overrides: bool,
}

impl Default for ResurrectionOptions {
    fn default() -> Self {
        Self {
            properties: true,
            metadata_overrides: true,
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Resurrection settings
    pub resurrection: ResurrectionOptions,

    /// Promote a constructed proxy to a strong table reference while native
    /// code holds extra references to its object
    pub pin_grabbed_proxies: bool,

    /// Ask the engine for destruction notices for observing proxies
    pub bind_destroyed_callbacks: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            resurrection: ResurrectionOptions::default(),
            pin_grabbed_proxies: true,
            bind_destroyed_callbacks: true,
        }
    }
}

impl BridgeOptions {
    /// Options with both resurrection managers disabled
    pub fn without_resurrection() -> Self {
        Self {
            resurrection: ResurrectionOptions {
                properties: false,
                metadata_overrides: false,
            },
            ..Default::default()
        }
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Serialize to a TOML document
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl FromStr for BridgeOptions {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
