//! Meshroom CLI Configuration
//!
//! Optional TOML file layered over built-in defaults. Every section may be omitted;
//! missing fields take their default values.
//!
//! ```toml
//! [coordinator]
//! eviction_delay_ms = 100
//! pairing_delay_ms = 500
//!
//! [link]
//! base_url = "https://chat.example.org/room"
//!
//! [identity]
//! name = "Otter-123"
//! ```

use std::path::Path;

use meshroom_core::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CliError, Result};

pub const DEFAULT_LINK_BASE: &str = "https://meshroom.chat/";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the meshroom CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rendezvous parameters and transition timings
    pub coordinator: CoordinatorConfig,
    pub link: LinkConfig,
    pub identity: IdentityConfig,
}

/// Share-link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Page the share link points at; its query and fragment are discarded
    pub base_url: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LINK_BASE.to_string(),
        }
    }
}

/// Local identity settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Display name; a random animal name is generated when unset
    pub name: Option<String>,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.coordinator.validate()?;
        Url::parse(&self.link.base_url)
            .map_err(|e| CliError::Config(format!("invalid link.base_url: {}", e)))?;
        if let Some(name) = &self.identity.name {
            if name.trim().is_empty() {
                return Err(CliError::Config("identity.name must not be blank".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.link.base_url, DEFAULT_LINK_BASE);
        assert_eq!(config.coordinator.pairing_delay_ms, 500);
        assert!(config.identity.name.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [coordinator]
            eviction_delay_ms = 5

            [identity]
            name = "Otter-123"
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinator.eviction_delay_ms, 5);
        assert_eq!(config.coordinator.app_id, "p2p-chat-trystero-app");
        assert_eq!(config.identity.name.as_deref(), Some("Otter-123"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[link]\nbase_url = \"not a url\""),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[coordinator]\napp_id = \"\""),
            Err(CliError::Core(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("coordinator = 3"),
            Err(CliError::TomlParsing(_))
        ));
    }
}
