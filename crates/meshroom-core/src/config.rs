//! Coordinator Configuration
//!
//! Rendezvous parameters shared by every peer of the application, the deferral
//! timings of room transitions, and channel buffer sizes for the async driver.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::RoomPassword;
use crate::{MeshroomError, Result};

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

pub const DEFAULT_APP_ID: &str = "p2p-chat-trystero-app";

pub const DEFAULT_RELAY_URLS: [&str; 3] = [
    "wss://tracker.openwebtorrent.com",
    "wss://tracker.webtorrent.dev",
    "wss://tracker.btorrent.xyz",
];

pub const DEFAULT_LOBBY_ROOM: &str = "__matchmaking_lobby__";

// ----------------------------------------------------------------------------
// Room Configuration
// ----------------------------------------------------------------------------

/// Parameters the transport needs to open one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Application namespace; peers of different apps never meet
    pub app_id: String,
    /// Rendezvous relays the transport announces itself on
    pub relay_urls: Vec<String>,
    /// Room encryption secret
    pub password: Option<RoomPassword>,
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Configuration for channel buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (caller → coordinator)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (transport and timers → coordinator)
    pub event_buffer_size: usize,
    /// Buffer size for AppEvent channels (coordinator → presentation)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,    // user actions are infrequent
            event_buffer_size: 256,     // peer traffic can be bursty
            app_event_buffer_size: 256, // every reaction may emit several updates
        }
    }
}

impl ChannelConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 1000,
            app_event_buffer_size: 1000,
        }
    }
}

// ----------------------------------------------------------------------------
// Coordinator Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of one room coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub app_id: String,
    pub relay_urls: Vec<String>,
    /// Well-known public room used for matchmaking
    pub lobby_room: String,
    /// Grace period between a self-eviction and opening the replacement room
    pub eviction_delay_ms: u64,
    /// Settle delay between a matchmaking offer and moving to the private room
    pub pairing_delay_ms: u64,
    /// Length of the provisional peer name derived from its identifier
    pub provisional_name_len: usize,
    pub channels: ChannelConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            relay_urls: DEFAULT_RELAY_URLS.iter().map(|s| s.to_string()).collect(),
            lobby_room: DEFAULT_LOBBY_ROOM.to_string(),
            eviction_delay_ms: 100,
            pairing_delay_ms: 500,
            provisional_name_len: 8,
            channels: ChannelConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Short delays and large buffers for tests
    pub fn testing() -> Self {
        Self {
            eviction_delay_ms: 10,
            pairing_delay_ms: 20,
            channels: ChannelConfig::testing(),
            ..Self::default()
        }
    }

    pub fn eviction_delay(&self) -> Duration {
        Duration::from_millis(self.eviction_delay_ms)
    }

    pub fn pairing_delay(&self) -> Duration {
        Duration::from_millis(self.pairing_delay_ms)
    }

    /// Transport parameters for a room under the given password
    pub fn room_config(&self, password: Option<RoomPassword>) -> RoomConfig {
        RoomConfig {
            app_id: self.app_id.clone(),
            relay_urls: self.relay_urls.clone(),
            password,
        }
    }

    /// Transport parameters for the matchmaking lobby, which is never encrypted
    pub fn lobby_config(&self) -> RoomConfig {
        self.room_config(None)
    }

    /// Reject configurations no peer could rendezvous with
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(MeshroomError::config_error("app_id must not be empty"));
        }
        if self.lobby_room.trim().is_empty() {
            return Err(MeshroomError::config_error("lobby_room must not be empty"));
        }
        if self.provisional_name_len == 0 {
            return Err(MeshroomError::config_error(
                "provisional_name_len must be at least 1",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
