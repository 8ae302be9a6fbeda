//! Client configuration types for ragline.
//!
//! `ClientConfig` represents the top-level `config.toml`. Every field has a
//! default, so an empty or partial file is always valid.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Top-level client configuration.
///
/// Loaded from `~/.ragline/config.toml` unless overridden on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL for the retrieval and suggestion calls.
    pub base_url: String,
    /// URL of the streaming generation channel.
    pub channel_url: String,
    /// Optional bearer token sent with HTTP calls.
    pub api_key: Option<String>,
    /// Per-request timeout for HTTP calls.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            channel_url: "ws://localhost:8000/ws/generate_stream".to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field("channel_url", &self.channel_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Conversation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Seed message of a fresh or reset conversation.
    pub intro_message: String,
    /// Whether autocomplete suggestions are requested at all.
    pub suggestions_enabled: bool,
    /// Send the generation frame even when retrieval found no context.
    pub generate_without_context: bool,
    /// Lifetime of a visible notification.
    pub notification_ttl_secs: u64,
    /// Interval of the notification expiry tick.
    pub tick_interval_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            intro_message: "Welcome! Ask me anything about your documents.".to_string(),
            suggestions_enabled: true,
            generate_without_context: false,
            notification_ttl_secs: 5,
            tick_interval_ms: 500,
        }
    }
}

/// Local durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name, relative to the data directory unless absolute.
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "ragline.db".to_string(),
        }
    }
}
