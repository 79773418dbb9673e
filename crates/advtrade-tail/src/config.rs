/*
[INPUT]:  YAML configuration file and credential environment variables
[OUTPUT]: Parsed tail configuration and adapter StreamConfig
[POS]:    Configuration layer - connection and subscription setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use advtrade_adapter::{ChannelKind, Credentials, StreamConfig, ws::DEFAULT_STREAM_URL};

pub const API_KEY_ENV: &str = "ADVTRADE_API_KEY";
pub const API_SECRET_ENV: &str = "ADVTRADE_API_SECRET";

/// Top-level configuration for the stream tail
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TailConfig {
    /// Endpoint and timing options
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Signing credentials; empty values fall back to the environment
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Channels to subscribe after connecting
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// Endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
    /// Upper bound for one reassembled message
    #[serde(default)]
    pub max_message_bytes: Option<usize>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            close_timeout_secs: default_close_timeout_secs(),
            max_message_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

/// One subscription intent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    pub channel: ChannelKind,
    /// Empty for account-scoped channels
    #[serde(default)]
    pub product_ids: Vec<String>,
}

fn default_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_close_timeout_secs() -> u64 {
    5
}

impl TailConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Resolve credentials, reading `lookup` for any value left empty
    pub fn resolve_credentials(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials> {
        let api_key = non_empty_or(&self.credentials.api_key, || lookup(API_KEY_ENV))
            .with_context(|| format!("api_key missing; set credentials.api_key or {API_KEY_ENV}"))?;
        let api_secret = non_empty_or(&self.credentials.api_secret, || lookup(API_SECRET_ENV))
            .with_context(|| {
                format!("api_secret missing; set credentials.api_secret or {API_SECRET_ENV}")
            })?;
        Ok(Credentials::new(api_key, api_secret))
    }

    /// Build the adapter configuration
    pub fn stream_config(&self, credentials: Credentials) -> Result<StreamConfig> {
        if self.subscriptions.is_empty() {
            bail!("at least one subscription is required");
        }

        let mut config = StreamConfig::new(credentials)
            .with_url(self.connection.url.clone())
            .with_handshake_timeout(Duration::from_secs(self.connection.handshake_timeout_secs))
            .with_close_timeout(Duration::from_secs(self.connection.close_timeout_secs));
        if let Some(max_message_bytes) = self.connection.max_message_bytes {
            config = config.with_max_message_bytes(max_message_bytes);
        }
        config.validate().context("invalid connection settings")?;
        Ok(config)
    }
}

fn non_empty_or(value: &str, fallback: impl FnOnce() -> Option<String>) -> Option<String> {
    if !value.trim().is_empty() {
        return Some(value.to_string());
    }
    fallback().filter(|value| !value.trim().is_empty())
}
