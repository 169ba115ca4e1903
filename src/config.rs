//! Configuration loading
//!
//! A relay configuration is a JSON document:
//!
//! ```json
//! {
//!   "providers": [
//!     { "type": "openai", "api_key": "sk-...", "default_model": "gpt-image-1" },
//!     { "type": "doubao", "access_key_id": "AK...", "secret_access_key": "...",
//!       "timeout_secs": 90, "retry_count": 1 }
//!   ],
//!   "retry_base_delay_ms": 1000,
//!   "fallback_to_default": true
//! }
//! ```
//!
//! [`ConfigLoader`] turns the entries into [`ProviderConfig`] values and owns
//! index allocation across reloads.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use validator::Validate;

use crate::defaults;
use crate::error::RelayError;
use crate::types::{ProviderConfig, ProviderKind, ProviderSettings};

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RelayConfig {
    #[validate(nested)]
    pub providers: Vec<ProviderEntry>,
    /// Base delay of the per-configuration backoff, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    #[validate(range(max = 60_000))]
    pub retry_base_delay_ms: u64,
    /// Use every configuration when none lists the requested model
    #[serde(default = "default_true")]
    pub fallback_to_default: bool,
}

/// One provider entry, tagged by `"type"`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProviderEntry {
    /// Endpoint; the provider's public endpoint when omitted
    #[serde(default)]
    #[validate(url)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    /// At most [`defaults::retry::MAX_RETRY_COUNT`]
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

fn default_base_delay_ms() -> u64 {
    defaults::retry::BASE_DELAY.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    defaults::http::REQUEST_TIMEOUT.as_secs()
}

fn default_retry_count() -> u32 {
    defaults::retry::RETRY_COUNT
}

fn default_true() -> bool {
    true
}

impl ProviderEntry {
    pub fn kind(&self) -> ProviderKind {
        self.settings.kind()
    }

    fn resolved_url(&self) -> String {
        match (&self.url, self.kind()) {
            (Some(url), _) => url.clone(),
            (None, ProviderKind::OpenAi) => defaults::openai::BASE_URL.to_string(),
            (None, ProviderKind::Doubao) => defaults::doubao::BASE_URL.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RelayError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RelayError::ConfigurationError(format!("invalid configuration: {e}")))?;
        config.validate_config()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RelayError::ConfigurationError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate_config(&self) -> Result<(), RelayError> {
        self.validate()
            .map_err(|e| RelayError::ConfigurationError(e.to_string()))?;
        if self.providers.is_empty() {
            return Err(RelayError::ConfigurationError(
                "at least one provider is required".to_string(),
            ));
        }
        if self.providers.iter().any(|p| p.retry_count > defaults::retry::MAX_RETRY_COUNT) {
            return Err(RelayError::ConfigurationError(format!(
                "retry_count must not exceed {}",
                defaults::retry::MAX_RETRY_COUNT
            )));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Allocates stable configuration indices.
///
/// The first load numbers entries by position. Each reload continues after
/// the highest index issued so far, so an index never refers to two
/// different configurations.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    next_index: usize,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next loaded configuration will receive.
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn load(&mut self, config: &RelayConfig) -> Result<Vec<ProviderConfig>, RelayError> {
        config.validate_config()?;

        let start = self.next_index;
        let configs: Vec<ProviderConfig> = config
            .providers
            .iter()
            .enumerate()
            .map(|(offset, entry)| {
                ProviderConfig::new(start + offset, entry.resolved_url(), entry.settings.clone())
                    .with_timeout(Duration::from_secs(entry.timeout_secs))
                    .with_retry_count(entry.retry_count)
            })
            .collect();
        self.next_index = start + configs.len();

        tracing::debug!(
            count = configs.len(),
            first_index = start,
            "provider configurations loaded"
        );
        Ok(configs)
    }
}
