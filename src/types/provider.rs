//! Provider configuration types
//!
//! A [`ProviderConfig`] is one configured backend instance. Its provider
//! specific part lives in [`ProviderSettings`], a tagged union whose variants
//! each carry their own credential and default struct.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// Provider tag used for adapter dispatch, cache keys and the capability registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Doubao,
}

impl ProviderKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Doubao => "doubao",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and defaults of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    pub api_key: SecretString,
    #[serde(default = "default_openai_model")]
    pub default_model: String,
    #[serde(default)]
    pub default_size: Option<String>,
    #[serde(default)]
    pub default_quality: Option<String>,
    #[serde(default)]
    pub default_style: Option<String>,
    /// `url` or `b64_json`; ignored for gpt-image models which always return base64.
    #[serde(default)]
    pub response_format: Option<String>,
    /// Append a token usage line to the rendered result when the provider reports usage.
    #[serde(default)]
    pub show_token_usage: bool,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            default_model: default_openai_model(),
            default_size: None,
            default_quality: None,
            default_style: None,
            response_format: None,
            show_token_usage: false,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_show_token_usage(mut self, show: bool) -> Self {
        self.show_token_usage = show;
        self
    }
}

fn default_openai_model() -> String {
    defaults::openai::DEFAULT_MODEL.to_string()
}

/// Credentials and defaults of a Doubao (Volcengine visual) endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DoubaoSettings {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    #[serde(default = "default_doubao_region")]
    pub region: String,
    #[serde(default = "default_doubao_service")]
    pub service: String,
    /// Synchronous model used for text-to-image.
    #[serde(default = "default_doubao_generation_model")]
    pub generation_model: String,
    /// Asynchronous model used for edits.
    #[serde(default = "default_doubao_edit_model")]
    pub edit_model: String,
    #[serde(default = "default_doubao_width")]
    pub default_width: u32,
    #[serde(default = "default_doubao_height")]
    pub default_height: u32,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub use_pre_llm: bool,
    #[serde(default = "default_true")]
    pub return_url: bool,
    #[serde(default)]
    pub add_watermark: bool,
}

impl DoubaoSettings {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            region: default_doubao_region(),
            service: default_doubao_service(),
            generation_model: default_doubao_generation_model(),
            edit_model: default_doubao_edit_model(),
            default_width: default_doubao_width(),
            default_height: default_doubao_height(),
            scale: None,
            use_pre_llm: false,
            return_url: true,
            add_watermark: false,
        }
    }

    pub fn with_return_url(mut self, return_url: bool) -> Self {
        self.return_url = return_url;
        self
    }
}

fn default_doubao_region() -> String {
    defaults::doubao::REGION.to_string()
}

fn default_doubao_service() -> String {
    defaults::doubao::SERVICE.to_string()
}

fn default_doubao_generation_model() -> String {
    defaults::doubao::GENERATION_MODEL.to_string()
}

fn default_doubao_edit_model() -> String {
    defaults::doubao::EDIT_MODEL.to_string()
}

fn default_doubao_width() -> u32 {
    defaults::doubao::WIDTH
}

fn default_doubao_height() -> u32 {
    defaults::doubao::HEIGHT
}

fn default_true() -> bool {
    true
}

/// Provider-specific part of a configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderSettings {
    #[serde(rename = "openai")]
    OpenAi(OpenAiSettings),
    Doubao(DoubaoSettings),
}

impl ProviderSettings {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Doubao(_) => ProviderKind::Doubao,
        }
    }
}

/// One configured backend instance. Immutable once created.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Stable index, unique per provider list and never reused across reloads.
    pub index: usize,
    pub url: String,
    /// Timeout applied to each outgoing HTTP call.
    pub timeout: Duration,
    /// Extra tries granted to this configuration before fail-over.
    pub retry_count: u32,
    pub settings: ProviderSettings,
}

impl ProviderConfig {
    pub fn new(index: usize, url: impl Into<String>, settings: ProviderSettings) -> Self {
        Self {
            index,
            url: url.into(),
            timeout: defaults::http::REQUEST_TIMEOUT,
            retry_count: defaults::retry::RETRY_COUNT,
            settings,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub const fn kind(&self) -> ProviderKind {
        self.settings.kind()
    }

    /// Cache key of this configuration: `type_index`.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.kind().as_str(), self.index)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn openai(&self) -> Option<&OpenAiSettings> {
        match &self.settings {
            ProviderSettings::OpenAi(s) => Some(s),
            ProviderSettings::Doubao(_) => None,
        }
    }

    pub fn doubao(&self) -> Option<&DoubaoSettings> {
        match &self.settings {
            ProviderSettings::Doubao(s) => Some(s),
            ProviderSettings::OpenAi(_) => None,
        }
    }
}
