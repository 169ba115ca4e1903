//! OpenAI-compatible image adapter

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use secrecy::ExposeSecret;
use serde_json::Value;

use super::transformers::{
    build_edit_form, build_generation_body, build_variation_form, filter_image_models,
    parse_image_response, resolve_model,
};
use crate::defaults;
use crate::error::{RelayError, classify_http_error};
use crate::registry::{CapabilityRegistry, ModelCache};
use crate::traits::{ImageAdapter, response_to_elements};
use crate::types::{
    EditOptions, GenerateOptions, ImageElement, ImageGenerationResponse, OpenAiSettings,
    ProviderConfig, ProviderKind, VariationOptions,
};

/// Adapter for `POST {url}/images/*` style endpoints.
#[derive(Debug)]
pub struct OpenAiImageAdapter {
    http: reqwest::Client,
    cache: ModelCache,
}

impl OpenAiImageAdapter {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(defaults::http::CONNECT_TIMEOUT)
            .user_agent(defaults::http::USER_AGENT)
            .build()
            .unwrap_or_default();
        Self::with_http_client(http, registry)
    }

    pub fn with_http_client(http: reqwest::Client, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            http,
            cache: ModelCache::new(registry),
        }
    }

    fn settings<'a>(&self, config: &'a ProviderConfig) -> Result<&'a OpenAiSettings, RelayError> {
        self.ensure_kind(config)?;
        config.openai().ok_or_else(|| {
            RelayError::ConfigurationError(format!(
                "configuration {} has no OpenAI settings",
                config.index
            ))
        })
    }

    /// Authenticate, send and decode; non-2xx responses are classified.
    async fn send(
        &self,
        config: &ProviderConfig,
        settings: &OpenAiSettings,
        request: RequestBuilder,
    ) -> Result<Value, RelayError> {
        let response = request
            .bearer_auth(settings.api_key.expose_secret())
            .timeout(config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(
                ProviderKind::OpenAi.as_str(),
                status.as_u16(),
                &text,
                &headers,
            ));
        }
        Ok(response.json::<Value>().await?)
    }

    fn endpoint(config: &ProviderConfig, path: &str) -> String {
        format!("{}/{}", config.base_url(), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ImageAdapter for OpenAiImageAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate_image(
        &self,
        config: &ProviderConfig,
        options: &GenerateOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        let settings = self.settings(config)?;
        let model = resolve_model(settings, options.model.as_deref());
        let body = build_generation_body(settings, &model, options);
        let url = Self::endpoint(config, "images/generations");
        tracing::debug!(config = config.index, model = %model, url = %url, "openai image generation");

        let raw = self
            .send(config, settings, self.http.post(&url).json(&body))
            .await?;
        parse_image_response(&raw)
    }

    async fn edit_image(
        &self,
        config: &ProviderConfig,
        options: &EditOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        let settings = self.settings(config)?;
        let model = resolve_model(settings, options.model.as_deref());
        let form = build_edit_form(settings, &model, options)?;
        let url = Self::endpoint(config, "images/edits");
        tracing::debug!(config = config.index, model = %model, images = options.images.len(), "openai image edit");

        let raw = self
            .send(config, settings, self.http.post(&url).multipart(form))
            .await?;
        parse_image_response(&raw)
    }

    async fn create_variation(
        &self,
        config: &ProviderConfig,
        options: &VariationOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        let settings = self.settings(config)?;
        let model = resolve_model(settings, options.model.as_deref());
        let form = build_variation_form(settings, &model, options)?;
        let url = Self::endpoint(config, "images/variations");
        tracing::debug!(config = config.index, model = %model, "openai image variation");

        let raw = self
            .send(config, settings, self.http.post(&url).multipart(form))
            .await?;
        parse_image_response(&raw)
    }

    async fn list_models(&self, config: &ProviderConfig) -> Result<Vec<String>, RelayError> {
        let settings = self.settings(config)?;
        let url = Self::endpoint(config, "models");
        let raw = self.send(config, settings, self.http.get(&url)).await?;
        filter_image_models(&raw)
    }

    fn default_models(&self, config: &ProviderConfig) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        if let Some(settings) = config.openai() {
            models.push(settings.default_model.clone());
        }
        for model in defaults::openai::DEFAULT_MODELS {
            if !models.iter().any(|m| m == model) {
                models.push((*model).to_string());
            }
        }
        models
    }

    fn model_cache(&self) -> &ModelCache {
        &self.cache
    }

    fn to_common_elements(
        &self,
        config: &ProviderConfig,
        response: &ImageGenerationResponse,
    ) -> Vec<ImageElement> {
        let show_usage = config.openai().is_some_and(|s| s.show_token_usage);
        response_to_elements(response, show_usage)
    }
}
