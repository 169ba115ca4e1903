//! Image adapter capability trait

use async_trait::async_trait;

use crate::error::RelayError;
use crate::registry::ModelCache;
use crate::types::{
    EditOptions, GenerateOptions, ImageElement, ImageGenerationResponse, ImageSource,
    ProviderConfig, ProviderKind, VariationOptions,
};

/// One provider's implementation of the image operations.
///
/// Every operation receives the configuration to run against; an adapter is
/// stateless apart from its [`ModelCache`].
#[async_trait]
pub trait ImageAdapter: Send + Sync {
    /// Provider tag this adapter serves.
    fn kind(&self) -> ProviderKind;

    /// Text-to-image.
    async fn generate_image(
        &self,
        config: &ProviderConfig,
        options: &GenerateOptions,
    ) -> Result<ImageGenerationResponse, RelayError>;

    /// Image(s) plus prompt to image(s).
    async fn edit_image(
        &self,
        config: &ProviderConfig,
        options: &EditOptions,
    ) -> Result<ImageGenerationResponse, RelayError>;

    /// Variations of one image.
    async fn create_variation(
        &self,
        _config: &ProviderConfig,
        _options: &VariationOptions,
    ) -> Result<ImageGenerationResponse, RelayError> {
        Err(RelayError::unsupported(format!(
            "image variations are not supported by {}",
            self.kind()
        )))
    }

    /// Raw, uncached model list.
    async fn list_models(&self, config: &ProviderConfig) -> Result<Vec<String>, RelayError>;

    /// Static list served when the model list cannot be fetched.
    fn default_models(&self, config: &ProviderConfig) -> Vec<String>;

    fn model_cache(&self) -> &ModelCache;

    /// Cached model list; never fails.
    async fn models(&self, config: &ProviderConfig) -> Vec<String> {
        self.model_cache()
            .get_models(config, self.list_models(config), || {
                self.default_models(config)
            })
            .await
    }

    async fn supports_model(&self, config: &ProviderConfig, model: &str) -> Result<bool, RelayError> {
        self.ensure_kind(config)?;
        Ok(self.models(config).await.iter().any(|m| m == model))
    }

    /// Convert a response into the items handed to the result sink.
    fn to_common_elements(
        &self,
        _config: &ProviderConfig,
        response: &ImageGenerationResponse,
    ) -> Vec<ImageElement> {
        response_to_elements(response, false)
    }

    /// Reject configurations that belong to another provider.
    fn ensure_kind(&self, config: &ProviderConfig) -> Result<(), RelayError> {
        if config.kind() == self.kind() {
            Ok(())
        } else {
            Err(RelayError::ConfigurationError(format!(
                "configuration {} is of type {}, adapter handles {}",
                config.index,
                config.kind(),
                self.kind()
            )))
        }
    }
}

/// URL images first-class, base64 images as data sources, and an optional
/// token usage line at the end.
pub fn response_to_elements(
    response: &ImageGenerationResponse,
    show_usage: bool,
) -> Vec<ImageElement> {
    let mut elements: Vec<ImageElement> = response
        .images
        .iter()
        .filter_map(|image| {
            if let Some(url) = &image.url {
                Some(ImageElement::Image(ImageSource::Url(url.clone())))
            } else {
                image.b64_json.as_ref().map(|data| {
                    let mime_type = image
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| crate::utils::mime::guess_mime_from_base64(data));
                    ImageElement::Image(ImageSource::Base64 {
                        mime_type,
                        data: data.clone(),
                    })
                })
            }
        })
        .collect();

    if show_usage && let Some(usage) = &response.usage {
        elements.push(ImageElement::Text(format!(
            "Token usage: input {}, output {}, total {}",
            usage.input_tokens, usage.output_tokens, usage.total_tokens
        )));
    }
    elements
}
