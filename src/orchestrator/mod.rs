//! Fail-over orchestration across provider configurations
//!
//! Two nested, strictly sequential retry levels:
//! - outer: [`retry_with_configs`] walks the selected configurations in order
//!   and stops at the first success
//! - inner: [`with_retry_delay`] gives one configuration `retry_count + 1`
//!   tries with exponential backoff
//!
//! Configuration selection ([`Orchestrator::get_configs`]) filters by model
//! support through each adapter's model cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::defaults;
use crate::error::{RelayError, format_failures};
use crate::providers::{DoubaoImageAdapter, OpenAiImageAdapter};
use crate::registry::CapabilityRegistry;
use crate::traits::ImageAdapter;
use crate::types::{
    EditOptions, GenerateOptions, ImageElement, ImageGenerationResponse, ProviderConfig,
    ProviderKind, VariationOptions,
};

pub use crate::retry::{ends_configuration_attempt, should_retry, with_retry_delay};

/// Message used whenever nothing can be attempted.
pub const NO_CONFIGURATION: &str = "no configuration available";

/// One failed configuration attempt. Only the message of the error is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    /// Zero-based attempt position, or -1 when no configuration was available
    pub config_index: i64,
    pub message: String,
    /// Provider retry hint of the underlying error. Informational only: the
    /// orchestrator never reads it, callers own any policy built on it.
    pub retryable: bool,
}

/// Outcome of [`retry_with_configs`].
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub success: bool,
    pub result: Option<T>,
    /// One entry per failed attempt, in attempt order
    pub errors: Vec<AttemptError>,
    /// Attempt position of the successful configuration
    pub used_config_index: Option<usize>,
}

impl<T> RetryResult<T> {
    /// The result on success, otherwise the formatted failure summary.
    pub fn into_result(self) -> Result<T, RelayError> {
        match self.result {
            Some(result) if self.success => Ok(result),
            _ => Err(RelayError::Exhausted(format_failures(&self.errors))),
        }
    }
}

/// Try `operation` against each configuration in order until one succeeds.
pub async fn retry_with_configs<'a, T, F, Fut>(
    configs: &'a [ProviderConfig],
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(&'a ProviderConfig, usize) -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    if configs.is_empty() {
        return RetryResult {
            success: false,
            result: None,
            errors: vec![AttemptError {
                config_index: -1,
                message: NO_CONFIGURATION.to_string(),
                retryable: false,
            }],
            used_config_index: None,
        };
    }

    let mut errors = Vec::new();
    for (position, config) in configs.iter().enumerate() {
        match operation(config, position).await {
            Ok(result) => {
                tracing::info!(
                    attempt = position,
                    config = config.index,
                    provider = %config.kind(),
                    failed_before = errors.len(),
                    "configuration succeeded"
                );
                return RetryResult {
                    success: true,
                    result: Some(result),
                    errors,
                    used_config_index: Some(position),
                };
            }
            Err(error) => {
                tracing::warn!(
                    attempt = position,
                    config = config.index,
                    provider = %config.kind(),
                    error = %error,
                    "configuration failed"
                );
                errors.push(AttemptError {
                    config_index: position as i64,
                    message: error.to_string(),
                    retryable: error.is_retryable(),
                });
            }
        }
    }

    RetryResult {
        success: false,
        result: None,
        errors,
        used_config_index: None,
    }
}

/// Successful high-level call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Renderable items for the result sink
    pub elements: Vec<ImageElement>,
    pub response: ImageGenerationResponse,
    /// Stable index of the configuration that answered
    pub config_index: usize,
    /// Configurations that failed before it
    pub failed_attempts: Vec<AttemptError>,
}

/// Routes image requests to registered adapters with fail-over.
pub struct Orchestrator {
    adapters: HashMap<ProviderKind, Arc<dyn ImageAdapter>>,
    configs: RwLock<Arc<Vec<ProviderConfig>>>,
    base_delay: Duration,
    fallback_to_default: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().collect();
        kinds.sort();
        f.debug_struct("Orchestrator")
            .field("adapters", &kinds)
            .field("configs", &self.configs_snapshot().len())
            .field("base_delay", &self.base_delay)
            .field("fallback_to_default", &self.fallback_to_default)
            .finish()
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Current configuration list. Cheap; the list is shared.
    pub fn configs_snapshot(&self) -> Arc<Vec<ProviderConfig>> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration list wholesale.
    pub fn reload_configs(&self, configs: Vec<ProviderConfig>) {
        let count = configs.len();
        *self.configs.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(configs);
        tracing::info!(configs = count, "configurations reloaded");
    }

    pub fn adapter(&self, kind: ProviderKind) -> Option<Arc<dyn ImageAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Configurations eligible for a request, in configuration order.
    ///
    /// Only configurations with a registered adapter are considered. With a
    /// model filter, those whose adapter reports the model are kept; when
    /// none do, `fallback_to_default` decides between the unfiltered list and
    /// an empty one.
    pub async fn get_configs(
        &self,
        model: Option<&str>,
        fallback_to_default: bool,
    ) -> Vec<ProviderConfig> {
        self.select_configs(model, fallback_to_default).await.0
    }

    /// Like [`Self::get_configs`]; the flag is true when the list comes from
    /// the fallback path and no configuration reported the model.
    async fn select_configs(
        &self,
        model: Option<&str>,
        fallback_to_default: bool,
    ) -> (Vec<ProviderConfig>, bool) {
        let eligible: Vec<ProviderConfig> = self
            .configs_snapshot()
            .iter()
            .filter(|config| self.adapters.contains_key(&config.kind()))
            .cloned()
            .collect();

        let Some(model) = model else {
            return (eligible, false);
        };

        let mut compatible = Vec::new();
        for config in &eligible {
            let Some(adapter) = self.adapters.get(&config.kind()) else {
                continue;
            };
            match adapter.supports_model(config, model).await {
                Ok(true) => compatible.push(config.clone()),
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(config = config.index, model, error = %error, "capability check failed, skipping configuration");
                }
            }
        }

        if !compatible.is_empty() {
            (compatible, false)
        } else if fallback_to_default {
            tracing::debug!(model, "no configuration lists the model, using all configurations");
            (eligible, true)
        } else {
            (Vec::new(), false)
        }
    }

    /// Configurations for a request with `model`.
    ///
    /// On the fallback path the requested model is cleared so every
    /// configuration answers with its default model.
    async fn configs_for(&self, model: &mut Option<String>) -> Result<Vec<ProviderConfig>, RelayError> {
        let (configs, fell_back) = self
            .select_configs(model.as_deref(), self.fallback_to_default)
            .await;
        if configs.is_empty() {
            return Err(RelayError::ConfigurationError(NO_CONFIGURATION.to_string()));
        }
        if fell_back && let Some(requested) = model.take() {
            tracing::info!(model = %requested, "substituting configuration default models");
        }
        Ok(configs)
    }

    pub async fn generate_image(&self, mut options: GenerateOptions) -> Result<Generation, RelayError> {
        let configs = self.configs_for(&mut options.model).await?;
        let options = Arc::new(options);
        self.execute(configs, move |adapter, config| {
            let options = options.clone();
            async move { adapter.generate_image(&config, &options).await }
        })
        .await
    }

    pub async fn edit_image(&self, mut options: EditOptions) -> Result<Generation, RelayError> {
        let configs = self.configs_for(&mut options.model).await?;
        let options = Arc::new(options);
        self.execute(configs, move |adapter, config| {
            let options = options.clone();
            async move { adapter.edit_image(&config, &options).await }
        })
        .await
    }

    pub async fn create_variation(&self, mut options: VariationOptions) -> Result<Generation, RelayError> {
        let configs = self.configs_for(&mut options.model).await?;
        let options = Arc::new(options);
        self.execute(configs, move |adapter, config| {
            let options = options.clone();
            async move { adapter.create_variation(&config, &options).await }
        })
        .await
    }

    /// Run `operation` with backoff inside fail-over across `configs` and
    /// convert the winning response.
    async fn execute<Op, Fut>(
        &self,
        configs: Vec<ProviderConfig>,
        operation: Op,
    ) -> Result<Generation, RelayError>
    where
        Op: Fn(Arc<dyn ImageAdapter>, ProviderConfig) -> Fut,
        Fut: Future<Output = Result<ImageGenerationResponse, RelayError>>,
    {
        let base_delay = self.base_delay;
        let operation = &operation;
        let outcome = retry_with_configs(&configs, move |config, _position| async move {
            let adapter = self.adapter(config.kind()).ok_or_else(|| {
                RelayError::ConfigurationError(format!("no adapter registered for {}", config.kind()))
            })?;
            let response = with_retry_delay(
                || operation(adapter.clone(), config.clone()),
                config.retry_count,
                base_delay,
            )
            .await?;
            let elements = adapter.to_common_elements(config, &response);
            Ok::<_, RelayError>((elements, response))
        })
        .await;

        let used = outcome.used_config_index;
        let failed_attempts = outcome.errors.clone();
        let (elements, response) = outcome.into_result()?;
        let config_index = used
            .and_then(|position| configs.get(position))
            .map(|config| config.index)
            .ok_or_else(|| RelayError::InternalError("successful attempt without a configuration".to_string()))?;

        Ok(Generation {
            elements,
            response,
            config_index,
            failed_attempts,
        })
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    adapters: HashMap<ProviderKind, Arc<dyn ImageAdapter>>,
    configs: Vec<ProviderConfig>,
    base_delay: Duration,
    fallback_to_default: bool,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            adapters: HashMap::new(),
            configs: Vec::new(),
            base_delay: defaults::retry::BASE_DELAY,
            fallback_to_default: true,
        }
    }
}

impl OrchestratorBuilder {
    /// Register an adapter for its provider tag, replacing any previous one.
    pub fn adapter(mut self, adapter: Arc<dyn ImageAdapter>) -> Self {
        if let Some(previous) = self.adapters.insert(adapter.kind(), adapter) {
            tracing::debug!(provider = %previous.kind(), "replacing registered adapter");
        }
        self
    }

    /// Register the built-in OpenAI and Doubao adapters sharing `registry`.
    pub fn with_default_adapters(self, registry: Arc<CapabilityRegistry>) -> Self {
        self.adapter(Arc::new(OpenAiImageAdapter::new(registry.clone())))
            .adapter(Arc::new(DoubaoImageAdapter::new(registry)))
    }

    pub fn configs(mut self, configs: Vec<ProviderConfig>) -> Self {
        self.configs = configs;
        self
    }

    /// Base delay of the per-configuration backoff.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn fallback_to_default(mut self, fallback: bool) -> Self {
        self.fallback_to_default = fallback;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            adapters: self.adapters,
            configs: RwLock::new(Arc::new(self.configs)),
            base_delay: self.base_delay,
            fallback_to_default: self.fallback_to_default,
        }
    }
}
