//! # pixrelay - fail-over image generation
//!
//! pixrelay puts several image-generation backends behind one interface and
//! keeps requests flowing when individual backends fail.
//!
//! ## Features
//!
//! - **Adapters**: an OpenAI-compatible Images API adapter and a Doubao
//!   (Volcengine visual) adapter with signed requests and async edit tasks
//! - **Fail-over**: configurations are tried in order; each one gets bounded
//!   retries with exponential backoff before the next is attempted
//! - **Model routing**: a per-configuration model cache decides which
//!   configurations can serve a requested model
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pixrelay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RelayError> {
//!     let relay_config = RelayConfig::from_file("relay.json").await?;
//!     let configs = ConfigLoader::new().load(&relay_config)?;
//!
//!     let orchestrator = Orchestrator::builder()
//!         .with_default_adapters(Arc::new(CapabilityRegistry::new()))
//!         .base_delay(relay_config.base_delay())
//!         .fallback_to_default(relay_config.fallback_to_default)
//!         .configs(configs)
//!         .build();
//!
//!     let generation = orchestrator
//!         .generate_image(GenerateOptions::new("a lighthouse at dusk").with_model("dall-e-3"))
//!         .await?;
//!     for element in generation.elements {
//!         println!("{element:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod defaults;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, ProviderEntry, RelayConfig};
pub use error::{ErrorCategory, RelayError};
pub use orchestrator::{
    AttemptError, Generation, Orchestrator, OrchestratorBuilder, RetryResult, retry_with_configs,
};
pub use registry::{CapabilityRegistry, ModelCache};
pub use retry::{ends_configuration_attempt, should_retry, with_retry_delay};
pub use traits::ImageAdapter;

pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::config::{ConfigLoader, RelayConfig};
    pub use crate::error::RelayError;
    pub use crate::orchestrator::{Generation, Orchestrator};
    pub use crate::providers::{DoubaoImageAdapter, OpenAiImageAdapter};
    pub use crate::registry::CapabilityRegistry;
    pub use crate::traits::ImageAdapter;
    pub use crate::types::{
        DoubaoSettings, EditOptions, GenerateOptions, ImageElement, ImageSource, InputImage,
        OpenAiSettings, ProviderConfig, ProviderKind, ProviderSettings, VariationOptions,
    };
}
