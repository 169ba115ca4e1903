//! Model capability tracking
//!
//! - capability.rs: process-wide per-provider model registry
//! - model_cache.rs: per-configuration TTL cache that feeds the registry

pub mod capability;
pub mod model_cache;

pub use capability::CapabilityRegistry;
pub use model_cache::{ModelCache, ModelCacheEntry, RefreshFallback};
