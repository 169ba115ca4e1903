//! Time-bounded cache of the models each configuration supports.
//!
//! Entries are keyed by `type_index` and stay fresh for
//! [`defaults::cache::MODEL_LIST_TTL`]. Each key has its own async lock, so
//! concurrent lookups of one configuration trigger a single refresh while
//! different configurations never wait on each other.
//!
//! A refresh that fails is never reported to the caller: the stale entry is
//! served when there is one, otherwise the adapter's default list.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::CapabilityRegistry;
use crate::defaults;
use crate::error::RelayError;
use crate::types::ProviderConfig;

type Slot = Arc<tokio::sync::Mutex<Option<ModelCacheEntry>>>;

/// Cached model list of one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCacheEntry {
    pub models: Vec<String>,
    pub fetched_at: Instant,
}

impl ModelCacheEntry {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// What a failed refresh serves instead of the fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFallback {
    /// The expired entry, kept as-is.
    Stale,
    /// The adapter's static default list; nothing is stored.
    Default,
}

impl RefreshFallback {
    pub fn for_entry(entry: Option<&ModelCacheEntry>) -> Self {
        match entry {
            Some(_) => Self::Stale,
            None => Self::Default,
        }
    }
}

/// Per-adapter model cache feeding a shared [`CapabilityRegistry`].
#[derive(Debug)]
pub struct ModelCache {
    ttl: Duration,
    registry: Arc<CapabilityRegistry>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ModelCache {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_ttl(registry, defaults::cache::MODEL_LIST_TTL)
    }

    pub fn with_ttl(registry: Arc<CapabilityRegistry>, ttl: Duration) -> Self {
        Self {
            ttl,
            registry,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.to_string()).or_default().clone()
    }

    /// Models supported by `config`.
    ///
    /// `fetch` is only awaited when the entry is missing or expired;
    /// `defaults` is only called when that fetch fails and nothing is cached.
    pub async fn get_models<F, D>(&self, config: &ProviderConfig, fetch: F, defaults: D) -> Vec<String>
    where
        F: Future<Output = Result<Vec<String>, RelayError>>,
        D: FnOnce() -> Vec<String>,
    {
        let key = config.cache_key();
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref()
            && cached.is_fresh(self.ttl)
        {
            return cached.models.clone();
        }

        tracing::debug!(cache_key = %key, "refreshing model list");
        match fetch.await {
            Ok(models) => {
                self.registry.merge(config.kind(), models.iter().cloned());
                *entry = Some(ModelCacheEntry::new(models.clone()));
                models
            }
            Err(error) => match RefreshFallback::for_entry(entry.as_ref()) {
                RefreshFallback::Stale => {
                    tracing::warn!(cache_key = %key, error = %error, "model list refresh failed, serving stale entry");
                    entry
                        .as_ref()
                        .map(|cached| cached.models.clone())
                        .unwrap_or_default()
                }
                RefreshFallback::Default => {
                    tracing::warn!(cache_key = %key, error = %error, "model list refresh failed, using default models");
                    defaults()
                }
            },
        }
    }

    /// Current entry of `config`, fresh or not.
    pub async fn peek(&self, config: &ProviderConfig) -> Option<ModelCacheEntry> {
        let slot = self.slot(&config.cache_key());
        let entry = slot.lock().await;
        entry.clone()
    }

    /// Drop the entry of one configuration.
    pub fn invalidate(&self, config: &ProviderConfig) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&config.cache_key());
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
