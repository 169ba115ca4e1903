//! Process-wide view of which models each provider type can serve.
//!
//! Every successful model-list refresh is merged here, so capability
//! introspection sees the union over all configurations of a provider type.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::types::ProviderKind;

/// Per-provider-type set of known model names.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    models: Mutex<HashMap<ProviderKind, BTreeSet<String>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `models` into the set of `kind`. Returns the merged, sorted list.
    pub fn merge<I, S>(&self, kind: ProviderKind, models: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(kind).or_default();
        entry.extend(models.into_iter().map(Into::into));
        entry.iter().cloned().collect()
    }

    /// Sorted, de-duplicated models known for `kind`.
    pub fn models_for(&self, kind: ProviderKind) -> Vec<String> {
        let map = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&kind)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Provider types with at least one known model.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let map = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<_> = map
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(kind, _)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    pub fn clear(&self) {
        self.models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_sorted_union_per_kind() {
        let registry = CapabilityRegistry::new();
        registry.merge(ProviderKind::OpenAi, ["dall-e-3", "dall-e-2"]);
        let merged = registry.merge(ProviderKind::OpenAi, ["gpt-image-1", "dall-e-3"]);
        assert_eq!(merged, vec!["dall-e-2", "dall-e-3", "gpt-image-1"]);

        assert!(registry.models_for(ProviderKind::Doubao).is_empty());
        assert_eq!(registry.kinds(), vec![ProviderKind::OpenAi]);

        registry.clear();
        assert!(registry.models_for(ProviderKind::OpenAi).is_empty());
    }
}
