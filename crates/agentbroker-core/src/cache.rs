//! UAID resolution cache.
//!
//! Maps registry-native ids to UAIDs, filled only from search hits that
//! carry both. Entries live for the lifetime of the cache and the first
//! binding observed for an id is kept. Wrap the cache if eviction is needed.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::agent::{AgentHandle, SearchHit};

/// Process-lifetime native id → UAID map.
#[derive(Debug, Default)]
pub struct UaidCache {
    bindings: RwLock<HashMap<String, String>>,
}

impl UaidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding. Empty values are ignored, as are ids already bound.
    /// Returns whether a new binding was stored.
    pub fn record(&self, native_id: &str, uaid: &str) -> bool {
        if native_id.is_empty() || uaid.trim().is_empty() {
            return false;
        }
        let mut bindings = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if bindings.contains_key(native_id) {
            return false;
        }
        bindings.insert(native_id.to_string(), uaid.to_string());
        true
    }

    /// Record every hit carrying a UAID. Returns how many bindings were new.
    pub fn observe<'a>(&self, hits: impl IntoIterator<Item = &'a SearchHit>) -> usize {
        hits.into_iter()
            .filter_map(|hit| hit.uaid.as_deref().map(|uaid| (hit.native_id.as_str(), uaid)))
            .filter(|(native_id, uaid)| self.record(native_id, uaid))
            .count()
    }

    /// Look up a binding. No I/O; unseen ids are `None`.
    pub fn resolve(&self, native_id: &str) -> Option<String> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(native_id)
            .cloned()
    }

    /// Copy of `handle` with its UAID filled from the cache if it has none.
    pub fn fill(&self, handle: &AgentHandle) -> AgentHandle {
        if handle.uaid.as_deref().is_some_and(|u| !u.is_empty()) {
            return handle.clone();
        }
        match self.resolve(&handle.native_id) {
            Some(uaid) => handle.with_uaid(uaid),
            None => handle.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_after_observe() {
        let cache = UaidCache::new();
        let hits = vec![
            SearchHit::new("1", "42", "a").with_uaid("uaid:aid:42"),
            SearchHit::new("1", "43", "b"),
            SearchHit::new("1", "44", "c").with_uaid(""),
        ];
        assert_eq!(cache.observe(&hits), 1);
        assert_eq!(cache.resolve("42").as_deref(), Some("uaid:aid:42"));
        assert_eq!(cache.resolve("43"), None);
        assert_eq!(cache.resolve("44"), None);
        assert_eq!(cache.resolve("never-seen"), None);
    }

    #[test]
    fn test_first_binding_kept() {
        let cache = UaidCache::new();
        assert!(cache.record("42", "old"));
        assert!(!cache.record("42", "new"));
        assert_eq!(cache.resolve("42").as_deref(), Some("old"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fill_does_not_touch_original() {
        let cache = UaidCache::new();
        cache.record("42", "uaid:aid:42");

        let handle = SearchHit::new("1", "42", "a").to_handle();
        let filled = cache.fill(&handle);
        assert_eq!(handle.uaid, None);
        assert_eq!(filled.uaid.as_deref(), Some("uaid:aid:42"));

        let own = handle.with_uaid("mine");
        assert_eq!(cache.fill(&own).uaid.as_deref(), Some("mine"));
    }
}
