//! Adapter registry — directory of backends per capability.
//!
//! Registering an id twice keeps the last adapter. The registry holds no
//! call state; locks are only taken to copy an `Arc` out.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::adapter::{Capability, ChatAdapter, SearchAdapter};
use crate::error::{BrokerError, BrokerResult};

/// A registered adapter of either capability.
#[derive(Clone)]
pub enum RegisteredAdapter {
    Search(Arc<dyn SearchAdapter>),
    Chat(Arc<dyn ChatAdapter>),
}

impl RegisteredAdapter {
    pub fn id(&self) -> &str {
        match self {
            Self::Search(a) => a.id(),
            Self::Chat(a) => a.id(),
        }
    }
}

impl std::fmt::Debug for RegisteredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search(a) => f.debug_tuple("Search").field(&a.id()).finish(),
            Self::Chat(a) => f.debug_tuple("Chat").field(&a.id()).finish(),
        }
    }
}

/// Directory mapping adapter ids to instances.
#[derive(Default)]
pub struct AdapterRegistry {
    search: RwLock<BTreeMap<String, Arc<dyn SearchAdapter>>>,
    chat: RwLock<BTreeMap<String, Arc<dyn ChatAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a search adapter under its id, replacing any previous one.
    pub fn register_search(&self, adapter: Arc<dyn SearchAdapter>) {
        let id = adapter.id().to_string();
        tracing::debug!(adapter = %id, "Registering search adapter");
        self.search
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, adapter);
    }

    /// Register a chat adapter under its id, replacing any previous one.
    pub fn register_chat(&self, adapter: Arc<dyn ChatAdapter>) {
        let id = adapter.id().to_string();
        tracing::debug!(adapter = %id, "Registering chat adapter");
        self.chat
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, adapter);
    }

    pub fn get(&self, capability: Capability, id: &str) -> Option<RegisteredAdapter> {
        match capability {
            Capability::Search => self.search(id).map(RegisteredAdapter::Search),
            Capability::Chat => self.chat(id).map(RegisteredAdapter::Chat),
        }
    }

    /// Registered ids, ascending.
    pub fn list(&self, capability: Capability) -> Vec<String> {
        match capability {
            Capability::Search => self
                .search
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect(),
            Capability::Chat => self
                .chat
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect(),
        }
    }

    pub fn search(&self, id: &str) -> Option<Arc<dyn SearchAdapter>> {
        self.search
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn chat(&self, id: &str) -> Option<Arc<dyn ChatAdapter>> {
        self.chat
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Like [`search`](Self::search), but absence is a configuration error.
    pub fn require_search(&self, id: &str) -> BrokerResult<Arc<dyn SearchAdapter>> {
        self.search(id).ok_or_else(|| {
            BrokerError::configuration(format!("no search adapter registered as '{id}'"))
        })
    }

    /// Like [`chat`](Self::chat), but absence is a configuration error.
    pub fn require_chat(&self, id: &str) -> BrokerResult<Arc<dyn ChatAdapter>> {
        self.chat(id).ok_or_else(|| {
            BrokerError::configuration(format!("no chat adapter registered as '{id}'"))
        })
    }

    /// All search adapters, ascending by id.
    pub fn search_adapters(&self) -> Vec<Arc<dyn SearchAdapter>> {
        self.search
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// All chat adapters, ascending by id.
    pub fn chat_adapters(&self) -> Vec<Arc<dyn ChatAdapter>> {
        self.chat
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("search", &self.list(Capability::Search))
            .field("chat", &self.list(Capability::Chat))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        ChatReply, SearchPage, SearchParams, SendOptions, SessionOpened, SessionOptions,
    };
    use crate::agent::{SearchHit, SessionTarget};
    use async_trait::async_trait;

    struct NamedSearch {
        id: String,
        tag: &'static str,
    }

    #[async_trait]
    impl SearchAdapter for NamedSearch {
        fn id(&self) -> &str {
            &self.id
        }

        async fn search(&self, params: &SearchParams) -> BrokerResult<SearchPage> {
            Ok(SearchPage {
                hits: vec![SearchHit::new(&params.registry, "1", self.tag)],
                total: Some(1),
            })
        }
    }

    struct NoopChat;

    #[async_trait]
    impl ChatAdapter for NoopChat {
        fn id(&self) -> &str {
            "noop"
        }

        async fn create_session(
            &self,
            _target: &SessionTarget,
            _options: &SessionOptions,
        ) -> BrokerResult<SessionOpened> {
            Ok(SessionOpened {
                session_id: "s".into(),
            })
        }

        async fn send_message(
            &self,
            _session_id: &str,
            _text: &str,
            _options: &SendOptions,
        ) -> BrokerResult<ChatReply> {
            Ok(ChatReply::default())
        }
    }

    fn named(id: &str, tag: &'static str) -> Arc<dyn SearchAdapter> {
        Arc::new(NamedSearch {
            id: id.into(),
            tag,
        })
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = AdapterRegistry::new();
        registry.register_search(named("erc8004", "first"));
        registry.register_search(named("erc8004", "second"));

        assert_eq!(registry.list(Capability::Search), vec!["erc8004"]);
        let adapter = registry.search("erc8004").unwrap();
        let page = adapter
            .search(&SearchParams {
                query: None,
                registry: "1".into(),
                filters: Default::default(),
                sort: Vec::new(),
                page: 1,
                page_size: 10,
            })
            .await
            .unwrap();
        assert_eq!(page.hits[0].name, "second");
    }

    #[test]
    fn test_capabilities_are_separate() {
        let registry = AdapterRegistry::new();
        registry.register_search(named("a", "a"));
        registry.register_chat(Arc::new(NoopChat));

        assert!(registry.get(Capability::Search, "a").is_some());
        assert!(registry.get(Capability::Chat, "a").is_none());
        assert_eq!(registry.list(Capability::Chat), vec!["noop"]);
        assert_eq!(
            registry.get(Capability::Chat, "noop").map(|a| a.id().to_string()),
            Some("noop".to_string())
        );
    }

    #[test]
    fn test_registration_order_independent() {
        let one = AdapterRegistry::new();
        one.register_search(named("b", "b"));
        one.register_search(named("a", "a"));

        let two = AdapterRegistry::new();
        two.register_search(named("a", "a"));
        two.register_search(named("b", "b"));

        assert_eq!(one.list(Capability::Search), two.list(Capability::Search));
    }

    #[test]
    fn test_require_missing_is_configuration_error() {
        let registry = AdapterRegistry::new();
        let err = registry.require_chat("nope").err().unwrap();
        assert!(matches!(err, BrokerError::Configuration(_)));
    }
}
