//! AgentBroker — the entry point tying discovery and sessions together.
//!
//! Owns the adapter registry and the UAID cache, and hands both to the
//! search aggregator and the session broker.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{ChatAdapter, SearchAdapter};
use crate::agent::{AgentHandle, SessionTarget};
use crate::cache::UaidCache;
use crate::config::BrokerConfig;
use crate::error::BrokerResult;
use crate::query::SearchQuery;
use crate::registry::AdapterRegistry;
use crate::retry::RetryPolicy;
use crate::search::{SearchAggregator, SearchOutcome};
use crate::session::{OpenRequest, SessionBroker, SessionHandle};

/// Discovery and messaging across registered adapters.
#[derive(Debug)]
pub struct AgentBroker {
    config: BrokerConfig,
    registry: Arc<AdapterRegistry>,
    cache: Arc<UaidCache>,
    search: SearchAggregator,
    sessions: SessionBroker,
}

impl AgentBroker {
    pub fn builder(config: BrokerConfig) -> AgentBrokerBuilder {
        AgentBrokerBuilder::new(config)
    }

    /// A broker with no adapters registered yet.
    pub fn new(config: BrokerConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<UaidCache> {
        &self.cache
    }

    // ── Discovery ────────────────────────────────────────────

    pub async fn search(&self, query: &SearchQuery) -> BrokerResult<SearchOutcome> {
        self.search.search(query).await
    }

    /// UAID learned from earlier searches, if any.
    pub fn resolve_uaid(&self, native_id: &str) -> Option<String> {
        self.cache.resolve(native_id)
    }

    /// Registries a query would be run against.
    pub fn effective_registries(&self, query: &SearchQuery) -> Vec<String> {
        self.search.effective_registries(query)
    }

    // ── Sessions ─────────────────────────────────────────────

    pub async fn open_session(&self, request: OpenRequest) -> BrokerResult<SessionHandle> {
        self.sessions.open(request).await
    }

    /// Open a session with an agent picked from search results, using the
    /// configured encryption preference and history TTL.
    ///
    /// The handle's UAID is filled from the cache when missing; the agent
    /// URL is only used when no UAID is known.
    pub async fn open_agent(&self, handle: &AgentHandle) -> BrokerResult<SessionHandle> {
        let filled = self.cache.fill(handle);
        let target = SessionTarget::from_handle(&filled)?;
        self.open_session(self.request_for(target)).await
    }

    /// Continue an existing session on the default chat adapter.
    pub async fn resume(
        &self,
        target: SessionTarget,
        session_id: impl Into<String>,
    ) -> BrokerResult<SessionHandle> {
        self.open_session(self.request_for(target).resume(session_id))
            .await
    }

    /// Open request carrying the configured session defaults.
    pub fn request_for(&self, target: SessionTarget) -> OpenRequest {
        let mut request = OpenRequest::new(target)
            .adapter(self.config.session.chat_adapter.clone())
            .encryption(self.config.session.encryption);
        if let Some(secs) = self.config.session.history_ttl_secs {
            request = request.history_ttl(Duration::from_secs(secs));
        }
        request
    }
}

/// Builder for [`AgentBroker`].
pub struct AgentBrokerBuilder {
    config: BrokerConfig,
    registry: Option<Arc<AdapterRegistry>>,
    cache: Option<Arc<UaidCache>>,
    retry: Option<RetryPolicy>,
    search_adapters: Vec<Arc<dyn SearchAdapter>>,
    chat_adapters: Vec<Arc<dyn ChatAdapter>>,
}

impl AgentBrokerBuilder {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            registry: None,
            cache: None,
            retry: None,
            search_adapters: Vec::new(),
            chat_adapters: Vec::new(),
        }
    }

    /// Share an existing registry instead of creating one.
    pub fn registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing UAID cache instead of creating one.
    pub fn cache(mut self, cache: Arc<UaidCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the retry policy derived from the config.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn search_adapter(mut self, adapter: Arc<dyn SearchAdapter>) -> Self {
        self.search_adapters.push(adapter);
        self
    }

    pub fn chat_adapter(mut self, adapter: Arc<dyn ChatAdapter>) -> Self {
        self.chat_adapters.push(adapter);
        self
    }

    pub fn build(self) -> AgentBroker {
        let registry = self.registry.unwrap_or_default();
        for adapter in self.search_adapters {
            registry.register_search(adapter);
        }
        for adapter in self.chat_adapters {
            registry.register_chat(adapter);
        }
        let cache = self.cache.unwrap_or_default();
        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::from_config(&self.config.retry));

        let search = SearchAggregator::new(
            registry.clone(),
            cache.clone(),
            retry.clone(),
            self.config.search.clone(),
        );
        let sessions = SessionBroker::new(
            registry.clone(),
            retry,
            self.config.session.chat_adapter.clone(),
        );

        AgentBroker {
            config: self.config,
            registry,
            cache,
            search,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{
        ChatCapabilities, ChatReply, SearchPage, SearchParams, SendOptions, SessionOpened,
        SessionOptions,
    };
    use crate::agent::{AgentEndpoints, SearchHit};
    use crate::error::BrokerError;
    use crate::session::{EncryptionPreference, SessionMode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Directory;

    #[async_trait]
    impl SearchAdapter for Directory {
        fn id(&self) -> &str {
            "erc8004-adapter"
        }

        async fn search(&self, params: &SearchParams) -> BrokerResult<SearchPage> {
            let hits = if params.registry == "1" {
                vec![SearchHit::new("1", "42", "Trader").with_uaid("uaid:aid:42")]
            } else {
                vec![]
            };
            Ok(SearchPage { total: Some(hits.len()), hits })
        }
    }

    #[derive(Default)]
    struct Recorder {
        targets: Mutex<Vec<SessionTarget>>,
        ttls: Mutex<Vec<Option<Duration>>>,
    }

    #[async_trait]
    impl ChatAdapter for Recorder {
        fn id(&self) -> &str {
            "registry-broker"
        }

        fn capabilities(&self) -> ChatCapabilities {
            ChatCapabilities { encryption: false }
        }

        async fn create_session(
            &self,
            target: &SessionTarget,
            options: &SessionOptions,
        ) -> BrokerResult<SessionOpened> {
            self.targets.lock().unwrap().push(target.clone());
            self.ttls.lock().unwrap().push(options.history_ttl);
            Ok(SessionOpened {
                session_id: "s-1".into(),
            })
        }

        async fn send_message(
            &self,
            _session_id: &str,
            text: &str,
            _options: &SendOptions,
        ) -> BrokerResult<ChatReply> {
            Ok(ChatReply {
                text: Some(format!("echo: {text}")),
                raw: None,
            })
        }
    }

    fn broker(config: BrokerConfig, chat: Arc<Recorder>) -> AgentBroker {
        AgentBroker::builder(config)
            .retry(RetryPolicy::none())
            .search_adapter(Arc::new(Directory))
            .chat_adapter(chat)
            .build()
    }

    #[tokio::test]
    async fn test_open_agent_uses_cached_uaid() {
        let chat = Arc::new(Recorder::default());
        let mut config = BrokerConfig::default();
        config.session.history_ttl_secs = Some(600);
        let broker = broker(config, chat.clone());

        broker.search(&SearchQuery::new()).await.unwrap();
        assert_eq!(broker.resolve_uaid("42").as_deref(), Some("uaid:aid:42"));

        // A handle obtained elsewhere, without its UAID.
        let handle = SearchHit::new("1", "42", "Trader")
            .with_endpoints(AgentEndpoints {
                agent_url: Some("https://trader.example.com".into()),
                ..Default::default()
            })
            .to_handle();
        let session = broker.open_agent(&handle).await.unwrap();

        assert_eq!(session.mode(), SessionMode::Plaintext);
        assert_eq!(
            chat.targets.lock().unwrap().as_slice(),
            &[SessionTarget::Uaid("uaid:aid:42".into())]
        );
        assert_eq!(
            chat.ttls.lock().unwrap().as_slice(),
            &[Some(Duration::from_secs(600))]
        );
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("echo: hi"));
    }

    #[tokio::test]
    async fn test_open_agent_falls_back_to_url() {
        let chat = Arc::new(Recorder::default());
        let broker = broker(BrokerConfig::default(), chat.clone());

        let handle = SearchHit::new("1", "7", "Unknown")
            .with_endpoints(AgentEndpoints {
                agent_url: Some("https://unknown.example.com".into()),
                ..Default::default()
            })
            .to_handle();
        broker.open_agent(&handle).await.unwrap();
        assert_eq!(
            chat.targets.lock().unwrap().as_slice(),
            &[SessionTarget::AgentUrl("https://unknown.example.com".into())]
        );
    }

    #[tokio::test]
    async fn test_required_encryption_without_support_fails() {
        let chat = Arc::new(Recorder::default());
        let mut config = BrokerConfig::default();
        config.session.encryption = EncryptionPreference::Required;
        let broker = broker(config, chat.clone());

        let err = broker
            .open_session(broker.request_for(SessionTarget::Uaid("u".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Configuration(_)));
        assert!(chat.targets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_agent_without_route_is_validation_error() {
        let broker = broker(BrokerConfig::default(), Arc::new(Recorder::default()));
        let handle = SearchHit::new("1", "nobody", "Nobody").to_handle();
        let err = broker.open_agent(&handle).await.unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));
    }
}
