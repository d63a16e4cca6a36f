//! Registry broker client — search, vector search and chat over HTTP.
//!
//! One client implements both [`SearchAdapter`] and [`ChatAdapter`].
//! [`RegistryBrokerClient::scoped`] derives search views restricted to one
//! broker-side adapter, registered under that adapter's id.

use std::time::{Duration, Instant};

use agentbroker_core::{
    AdapterRegistry, BrokerConfig, BrokerError, BrokerResult, ChatAdapter, ChatCapabilities,
    ChatReply, FilterSupport, SearchAdapter, SearchCapabilities, SearchPage, SearchParams,
    SendOptions, SessionMode, SessionOpened, SessionOptions, SessionTarget, VectorSearchRequest,
    VectorSearchResponse,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{map_reqwest_error, status_error};
use crate::wire;

/// Id of the unscoped client.
pub const DEFAULT_ID: &str = "registry-broker";

/// Per-request timeout applied by [`RegistryBrokerClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page the broker serves.
pub const MAX_PAGE_SIZE: usize = 100;

const API_KEY_HEADER: &str = "x-api-key";

/// Client for a registry broker REST API.
#[derive(Debug, Clone)]
pub struct RegistryBrokerClient {
    /// Registry key of this instance.
    id: String,

    /// API base URL, e.g. `https://broker.example.com/api/v1`.
    base_url: Url,

    /// HTTP client.
    http: Client,

    /// Sent as `x-api-key` when set.
    api_key: Option<String>,

    /// Broker-side adapter this view searches through.
    adapter_scope: Option<String>,

    /// Id of the unscoped client a scoped view was derived from.
    parent: Option<String>,

    /// Whether `start_encrypted` is advertised.
    encryption: bool,
}

impl RegistryBrokerClient {
    /// Create a client for the broker at `base_url`.
    pub fn new(base_url: &str) -> BrokerResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(map_reqwest_error)?;
        Self::with_http_client(base_url, http)
    }

    /// Create a client with a custom HTTP client.
    pub fn with_http_client(base_url: &str, http: Client) -> BrokerResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            BrokerError::configuration(format!("invalid broker url '{base_url}': {e}"))
        })?;
        Ok(Self {
            id: DEFAULT_ID.into(),
            base_url,
            http,
            api_key: None,
            adapter_scope: None,
            parent: None,
            encryption: true,
        })
    }

    /// Create from a [`BrokerConfig`] (URL and API key).
    pub fn from_config(config: &BrokerConfig) -> BrokerResult<Self> {
        let client = Self::new(&config.url)?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        })
    }

    /// Set API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Advertise (or hide) encrypted session support.
    pub fn with_encryption(mut self, enabled: bool) -> Self {
        self.encryption = enabled;
        self
    }

    /// A search view restricted to broker-side adapter `adapter_id`,
    /// registered under the same id.
    pub fn scoped(&self, adapter_id: impl Into<String>) -> Self {
        let adapter_id = adapter_id.into();
        Self {
            id: adapter_id.clone(),
            adapter_scope: Some(adapter_id),
            parent: Some(self.parent.clone().unwrap_or_else(|| self.id.clone())),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register this client as the search and chat adapter
    /// [`DEFAULT_ID`], plus one scoped search view per id in `scopes`.
    pub fn register(self, registry: &AdapterRegistry, scopes: &[String]) {
        let client = std::sync::Arc::new(self);
        for scope in scopes.iter().filter(|s| s.as_str() != client.id) {
            registry.register_search(std::sync::Arc::new(client.scoped(scope.clone())));
        }
        registry.register_search(client.clone());
        registry.register_chat(client);
    }

    /// Check the broker answers at all.
    pub async fn ping(&self) -> BrokerResult<Duration> {
        let started = Instant::now();
        let url = self.endpoint("health")?;
        self.send_json::<Value>(self.http.get(url)).await?;
        Ok(started.elapsed())
    }

    // ── Internal Transport ───────────────────────────────────

    fn endpoint(&self, path: &str) -> BrokerResult<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| BrokerError::configuration(format!("invalid url '{raw}': {e}")))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> BrokerResult<T> {
        let response = self
            .authed(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            tracing::debug!(adapter = %self.id, %status, "Broker request failed");
            return Err(status_error(status, &headers, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            BrokerError::upstream(Some(status.as_u16()), format!("undecodable response: {e}"))
        })
    }

    async fn open(
        &self,
        target: &SessionTarget,
        options: &SessionOptions,
        encryption: Option<&'static str>,
    ) -> BrokerResult<SessionOpened> {
        let (uaid, agent_url) = match target {
            SessionTarget::Uaid(uaid) => (Some(uaid.as_str()), None),
            SessionTarget::AgentUrl(url) => (None, Some(url.as_str())),
        };
        let body = wire::CreateSessionBody {
            uaid,
            agent_url,
            history_ttl_seconds: options.history_ttl.map(|ttl| ttl.as_secs()),
            encryption,
            metadata: &options.metadata,
        };
        tracing::debug!(adapter = %self.id, %target, encrypted = encryption.is_some(), "Creating chat session");

        let url = self.endpoint("chat/session")?;
        let session: wire::SessionResponse = self.send_json(self.http.post(url).json(&body)).await?;
        if session.session_id.trim().is_empty() {
            return Err(BrokerError::upstream(None, "broker returned an empty session id"));
        }
        Ok(SessionOpened {
            session_id: session.session_id,
        })
    }
}

#[async_trait]
impl SearchAdapter for RegistryBrokerClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn narrows(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities {
            vector_search: true,
            filters: FilterSupport {
                name_contains: true,
                ..FilterSupport::NONE
            },
            native_sort: false,
            max_page_size: Some(MAX_PAGE_SIZE),
        }
    }

    async fn search(&self, params: &SearchParams) -> BrokerResult<SearchPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("registry", params.registry.clone()),
            ("page", params.page.to_string()),
            ("limit", params.page_size.to_string()),
        ];
        if let Some(q) = &params.query {
            query.push(("q", q.clone()));
        }
        if let Some(adapter) = &self.adapter_scope {
            query.push(("adapters", adapter.clone()));
        }
        if let Some(name) = &params.filters.name_contains {
            query.push(("name", name.clone()));
        }

        tracing::debug!(
            adapter = %self.id,
            registry = %params.registry,
            page = params.page,
            "Searching broker"
        );
        let url = self.endpoint("search")?;
        let response: wire::SearchResponse =
            self.send_json(self.http.get(url).query(&query)).await?;

        Ok(SearchPage {
            total: response.total,
            hits: response
                .hits
                .into_iter()
                .map(|hit| hit.into_hit(&params.registry))
                .collect(),
        })
    }

    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
    ) -> BrokerResult<VectorSearchResponse> {
        let single = match request.registries.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        };
        let needs_filter =
            (single.is_none() && !request.registries.is_empty()) || !request.filters.is_empty();
        let registries: &[String] = if single.is_some() { &[] } else { &request.registries };
        let body = wire::VectorSearchBody {
            query: &request.query,
            limit: request.limit,
            registry: single,
            filter: needs_filter.then_some(wire::VectorFilter {
                registries,
                filters: &request.filters,
            }),
        };

        tracing::debug!(adapter = %self.id, limit = request.limit, "Vector search");
        let started = Instant::now();
        let url = self.endpoint("search/vector")?;
        let response: wire::VectorSearchResponse =
            self.send_json(self.http.post(url).json(&body)).await?;
        let fallback_registry = single.unwrap_or_default();

        Ok(VectorSearchResponse {
            total: response.total,
            elapsed: Some(
                response
                    .took_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| started.elapsed()),
            ),
            hits: response
                .hits
                .into_iter()
                .map(|hit| hit.into_hit(fallback_registry))
                .collect(),
        })
    }
}

#[async_trait]
impl ChatAdapter for RegistryBrokerClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> ChatCapabilities {
        ChatCapabilities {
            encryption: self.encryption,
        }
    }

    async fn create_session(
        &self,
        target: &SessionTarget,
        options: &SessionOptions,
    ) -> BrokerResult<SessionOpened> {
        self.open(target, options, None).await
    }

    async fn start_encrypted(
        &self,
        target: &SessionTarget,
        options: &SessionOptions,
    ) -> BrokerResult<SessionOpened> {
        self.open(target, options, Some("required")).await
    }

    async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> BrokerResult<ChatReply> {
        let body = wire::SendMessageBody {
            session_id,
            message: text,
            encrypted: options.mode == SessionMode::Encrypted,
        };
        let url = self.endpoint("chat/message")?;
        let raw: Value = self.send_json(self.http.post(url).json(&body)).await?;
        Ok(ChatReply {
            text: wire::reply_text(&raw),
            raw: Some(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbroker_core::{AgentBroker, EncryptionPreference, RetryPolicy, SearchQuery};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(registry: &str) -> SearchParams {
        SearchParams {
            query: Some("trading".into()),
            registry: registry.into(),
            filters: Default::default(),
            sort: Vec::new(),
            page: 1,
            page_size: 20,
        }
    }

    async fn client(server: &MockServer) -> RegistryBrokerClient {
        RegistryBrokerClient::new(&format!("{}/api/v1", server.uri()))
            .unwrap()
            .with_api_key("secret")
    }

    #[tokio::test]
    async fn test_search_request_and_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("q", "trading"))
            .and(query_param("registry", "137"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "20"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [
                    {"id": "7", "uaid": "uaid:aid:7", "name": "Trader",
                     "endpoints": {"mcp": "https://t.example.com/mcp"}}
                ],
                "total": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server).await.search(&params("137")).await.unwrap();
        assert_eq!(page.total, Some(1));
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].registry, "137");
        assert_eq!(page.hits[0].uaid.as_deref(), Some("uaid:aid:7"));
    }

    #[tokio::test]
    async fn test_scoped_view_sends_adapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("adapters", "erc8004-adapter"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": []})))
            .expect(1)
            .mount(&server)
            .await;

        let scoped = client(&server).await.scoped("erc8004-adapter");
        assert_eq!(SearchAdapter::id(&scoped), "erc8004-adapter");
        let page = scoped.search(&params("1")).await.unwrap();
        assert!(page.hits.is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v1/search"))
            .and(query_param("registry", "429"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/search"))
            .and(query_param("registry", "503"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/search"))
            .and(query_param("registry", "400"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad registry"))
            .mount(&server)
            .await;
        Mock::given(path("/api/v1/search"))
            .and(query_param("registry", "garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let c = client(&server).await;
        let err = c.search(&params("429")).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        let err = c.search(&params("503")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Upstream { status: Some(503), .. }));
        let err = c.search(&params("400")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Validation(_)));
        let err = c.search(&params("garbage")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        let c = RegistryBrokerClient::new("http://127.0.0.1:9/api/v1").unwrap();
        let err = c.search(&params("1")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, BrokerError::Network { .. }));
    }

    #[tokio::test]
    async fn test_vector_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/search/vector"))
            .and(body_partial_json(json!({"query": "trading", "limit": 5, "registry": "1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [{"id": "1", "name": "A", "score": 0.92}],
                "total": 1,
                "tookMs": 12
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .await
            .vector_search(&VectorSearchRequest {
                query: "trading".into(),
                limit: 5,
                registries: vec!["1".into()],
                filters: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(response.hits[0].score, Some(0.92));
        assert_eq!(response.hits[0].registry, "1");
        assert_eq!(response.elapsed, Some(Duration::from_millis(12)));
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/session"))
            .and(body_partial_json(json!({"uaid": "uaid:aid:7", "historyTtlSeconds": 300})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "s-9"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/message"))
            .and(body_partial_json(json!({"sessionId": "s-9", "message": "hi", "encrypted": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "hello"})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server).await;
        let opened = c
            .create_session(
                &SessionTarget::Uaid("uaid:aid:7".into()),
                &SessionOptions {
                    history_ttl: Some(Duration::from_secs(300)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(opened.session_id, "s-9");

        let reply = c
            .send_message(
                "s-9",
                "hi",
                &SendOptions {
                    mode: SessionMode::Plaintext,
                },
            )
            .await
            .unwrap();
        assert_eq!(reply.text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_broker_falls_back_when_encryption_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/session"))
            .and(body_partial_json(json!({"encryption": "required"})))
            .respond_with(ResponseTemplate::new(400).set_body_string("encryption unavailable"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": "plain-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(AdapterRegistry::new());
        client(&server).await.register(&registry, &[]);
        let mut config = BrokerConfig::default();
        config.session.encryption = EncryptionPreference::Preferred;
        let broker = AgentBroker::builder(config)
            .registry(registry)
            .retry(RetryPolicy::none())
            .build();

        let session = broker
            .open_session(broker.request_for(SessionTarget::Uaid("uaid:aid:7".into())))
            .await
            .unwrap();
        assert_eq!(session.session_id(), "plain-1");
        assert_eq!(session.mode(), SessionMode::Plaintext);
        assert!(session.encryption_fallback().is_some());
    }

    #[tokio::test]
    async fn test_broker_search_through_scoped_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("adapters", "erc8004-adapter"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [{"id": "42", "uaid": "uaid:aid:42", "name": "Trader"}],
                "total": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(AdapterRegistry::new());
        client(&server)
            .await
            .register(&registry, &["erc8004-adapter".to_string()]);
        let broker = AgentBroker::builder(BrokerConfig::default())
            .registry(registry)
            .retry(RetryPolicy::none())
            .build();

        let outcome = broker.search(&SearchQuery::new()).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(broker.resolve_uaid("42").as_deref(), Some("uaid:aid:42"));
    }

    #[tokio::test]
    async fn test_broker_search_other_registry_calls_broker_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("adapters", "erc8004-adapter"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": []})))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/search"))
            .and(query_param("registry", "137"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [{"id": "7", "uaid": "uaid:aid:7", "name": "Trader"}],
                "total": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(AdapterRegistry::new());
        client(&server)
            .await
            .register(&registry, &["erc8004-adapter".to_string()]);
        let broker = AgentBroker::builder(BrokerConfig::default())
            .registry(registry)
            .retry(RetryPolicy::none())
            .build();

        let outcome = broker
            .search(&SearchQuery::new().registry("137"))
            .await
            .unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.total, Some(1));
        assert_eq!(outcome.hits[0].source_adapter.as_deref(), Some(DEFAULT_ID));
    }

    #[test]
    fn test_scoped_view_narrows_parent() {
        let base = RegistryBrokerClient::new("https://broker.example.com/api/v1").unwrap();
        assert_eq!(SearchAdapter::narrows(&base), None);
        let scoped = base.scoped("erc8004-adapter").scoped("other");
        assert_eq!(SearchAdapter::narrows(&scoped), Some(DEFAULT_ID));
    }
}
