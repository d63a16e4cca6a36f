//! Adapter contracts — the capability interfaces every backend implements.
//!
//! Optional capabilities (vector search, encrypted sessions) are advertised
//! through explicit flags and checked before use. The default trait methods
//! for them fail with [`BrokerError::Configuration`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::{SearchHit, SessionTarget};
use crate::error::{BrokerError, BrokerResult};
use crate::query::{SearchFilters, SortKey};
use crate::session::SessionMode;

/// Adapter capability kinds held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Search,
    Chat,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Search => write!(f, "search"),
            Capability::Chat => write!(f, "chat"),
        }
    }
}

// ── Search ───────────────────────────────────────────────────

/// Which filter kinds an adapter evaluates server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterSupport {
    pub equality: bool,
    pub membership: bool,
    pub existence: bool,
    pub name_contains: bool,
}

impl FilterSupport {
    pub const NONE: Self = Self {
        equality: false,
        membership: false,
        existence: false,
        name_contains: false,
    };

    pub const ALL: Self = Self {
        equality: true,
        membership: true,
        existence: true,
        name_contains: true,
    };

    /// The part of `filters` this adapter can evaluate itself.
    pub fn pushdown(&self, filters: &SearchFilters) -> SearchFilters {
        SearchFilters {
            equality: if self.equality { filters.equality.clone() } else { Default::default() },
            membership: if self.membership { filters.membership.clone() } else { Default::default() },
            existence: if self.existence { filters.existence.clone() } else { Default::default() },
            name_contains: if self.name_contains { filters.name_contains.clone() } else { None },
        }
    }

    /// The part of `filters` left for the client.
    pub fn residual(&self, filters: &SearchFilters) -> SearchFilters {
        SearchFilters {
            equality: if self.equality { Default::default() } else { filters.equality.clone() },
            membership: if self.membership { Default::default() } else { filters.membership.clone() },
            existence: if self.existence { Default::default() } else { filters.existence.clone() },
            name_contains: if self.name_contains { None } else { filters.name_contains.clone() },
        }
    }
}

/// What a search adapter can do beyond plain keyword search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCapabilities {
    /// `vector_search` is implemented.
    pub vector_search: bool,
    /// Filters evaluated server-side.
    pub filters: FilterSupport,
    /// Results come back already ordered by the requested sort keys.
    pub native_sort: bool,
    /// Largest page the adapter serves.
    pub max_page_size: Option<usize>,
}

/// Parameters of one keyword search call against one registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub registry: String,
    /// Only the filters the adapter declared support for.
    pub filters: SearchFilters,
    /// Only set when the adapter declared native sorting.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

/// One page of keyword results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    /// Total matches across all pages, when the adapter knows it.
    pub total: Option<usize>,
}

/// A semantic search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchRequest {
    pub query: String,
    pub limit: usize,
    pub registries: Vec<String>,
    pub filters: SearchFilters,
}

/// Semantic search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: Option<usize>,
    /// Time the backend spent answering, when it reports it.
    pub elapsed: Option<Duration>,
}

/// A discovery backend.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Registry key of this adapter.
    fn id(&self) -> &str;

    /// Id of the adapter this one is a restricted view of. An unrestricted
    /// search skips the view when that adapter is searched too.
    fn narrows(&self) -> Option<&str> {
        None
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities::default()
    }

    /// Keyword/structured search.
    async fn search(&self, params: &SearchParams) -> BrokerResult<SearchPage>;

    /// Semantic search. Only called when `capabilities().vector_search`.
    async fn vector_search(
        &self,
        _request: &VectorSearchRequest,
    ) -> BrokerResult<VectorSearchResponse> {
        Err(BrokerError::configuration(format!(
            "search adapter '{}' does not support vector search",
            self.id()
        )))
    }
}

// ── Chat ─────────────────────────────────────────────────────

/// What a chat adapter can do beyond plaintext sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatCapabilities {
    /// `start_encrypted` is implemented.
    pub encryption: bool,
}

/// Options passed when opening a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    /// How long the backend should keep the conversation history.
    pub history_ttl: Option<Duration>,
    /// Opaque values forwarded to the backend.
    pub metadata: Map<String, Value>,
}

/// A session the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOpened {
    pub session_id: String,
}

/// Options for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub mode: SessionMode,
}

/// The agent's answer to one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub text: Option<String>,
    /// Backend payload as received.
    pub raw: Option<Value>,
}

/// A conversational backend.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Registry key of this adapter.
    fn id(&self) -> &str;

    fn capabilities(&self) -> ChatCapabilities {
        ChatCapabilities::default()
    }

    /// Open a plaintext session.
    async fn create_session(
        &self,
        target: &SessionTarget,
        options: &SessionOptions,
    ) -> BrokerResult<SessionOpened>;

    /// Send one message within a session.
    async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        options: &SendOptions,
    ) -> BrokerResult<ChatReply>;

    /// Open an encrypted session. Only called when `capabilities().encryption`.
    async fn start_encrypted(
        &self,
        _target: &SessionTarget,
        _options: &SessionOptions,
    ) -> BrokerResult<SessionOpened> {
        Err(BrokerError::configuration(format!(
            "chat adapter '{}' does not support encrypted sessions",
            self.id()
        )))
    }
}
