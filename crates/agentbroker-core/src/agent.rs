//! Agent — what discovery produces and what sessions are opened against.
//!
//! A [`SearchHit`] is the normalized result of any search source. Callers
//! pick one and turn it into an [`AgentHandle`], which is then resolved to a
//! [`SessionTarget`] when a conversation is opened.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{BrokerError, BrokerResult};

/// Endpoint URLs an agent advertises through its registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentEndpoints {
    /// Generic conversational endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,

    /// Model Context Protocol endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<String>,

    /// Agent-to-Agent protocol endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a2a: Option<String>,
}

impl AgentEndpoints {
    /// The endpoint a session may be opened against when no UAID is known.
    pub fn session_url(&self) -> Option<&str> {
        non_empty(self.agent_url.as_deref()).or_else(|| non_empty(self.a2a.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.agent_url.is_none() && self.mcp.is_none() && self.a2a.is_none()
    }
}

/// A normalized discovery result.
///
/// The uniqueness key is `(registry, native_id)`. Hits from different
/// sources are not deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Identifier native to the registry (e.g. an on-chain token id).
    pub native_id: String,

    /// Routing identifier, when the source knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uaid: Option<String>,

    /// Registry the agent is registered under.
    pub registry: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Relevance score reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "AgentEndpoints::is_empty")]
    pub endpoints: AgentEndpoints,

    /// Protocols the agent speaks (e.g. "mcp", "a2a").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,

    /// Id of the search adapter that produced this hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_adapter: Option<String>,

    /// Source-specific fields not covered above.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl SearchHit {
    /// Create a hit with the mandatory fields set.
    pub fn new(
        registry: impl Into<String>,
        native_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            native_id: native_id.into(),
            uaid: None,
            registry: registry.into(),
            name: name.into(),
            description: String::new(),
            score: None,
            endpoints: AgentEndpoints::default(),
            protocols: Vec::new(),
            source_adapter: None,
            metadata: Map::new(),
        }
    }

    pub fn with_uaid(mut self, uaid: impl Into<String>) -> Self {
        self.uaid = Some(uaid.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_endpoints(mut self, endpoints: AgentEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// `(registry, native_id)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.registry, &self.native_id)
    }

    /// Look up a field by name for client-side filtering and sorting.
    ///
    /// Well-known fields are addressed by their camelCase or snake_case
    /// name; `mcp`, `a2a` and `agentUrl` address the endpoints; anything
    /// else is looked up in `metadata` (a `metadata.` prefix is accepted).
    pub fn field(&self, name: &str) -> Option<Value> {
        let opt_str = |v: &Option<String>| v.as_ref().map(|s| Value::String(s.clone()));
        match name {
            "nativeId" | "native_id" | "id" => Some(Value::String(self.native_id.clone())),
            "uaid" => opt_str(&self.uaid),
            "registry" => Some(Value::String(self.registry.clone())),
            "name" => Some(Value::String(self.name.clone())),
            "description" => Some(Value::String(self.description.clone())),
            "score" => self.score.and_then(serde_json::Number::from_f64).map(Value::Number),
            "mcp" | "endpoints.mcp" => opt_str(&self.endpoints.mcp),
            "a2a" | "endpoints.a2a" => opt_str(&self.endpoints.a2a),
            "agentUrl" | "agent_url" | "endpoints.agentUrl" => opt_str(&self.endpoints.agent_url),
            "protocols" => Some(Value::Array(
                self.protocols.iter().cloned().map(Value::String).collect(),
            )),
            "adapter" | "sourceAdapter" | "source_adapter" => opt_str(&self.source_adapter),
            other => {
                let key = other.strip_prefix("metadata.").unwrap_or(other);
                self.metadata.get(key).cloned()
            }
        }
    }

    /// The handle a caller keeps after picking this hit.
    pub fn to_handle(&self) -> AgentHandle {
        AgentHandle {
            native_id: self.native_id.clone(),
            uaid: self.uaid.clone().filter(|u| !u.is_empty()),
            registry: self.registry.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            endpoints: self.endpoints.clone(),
        }
    }
}

/// An agent picked from search results.
///
/// Handles are values: resolving a UAID later produces a new handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandle {
    pub native_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uaid: Option<String>,

    pub registry: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "AgentEndpoints::is_empty")]
    pub endpoints: AgentEndpoints,
}

impl AgentHandle {
    /// Copy of this handle with `uaid` set.
    pub fn with_uaid(&self, uaid: impl Into<String>) -> Self {
        Self {
            uaid: Some(uaid.into()),
            ..self.clone()
        }
    }
}

impl From<SearchHit> for AgentHandle {
    fn from(hit: SearchHit) -> Self {
        hit.to_handle()
    }
}

/// What a conversation is opened against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SessionTarget {
    /// Route through the broker by UAID.
    Uaid(String),
    /// Talk to an agent endpoint directly.
    AgentUrl(String),
}

impl SessionTarget {
    /// Target an agent by UAID.
    pub fn uaid(uaid: impl Into<String>) -> BrokerResult<Self> {
        let uaid = uaid.into();
        if uaid.trim().is_empty() {
            return Err(BrokerError::validation("session target uaid is empty"));
        }
        Ok(Self::Uaid(uaid))
    }

    /// Target an agent endpoint. The URL must parse.
    pub fn agent_url(url: impl Into<String>) -> BrokerResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(BrokerError::validation("session target url is empty"));
        }
        Url::parse(&url)
            .map_err(|e| BrokerError::validation(format!("invalid agent url '{url}': {e}")))?;
        Ok(Self::AgentUrl(url))
    }

    /// Resolve a handle: UAID first, then the advertised endpoint URL.
    pub fn from_handle(handle: &AgentHandle) -> BrokerResult<Self> {
        if let Some(uaid) = non_empty(handle.uaid.as_deref()) {
            return Self::uaid(uaid);
        }
        if let Some(url) = handle.endpoints.session_url() {
            return Self::agent_url(url);
        }
        Err(BrokerError::validation(format!(
            "agent {}:{} has neither a uaid nor an endpoint url",
            handle.registry, handle.native_id
        )))
    }

    /// The identifier or URL carried by this target.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uaid(v) | Self::AgentUrl(v) => v,
        }
    }
}

impl std::fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionTarget::Uaid(uaid) => write!(f, "uaid:{uaid}"),
            SessionTarget::AgentUrl(url) => write!(f, "{url}"),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
