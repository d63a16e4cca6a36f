//! Request and response bodies of the registry broker REST API.

use agentbroker_core::{AgentEndpoints, SearchFilters, SearchHit};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Search ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    #[serde(default, alias = "results", alias = "agents")]
    pub hits: Vec<HitDto>,
    #[serde(default)]
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HitDto {
    #[serde(alias = "nativeId", alias = "originalId")]
    pub id: String,
    #[serde(default)]
    pub uaid: Option<String>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub endpoints: Option<EndpointsDto>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub adapter: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointsDto {
    #[serde(default, alias = "url")]
    pub agent_url: Option<String>,
    #[serde(default)]
    pub mcp: Option<String>,
    #[serde(default)]
    pub a2a: Option<String>,
}

impl HitDto {
    /// Convert to a [`SearchHit`], defaulting the registry to the one that
    /// was searched.
    pub fn into_hit(self, fallback_registry: &str) -> SearchHit {
        let endpoints = self
            .endpoints
            .map(|e| AgentEndpoints {
                agent_url: e.agent_url.filter(|v| !v.is_empty()),
                mcp: e.mcp.filter(|v| !v.is_empty()),
                a2a: e.a2a.filter(|v| !v.is_empty()),
            })
            .unwrap_or_default();
        SearchHit {
            native_id: self.id,
            uaid: self.uaid.filter(|u| !u.trim().is_empty()),
            registry: self
                .registry
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| fallback_registry.to_string()),
            name: self.name,
            description: self.description.unwrap_or_default(),
            score: self.score,
            endpoints,
            protocols: self.protocols,
            source_adapter: self.adapter,
            metadata: self.metadata,
        }
    }
}

// ── Vector search ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VectorSearchBody<'a> {
    pub query: &'a str,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<VectorFilter<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VectorFilter<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub registries: &'a [String],
    #[serde(flatten)]
    pub filters: &'a SearchFilters,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VectorSearchResponse {
    #[serde(default, alias = "results")]
    pub hits: Vec<HitDto>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub took_ms: Option<u64>,
}

// ── Chat ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uaid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_ttl_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<&'static str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: &'a Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionResponse {
    #[serde(alias = "id")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageBody<'a> {
    pub session_id: &'a str,
    pub message: &'a str,
    pub encrypted: bool,
}

/// Text of a chat reply: the first string found under `message`,
/// `content`, `text` or `response`.
pub(crate) fn reply_text(raw: &Value) -> Option<String> {
    ["message", "content", "text", "response"]
        .iter()
        .find_map(|key| match raw.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(inner)) => inner
                .get("content")
                .or_else(|| inner.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
