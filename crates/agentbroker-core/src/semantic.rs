//! Semantic index — embeddings plus a vector store, exposed to the
//! aggregator as a vector-capable search source.
//!
//! Vector ids are `"{registry}-{native_id}"`, so indexing an agent twice
//! overwrites its vector instead of duplicating it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapter::{
    FilterSupport, SearchAdapter, SearchCapabilities, SearchPage, SearchParams,
    VectorSearchRequest, VectorSearchResponse,
};
use crate::agent::{AgentEndpoints, SearchHit};
use crate::config::SemanticConfig;
use crate::error::{BrokerError, BrokerResult};

// ── Records ──────────────────────────────────────────────────

/// An agent as stored in the semantic index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub registry: String,
    pub native_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uaid: Option<String>,
    #[serde(default)]
    pub endpoints: AgentEndpoints,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AgentRecord {
    pub fn key(&self) -> VectorKey {
        VectorKey::new(&self.registry, &self.native_id)
    }

    pub fn vector_id(&self) -> String {
        self.key().vector_id()
    }

    fn into_hit(self, score: f32, source_adapter: &str) -> SearchHit {
        SearchHit {
            native_id: self.native_id,
            uaid: self.uaid,
            registry: self.registry,
            name: self.name,
            description: self.description,
            score: Some(f64::from(score)),
            endpoints: self.endpoints,
            protocols: self.protocols,
            source_adapter: Some(source_adapter.to_string()),
            metadata: self.metadata,
        }
    }
}

impl From<&SearchHit> for AgentRecord {
    fn from(hit: &SearchHit) -> Self {
        Self {
            registry: hit.registry.clone(),
            native_id: hit.native_id.clone(),
            name: hit.name.clone(),
            description: hit.description.clone(),
            uaid: hit.uaid.clone(),
            endpoints: hit.endpoints.clone(),
            protocols: hit.protocols.clone(),
            metadata: hit.metadata.clone(),
        }
    }
}

/// Identifies one indexed agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorKey {
    pub registry: String,
    pub native_id: String,
}

impl VectorKey {
    pub fn new(registry: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            native_id: native_id.into(),
        }
    }

    pub fn vector_id(&self) -> String {
        format!("{}-{}", self.registry, self.native_id)
    }
}

/// A vector with its payload, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub registry: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// Store-level query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    /// Restrict to these registries. Empty: all.
    pub registries: Vec<String>,
}

/// Store-level match.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// Caller-level semantic query.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticQuery {
    pub text: String,
    pub top_k: usize,
    pub registries: Vec<String>,
}

impl SemanticQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            registries: Vec::new(),
        }
    }
}

/// A ranked semantic match.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub record: AgentRecord,
    pub score: f32,
}

// ── Providers ────────────────────────────────────────────────

/// Turns agent descriptions into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_one(&self, text: &str) -> BrokerResult<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> BrokerResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }

    /// Text embedded for a record.
    fn describe(&self, record: &AgentRecord) -> String {
        let mut text = record.name.clone();
        if !record.description.is_empty() {
            text.push_str(". ");
            text.push_str(&record.description);
        }
        if !record.protocols.is_empty() {
            text.push_str(". Protocols: ");
            text.push_str(&record.protocols.join(", "));
        }
        text
    }
}

/// Persists vectors and answers nearest-neighbour queries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn supports_batch_upsert(&self) -> bool {
        false
    }

    fn supports_batch_delete(&self) -> bool {
        false
    }

    async fn upsert(&self, record: VectorRecord) -> BrokerResult<()>;

    async fn upsert_batch(&self, _records: Vec<VectorRecord>) -> BrokerResult<()> {
        Err(BrokerError::configuration("vector store has no batch upsert"))
    }

    async fn query(&self, query: &VectorQuery) -> BrokerResult<Vec<VectorMatch>>;

    async fn delete(&self, id: &str) -> BrokerResult<()>;

    async fn delete_batch(&self, _ids: &[String]) -> BrokerResult<()> {
        Err(BrokerError::configuration("vector store has no batch delete"))
    }
}

// ── Index manager ────────────────────────────────────────────

/// Owns embedding generation and vector upsert/query/delete.
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    min_score: f32,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            min_score: 0.0,
        }
    }

    /// The built-in [`HashEmbedder`] at the configured dimension, with the
    /// configured score floor.
    pub fn from_config(config: &SemanticConfig, store: Arc<dyn VectorStore>) -> Self {
        Self::new(Arc::new(HashEmbedder::new(config.dimension)), store)
            .with_min_score(config.min_score)
    }

    /// Drop matches scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    /// Embed and store one record. Returns its vector id.
    pub async fn index_one(&self, record: &AgentRecord) -> BrokerResult<String> {
        let text = self.embedder.describe(record);
        let vector = self.embedder.embed_one(&text).await?;
        let entry = to_vector_record(record, vector)?;
        let id = entry.id.clone();
        self.store.upsert(entry).await?;
        tracing::debug!(vector_id = %id, "Indexed agent");
        Ok(id)
    }

    /// Embed and store many records. Returns how many were written.
    pub async fn index_batch(&self, records: &[AgentRecord]) -> BrokerResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = records.iter().map(|r| self.embedder.describe(r)).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != records.len() {
            return Err(BrokerError::upstream(
                None,
                format!(
                    "embedding provider returned {} vectors for {} texts",
                    vectors.len(),
                    records.len()
                ),
            ));
        }
        let entries = records
            .iter()
            .zip(vectors)
            .map(|(record, vector)| to_vector_record(record, vector))
            .collect::<BrokerResult<Vec<_>>>()?;
        let count = entries.len();

        if self.store.supports_batch_upsert() {
            self.store.upsert_batch(entries).await?;
        } else {
            for entry in entries {
                self.store.upsert(entry).await?;
            }
        }
        tracing::debug!(count, "Indexed agent batch");
        Ok(count)
    }

    pub async fn delete_one(&self, key: &VectorKey) -> BrokerResult<()> {
        self.store.delete(&key.vector_id()).await
    }

    /// Delete many; sequential single deletes when the store has no batch
    /// delete.
    pub async fn delete_batch(&self, keys: &[VectorKey]) -> BrokerResult<()> {
        let ids: Vec<String> = keys.iter().map(VectorKey::vector_id).collect();
        if self.store.supports_batch_delete() {
            return self.store.delete_batch(&ids).await;
        }
        for id in &ids {
            self.store.delete(id).await?;
        }
        Ok(())
    }

    /// Ranked matches at or above `min_score`, best first.
    pub async fn query(&self, request: &SemanticQuery) -> BrokerResult<Vec<SemanticMatch>> {
        if request.text.trim().is_empty() {
            return Err(BrokerError::validation("semantic query text is empty"));
        }
        if request.top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(&request.text).await?;
        let mut matches = self
            .store
            .query(&VectorQuery {
                vector,
                top_k: request.top_k,
                registries: request.registries.clone(),
            })
            .await?;

        matches.retain(|m| m.score >= self.min_score);
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(request.top_k);

        matches
            .into_iter()
            .map(|m| {
                let record: AgentRecord = serde_json::from_value(m.payload).map_err(|e| {
                    BrokerError::upstream(None, format!("corrupt payload for {}: {e}", m.id))
                })?;
                Ok(SemanticMatch {
                    record,
                    score: m.score,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

fn to_vector_record(record: &AgentRecord, vector: Vec<f32>) -> BrokerResult<VectorRecord> {
    let payload = serde_json::to_value(record)
        .map_err(|e| BrokerError::validation(format!("unserializable record: {e}")))?;
    Ok(VectorRecord {
        id: record.vector_id(),
        registry: record.registry.clone(),
        vector,
        payload,
    })
}

// ── Search source ────────────────────────────────────────────

/// Exposes a [`SemanticIndex`] as a vector-capable search adapter.
pub struct SemanticSearchAdapter {
    id: String,
    index: Arc<SemanticIndex>,
}

impl SemanticSearchAdapter {
    pub fn new(id: impl Into<String>, index: Arc<SemanticIndex>) -> Self {
        Self {
            id: id.into(),
            index,
        }
    }

    async fn ranked_hits(
        &self,
        text: &str,
        limit: usize,
        registries: Vec<String>,
    ) -> BrokerResult<Vec<SearchHit>> {
        let matches = self
            .index
            .query(&SemanticQuery {
                text: text.to_string(),
                top_k: limit,
                registries,
            })
            .await?;
        Ok(matches
            .into_iter()
            .map(|m| m.record.into_hit(m.score, &self.id))
            .collect())
    }
}

#[async_trait]
impl SearchAdapter for SemanticSearchAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> SearchCapabilities {
        SearchCapabilities {
            vector_search: true,
            filters: FilterSupport::NONE,
            native_sort: false,
            max_page_size: None,
        }
    }

    /// Keyword queries are answered semantically; a query without text has
    /// nothing to rank and yields no hits.
    async fn search(&self, params: &SearchParams) -> BrokerResult<SearchPage> {
        let Some(text) = params.query.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(SearchPage::default());
        };
        if params.page > 1 {
            return Ok(SearchPage {
                hits: Vec::new(),
                total: None,
            });
        }
        let hits = self
            .ranked_hits(text, params.page_size, vec![params.registry.clone()])
            .await?;
        let total = hits.len();
        Ok(SearchPage {
            hits,
            total: Some(total),
        })
    }

    async fn vector_search(
        &self,
        request: &VectorSearchRequest,
    ) -> BrokerResult<VectorSearchResponse> {
        let started = Instant::now();
        let hits = self
            .ranked_hits(&request.query, request.limit, request.registries.clone())
            .await?;
        Ok(VectorSearchResponse {
            total: Some(hits.len()),
            hits,
            elapsed: Some(started.elapsed()),
        })
    }
}

// ── Reference providers ──────────────────────────────────────

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Deterministic FNV-1a feature-hashing embedder.
///
/// Lexical overlap only, but needs no model and always gives the same
/// vector for the same text.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let index = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 1 { 1.0 } else { -1.0 };
            embedding[index] += sign;
        }
        l2_normalize(&mut embedding);
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_one(&self, text: &str) -> BrokerResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> BrokerResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let nb = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// In-process vector store with cosine scoring. Supports batch upsert but
/// not batch delete.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn supports_batch_upsert(&self) -> bool {
        true
    }

    async fn upsert(&self, record: VectorRecord) -> BrokerResult<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn upsert_batch(&self, records: Vec<VectorRecord>) -> BrokerResult<()> {
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for record in records {
            guard.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, query: &VectorQuery) -> BrokerResult<Vec<VectorMatch>> {
        let guard = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<VectorMatch> = guard
            .values()
            .filter(|r| query.registries.is_empty() || query.registries.contains(&r.registry))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine(&query.vector, &r.vector),
                payload: r.payload.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(query.top_k);
        Ok(matches)
    }

    async fn delete(&self, id: &str) -> BrokerResult<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn record(registry: &str, id: &str, name: &str, description: &str) -> AgentRecord {
        AgentRecord {
            registry: registry.into(),
            native_id: id.into(),
            name: name.into(),
            description: description.into(),
            uaid: Some(format!("uaid-{id}")),
            endpoints: AgentEndpoints::default(),
            protocols: Vec::new(),
            metadata: Map::new(),
        }
    }

    fn index(store: Arc<dyn VectorStore>) -> SemanticIndex {
        SemanticIndex::new(Arc::new(HashEmbedder::new(128)), store)
    }

    /// Counts deletes; no batch support.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryVectorStore,
        deletes: AtomicU32,
    }

    #[async_trait]
    impl VectorStore for CountingStore {
        async fn upsert(&self, record: VectorRecord) -> BrokerResult<()> {
            self.inner.upsert(record).await
        }

        async fn query(&self, query: &VectorQuery) -> BrokerResult<Vec<VectorMatch>> {
            self.inner.query(query).await
        }

        async fn delete(&self, id: &str) -> BrokerResult<()> {
            self.deletes.fetch_add(1, AtomicOrdering::SeqCst);
            self.inner.delete(id).await
        }
    }

    #[test]
    fn test_vector_id() {
        assert_eq!(VectorKey::new("1", "42").vector_id(), "1-42");
        assert_eq!(record("137", "7", "x", "").vector_id(), "137-7");
    }

    #[test]
    fn test_hash_embedder_deterministic_and_normalized() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("Trading agent for DeFi");
        let b = e.embed_sync("trading AGENT for defi");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(e.embed_sync("").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_reindex_overwrites() {
        let store = Arc::new(InMemoryVectorStore::new());
        let idx = index(store.clone());
        idx.index_one(&record("1", "42", "Trader", "v1")).await.unwrap();
        idx.index_one(&record("1", "42", "Trader", "v2")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("1-42"));
    }

    #[tokio::test]
    async fn test_batch_index_and_query_ranking() {
        let store = Arc::new(InMemoryVectorStore::new());
        let idx = index(store.clone());
        let count = idx
            .index_batch(&[
                record("1", "1", "Trading agent", "executes trades on dex markets"),
                record("1", "2", "Weather oracle", "reports weather forecasts"),
                record("137", "3", "Trading bot", "automated trading agent"),
            ])
            .await
            .unwrap();
        assert_eq!(count, 3);

        let matches = idx.query(&SemanticQuery::new("trading agent", 10)).await.unwrap();
        let top: Vec<_> = matches.iter().take(2).map(|m| m.record.native_id.as_str()).collect();
        assert!(top.contains(&"1") && top.contains(&"3"));
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));

        let mut scoped = SemanticQuery::new("trading agent", 10);
        scoped.registries = vec!["137".into()];
        let matches = idx.query(&scoped).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.native_id, "3");
    }

    #[tokio::test]
    async fn test_min_score_drops_weak_matches() {
        let store = Arc::new(InMemoryVectorStore::new());
        let idx = index(store).with_min_score(0.5);
        idx.index_batch(&[
            record("1", "1", "Trading agent", ""),
            record("1", "2", "Weather oracle", "forecasts"),
        ])
        .await
        .unwrap();

        let matches = idx.query(&SemanticQuery::new("trading agent", 10)).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.native_id, "1");
        assert!(matches.iter().all(|m| m.score >= 0.5));
    }

    #[tokio::test]
    async fn test_from_config() {
        #[derive(Default)]
        struct DimensionStore {
            dims: RwLock<Vec<usize>>,
        }

        #[async_trait]
        impl VectorStore for DimensionStore {
            async fn upsert(&self, record: VectorRecord) -> BrokerResult<()> {
                self.dims.write().unwrap().push(record.vector.len());
                Ok(())
            }

            async fn query(&self, _query: &VectorQuery) -> BrokerResult<Vec<VectorMatch>> {
                Ok(Vec::new())
            }

            async fn delete(&self, _id: &str) -> BrokerResult<()> {
                Ok(())
            }
        }

        let config = SemanticConfig {
            min_score: 0.25,
            dimension: 64,
        };
        let store = Arc::new(DimensionStore::default());
        let idx = SemanticIndex::from_config(&config, store.clone());
        assert_eq!(idx.min_score(), 0.25);

        idx.index_one(&record("1", "1", "Trading agent", "")).await.unwrap();
        assert_eq!(*store.dims.read().unwrap(), vec![64]);
    }

    #[tokio::test]
    async fn test_delete_batch_falls_back_to_single_deletes() {
        let store = Arc::new(CountingStore::default());
        let idx = index(store.clone());
        idx.index_batch(&[record("1", "1", "a", ""), record("1", "2", "b", "")])
            .await
            .unwrap();
        idx.delete_batch(&[VectorKey::new("1", "1"), VectorKey::new("1", "2")])
            .await
            .unwrap();
        assert_eq!(store.deletes.load(AtomicOrdering::SeqCst), 2);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_vector_search() {
        let store = Arc::new(InMemoryVectorStore::new());
        let idx = Arc::new(index(store));
        idx.index_one(&record("1", "9", "Trading agent", "")).await.unwrap();

        let adapter = SemanticSearchAdapter::new("semantic", idx);
        assert!(adapter.capabilities().vector_search);
        let response = adapter
            .vector_search(&VectorSearchRequest {
                query: "trading".into(),
                limit: 5,
                registries: vec!["1".into()],
                filters: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(response.hits.len(), 1);
        let hit = &response.hits[0];
        assert_eq!(hit.uaid.as_deref(), Some("uaid-9"));
        assert_eq!(hit.source_adapter.as_deref(), Some("semantic"));
        assert!(hit.score.is_some());
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let idx = index(Arc::new(InMemoryVectorStore::new()));
        assert!(idx.query(&SemanticQuery::new("  ", 5)).await.is_err());
    }
}
