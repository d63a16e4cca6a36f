//! Search aggregator — one query fanned out over registries and adapters.
//!
//! Order of operations:
//! 1. semantic search when the query has text and a vector source exists
//!    (best effort; any failure falls through),
//! 2. keyword search per effective registry, with the two-phase prefilter on
//!    the default registry,
//! 3. client-side residual filtering, sorting and truncation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapter::{SearchAdapter, SearchParams, VectorSearchRequest};
use crate::agent::SearchHit;
use crate::cache::UaidCache;
use crate::config::SearchConfig;
use crate::error::BrokerResult;
use crate::filter;
use crate::query::{AdapterScope, SearchFilters, SearchQuery};
use crate::registry::AdapterRegistry;
use crate::retry::RetryPolicy;

/// Where the returned hits came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Vector,
    Keyword,
}

/// Result of one aggregated search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub source: ResultSource,
    /// Registries that were searched, in order.
    pub registries: Vec<String>,
    /// Total matches reported by the sources, when every source reported
    /// one and no client-side filtering was needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

/// Hits from one adapter for one registry.
struct Fetched {
    hits: Vec<SearchHit>,
    total: Option<usize>,
    native_order: bool,
}

/// Runs discovery queries across the registered search adapters.
pub struct SearchAggregator {
    registry: Arc<AdapterRegistry>,
    cache: Arc<UaidCache>,
    retry: RetryPolicy,
    config: SearchConfig,
}

impl SearchAggregator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        cache: Arc<UaidCache>,
        retry: RetryPolicy,
        config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            retry,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Registries a query is run against. An unset scope means the default
    /// registry plus the home registry, default first, without duplicates.
    pub fn effective_registries(&self, query: &SearchQuery) -> Vec<String> {
        let mut registries = match &query.registry_scope {
            Some(scope) => scope.ids(),
            None => {
                let mut ids = vec![self.config.default_registry.clone()];
                ids.extend(self.config.home_registry.clone());
                ids
            }
        };
        let mut seen = HashSet::new();
        registries.retain(|id| seen.insert(id.clone()));
        registries
    }

    /// Run `query` and return at most `limit` hits.
    pub async fn search(&self, query: &SearchQuery) -> BrokerResult<SearchOutcome> {
        query.validate()?;
        let search_id = Uuid::new_v4();
        let span = tracing::debug_span!("search", %search_id);
        let outcome = self.run(query).instrument(span).await?;

        let learned = self.cache.observe(&outcome.hits);
        tracing::debug!(
            %search_id,
            hits = outcome.hits.len(),
            source = ?outcome.source,
            learned_uaids = learned,
            "Search complete"
        );
        Ok(outcome)
    }

    async fn run(&self, query: &SearchQuery) -> BrokerResult<SearchOutcome> {
        let limit = query.limit.min(self.config.max_limit.max(1));
        let registries = self.effective_registries(query);

        if let Some(text) = query.text_query() {
            if let Some(hits) = self.try_vector(text, query, limit, &registries).await {
                return Ok(SearchOutcome {
                    total: None,
                    hits,
                    source: ResultSource::Vector,
                    registries,
                });
            }
        }

        let mut hits = Vec::new();
        let mut total = Some(0usize);
        let mut contributing = 0usize;
        let mut native_order = false;

        for registry in &registries {
            for fetched in self.search_registry(registry, query, limit).await? {
                if fetched.hits.is_empty() {
                    continue;
                }
                contributing += 1;
                native_order = fetched.native_order;
                total = match (total, fetched.total) {
                    (Some(sum), Some(n)) => Some(sum + n),
                    _ => None,
                };
                hits.extend(fetched.hits);
            }
        }

        // A single natively ordered source is already in the requested order.
        if !(contributing == 1 && native_order) {
            filter::sort_hits(&mut hits, &query.sort_keys);
        }
        hits.truncate(limit);

        Ok(SearchOutcome {
            hits,
            source: ResultSource::Keyword,
            registries,
            total: if contributing == 0 { Some(0) } else { total },
        })
    }

    // ── Vector step ──────────────────────────────────────────

    fn vector_adapter(&self) -> Option<Arc<dyn SearchAdapter>> {
        match &self.config.vector_adapter {
            Some(id) => self
                .registry
                .search(id)
                .filter(|a| a.capabilities().vector_search),
            None => self
                .registry
                .search_adapters()
                .into_iter()
                .find(|a| a.capabilities().vector_search),
        }
    }

    /// Post-filtered semantic hits, or `None` when the keyword path should
    /// run instead.
    async fn try_vector(
        &self,
        text: &str,
        query: &SearchQuery,
        limit: usize,
        registries: &[String],
    ) -> Option<Vec<SearchHit>> {
        let Some(adapter) = self.vector_adapter() else {
            tracing::debug!("No vector search source configured");
            return None;
        };
        let support = adapter.capabilities().filters;
        let request = VectorSearchRequest {
            query: text.to_string(),
            limit,
            registries: registries.to_vec(),
            filters: support.pushdown(&query.filters),
        };

        let response = match self
            .retry
            .execute("search.vector", || adapter.vector_search(&request))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    adapter = adapter.id(),
                    error = %err,
                    "Vector search failed, falling back to keyword search"
                );
                return None;
            }
        };

        let mut hits = response.hits;
        tag_source(&mut hits, adapter.id());
        filter::retain_matching(&mut hits, &support.residual(&query.filters));
        if hits.is_empty() {
            tracing::debug!(adapter = adapter.id(), "Vector search empty after filtering");
            return None;
        }
        filter::sort_hits(&mut hits, &query.sort_keys);
        hits.truncate(limit);
        Some(hits)
    }

    // ── Keyword step ─────────────────────────────────────────

    async fn search_registry(
        &self,
        registry: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> BrokerResult<Vec<Fetched>> {
        match &query.adapter_scope {
            AdapterScope::Explicit(ids) if !ids.is_empty() => {
                let adapters = ids
                    .iter()
                    .map(|id| self.registry.require_search(id))
                    .collect::<BrokerResult<Vec<_>>>()?;
                self.fetch_all(&adapters, registry, query, limit).await
            }
            AdapterScope::Default if registry == self.config.default_registry => {
                self.two_phase(registry, query, limit).await
            }
            _ => {
                let adapters = unrestricted(self.registry.search_adapters());
                self.fetch_all(&adapters, registry, query, limit).await
            }
        }
    }

    /// Default adapter first; every other adapter only if it found nothing.
    async fn two_phase(
        &self,
        registry: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> BrokerResult<Vec<Fetched>> {
        let default_id = self.config.default_adapter.as_str();
        match self.registry.search(default_id) {
            Some(adapter) => {
                let fetched = self.fetch(adapter.as_ref(), registry, query, limit).await?;
                if !fetched.hits.is_empty() {
                    return Ok(vec![fetched]);
                }
                tracing::debug!(
                    registry,
                    adapter = default_id,
                    "Default adapter returned nothing, broadening to all adapters"
                );
            }
            None => {
                tracing::debug!(adapter = default_id, "Default adapter not registered");
            }
        }

        let rest: Vec<_> = unrestricted(self.registry.search_adapters())
            .into_iter()
            .filter(|a| a.id() != default_id)
            .collect();
        self.fetch_all(&rest, registry, query, limit).await
    }

    async fn fetch_all(
        &self,
        adapters: &[Arc<dyn SearchAdapter>],
        registry: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> BrokerResult<Vec<Fetched>> {
        let mut results = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            results.push(self.fetch(adapter.as_ref(), registry, query, limit).await?);
        }
        Ok(results)
    }

    /// Page through one adapter until `limit` post-filtered hits are
    /// collected, the source runs dry, or `max_pages` is reached.
    async fn fetch(
        &self,
        adapter: &dyn SearchAdapter,
        registry: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> BrokerResult<Fetched> {
        let caps = adapter.capabilities();
        let residual: SearchFilters = caps.filters.residual(&query.filters);
        let page_size = caps
            .max_page_size
            .map_or(self.config.page_size, |max| self.config.page_size.min(max))
            .max(1);
        let max_pages = self.config.max_pages.max(1);

        let mut params = SearchParams {
            query: query.text_query().map(str::to_string),
            registry: registry.to_string(),
            filters: caps.filters.pushdown(&query.filters),
            sort: if caps.native_sort {
                query.sort_keys.clone()
            } else {
                Vec::new()
            },
            page: 1,
            page_size,
        };

        let mut hits = Vec::new();
        let mut total = None;
        for page in 1..=max_pages {
            params.page = page;
            tracing::debug!(adapter = adapter.id(), registry, page, "Calling search adapter");
            let result = self
                .retry
                .execute("search.adapter", || adapter.search(&params))
                .await?;

            let fetched = result.hits.len();
            total = result.total;
            let mut page_hits = result.hits;
            tag_source(&mut page_hits, adapter.id());
            filter::retain_matching(&mut page_hits, &residual);
            hits.extend(page_hits);

            let exhausted = fetched < page_size
                || result.total.is_some_and(|t| page * page_size >= t);
            if hits.len() >= limit || exhausted {
                break;
            }
        }

        Ok(Fetched {
            hits,
            total: if residual.is_empty() { total } else { None },
            native_order: caps.native_sort,
        })
    }
}

impl std::fmt::Debug for SearchAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchAggregator")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn tag_source(hits: &mut [SearchHit], adapter_id: &str) {
    for hit in hits.iter_mut().filter(|h| h.source_adapter.is_none()) {
        hit.source_adapter = Some(adapter_id.to_string());
    }
}

/// Drop restricted views whose unrestricted adapter is in the set.
fn unrestricted(adapters: Vec<Arc<dyn SearchAdapter>>) -> Vec<Arc<dyn SearchAdapter>> {
    let ids: HashSet<String> = adapters.iter().map(|a| a.id().to_string()).collect();
    adapters
        .into_iter()
        .filter(|a| a.narrows().map_or(true, |parent| !ids.contains(parent)))
        .collect()
}
