//! # agentbroker-core
//!
//! Core library for AgentBroker — agent discovery across registries and
//! conversational sessions through pluggable adapters.
//!
//! This crate provides the building blocks for:
//! - Registering search and chat adapters per capability
//! - Aggregated discovery (semantic first, then filtered keyword search)
//! - UAID resolution from earlier search results
//! - Sessions with encrypted-first negotiation and plaintext fallback
//! - A semantic index over agent descriptions
//! - Observability via `tracing` and OpenTelemetry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentbroker_core::{AgentBroker, BrokerConfig, SearchQuery};
//!
//! # async fn run(
//! #     search: Arc<dyn agentbroker_core::SearchAdapter>,
//! #     chat: Arc<dyn agentbroker_core::ChatAdapter>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let broker = AgentBroker::builder(BrokerConfig::load_default()?)
//!     .search_adapter(search)
//!     .chat_adapter(chat)
//!     .build();
//!
//! let outcome = broker
//!     .search(&SearchQuery::text("trading agent").mcp(true).limit(5))
//!     .await?;
//!
//! if let Some(hit) = outcome.hits.first() {
//!     let session = broker.open_agent(&hit.to_handle()).await?;
//!     let reply = session.send("What markets do you cover?").await?;
//!     println!("{:?}", reply.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod agent;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod query;
pub mod registry;
pub mod retry;
pub mod search;
pub mod semantic;
pub mod session;
pub mod telemetry;

// Re-exports
pub use adapter::{
    Capability, ChatAdapter, ChatCapabilities, ChatReply, FilterSupport, SearchAdapter,
    SearchCapabilities, SearchPage, SearchParams, SendOptions, SessionOpened, SessionOptions,
    VectorSearchRequest, VectorSearchResponse,
};
pub use agent::{AgentEndpoints, AgentHandle, SearchHit, SessionTarget};
pub use cache::UaidCache;
pub use client::{AgentBroker, AgentBrokerBuilder};
pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult, ErrorClass};
pub use query::{AdapterScope, RegistryScope, SearchFilters, SearchQuery, SortDirection, SortKey};
pub use registry::AdapterRegistry;
pub use retry::RetryPolicy;
pub use search::{ResultSource, SearchAggregator, SearchOutcome};
pub use semantic::{
    AgentRecord, EmbeddingProvider, HashEmbedder, InMemoryVectorStore, SemanticIndex,
    SemanticSearchAdapter, VectorKey, VectorStore,
};
pub use session::{
    EncryptionPreference, Negotiation, OpenRequest, SessionBroker, SessionHandle, SessionMode,
};
