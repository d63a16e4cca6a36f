//! # agentbroker-http
//!
//! HTTP adapters for AgentBroker. [`RegistryBrokerClient`] talks to a
//! registry broker REST API and serves as both a search source (keyword and
//! vector) and a chat backend.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentbroker_core::{AdapterRegistry, AgentBroker, BrokerConfig};
//! use agentbroker_http::RegistryBrokerClient;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig::load_default()?;
//! let registry = Arc::new(AdapterRegistry::new());
//! RegistryBrokerClient::from_config(&config)?
//!     .register(&registry, &[config.search.default_adapter.clone()]);
//!
//! let broker = AgentBroker::builder(config).registry(registry).build();
//! # let _ = broker;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
mod wire;

pub use client::{RegistryBrokerClient, DEFAULT_ID, DEFAULT_TIMEOUT};
pub use error::{map_reqwest_error, status_error};
