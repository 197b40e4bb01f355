//! Connector extension point.
//!
//! Every data source is a [`Connector`]: the built-in Congress, Federal
//! Register, OpenStates, California, and Supreme Court connectors are
//! constructed from config by [`ConnectorRegistry::from_config`], and
//! callers may register their own before running a sync.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConnectorRegistry               │
//! │  ┌──────────────────────┐  ┌──────────────┐  │
//! │  │ Built-in             │  │  Custom      │  │
//! │  │ congress / fed. reg. │  │  (Rust)      │  │
//! │  │ openstates / ca /    │  │              │  │
//! │  │ scotus               │  │              │  │
//! │  └──────────────────────┘  └──────────────┘  │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!                 run_sync() → ingest pipeline
//! ```
//!
//! # Usage
//!
//! ```rust
//! use civitas::traits::ConnectorRegistry;
//!
//! let mut connectors = ConnectorRegistry::new();
//! // connectors.register(Box::new(MyConnector::new()));
//! ```

use anyhow::Result;
use async_trait::async_trait;

use civitas_core::models::SourceRecord;

use crate::config::Config;

/// A data source that produces records for ingestion.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use civitas::traits::Connector;
/// use civitas_core::models::SourceRecord;
///
/// pub struct CityCouncilConnector;
///
/// #[async_trait]
/// impl Connector for CityCouncilConnector {
///     fn name(&self) -> &str { "city_council" }
///     fn description(&self) -> &str { "Ordinances from the city clerk" }
///
///     async fn scan(&self, _since: Option<i64>) -> Result<Vec<SourceRecord>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique connector name, used by `civ sync <name>` and as the
    /// checkpoint key.
    fn name(&self) -> &str;

    /// One-line description shown by `civ sources`.
    fn description(&self) -> &str;

    /// Fetch records. `since` is the connector's checkpoint (unix seconds);
    /// connectors that can filter upstream should only return records
    /// updated at or after it. The pipeline filters again regardless.
    async fn scan(&self, since: Option<i64>) -> Result<Vec<SourceRecord>>;
}

/// Registry of built-in and custom connectors.
pub struct ConnectorRegistry {
    connectors: Vec<Box<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Create an empty connector registry.
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Create a registry pre-loaded with every source configured under
    /// `[sources.*]`.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::connector_california::CaliforniaConnector;
        use crate::connector_congress::CongressConnector;
        use crate::connector_federal_register::FederalRegisterConnector;
        use crate::connector_openstates::OpenStatesConnector;
        use crate::connector_scotus::ScotusConnector;

        let mut registry = Self::new();
        let sources = &config.sources;

        if let Some(cfg) = &sources.congress {
            registry.register(Box::new(CongressConnector::new(
                cfg.clone(),
                config.retry.clone(),
            )?));
        }
        if let Some(cfg) = &sources.federal_register {
            registry.register(Box::new(FederalRegisterConnector::new(
                cfg.clone(),
                config.retry.clone(),
            )?));
        }
        if let Some(cfg) = &sources.openstates {
            registry.register(Box::new(OpenStatesConnector::new(
                cfg.clone(),
                config.retry.clone(),
            )?));
        }
        if let Some(cfg) = &sources.california {
            registry.register(Box::new(CaliforniaConnector::new(cfg.clone())));
        }
        if let Some(cfg) = &sources.scotus {
            registry.register(Box::new(ScotusConnector::new(cfg.clone())));
        }

        Ok(registry)
    }

    /// Register a connector.
    pub fn register(&mut self, connector: Box<dyn Connector>) {
        self.connectors.push(connector);
    }

    /// Get all registered connectors.
    pub fn connectors(&self) -> &[Box<dyn Connector>] {
        &self.connectors
    }

    /// Find a connector by name.
    pub fn find(&self, name: &str) -> Option<&dyn Connector> {
        self.connectors
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Consume the registry, yielding its connectors in registration order.
    pub fn into_connectors(self) -> Vec<Box<dyn Connector>> {
        self.connectors
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Return the count of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of the built-in connectors, in sync order.
pub const BUILTIN_CONNECTORS: &[&str] = &[
    "congress",
    "federal_register",
    "openstates",
    "california",
    "scotus",
];
