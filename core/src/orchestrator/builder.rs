//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::{ConfigError, OrchestratorConfig};
use crate::error::CampaignResult;
use crate::history::PersistentHistory;
use crate::progress::TracingProgressSink;
use crate::traits::{HistoryStore, ProgressSink, ToolRegistry};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .max_concurrent(4)
///     .registry(Arc::new(BuiltinRegistry::with_defaults()))
///     .store(Arc::new(JsonFileStore::new("history.json")))
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    registry: Option<Arc<dyn ToolRegistry>>,
    store: Option<Arc<dyn HistoryStore>>,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            registry: None,
            store: None,
            sink: None,
        }
    }

    /// Set the full orchestrator configuration
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the concurrency limit
    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.config.max_concurrent = limit;
        self
    }

    /// Set the history log capacity
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Set the initial terms-accepted flag
    pub fn terms_accepted(mut self, accepted: bool) -> Self {
        self.config.terms_accepted = accepted;
        self
    }

    /// Set the tool registry
    pub fn registry(mut self, registry: Arc<dyn ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the history store
    pub fn store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the progress sink shared by all campaigns
    ///
    /// Defaults to `TracingProgressSink`.
    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the orchestrator, restoring the history log from the store
    ///
    /// # Errors
    ///
    /// Returns an error if registry or store are not set, or if configuration
    /// validation fails.
    pub fn build(self) -> CampaignResult<Orchestrator> {
        self.config.validate()?;

        let registry = self.registry.ok_or_else(|| {
            ConfigError::InvalidParameter("missing required field: registry".into())
        })?;
        let store = self.store.ok_or_else(|| {
            ConfigError::InvalidParameter("missing required field: store".into())
        })?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingProgressSink));

        let history = PersistentHistory::restore(store, self.config.history_capacity);

        tracing::debug!(
            max_concurrent = self.config.max_concurrent,
            history_entries = history.log().len(),
            "Orchestrator ready"
        );

        Ok(Orchestrator::new(self.config, registry, history, sink))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
