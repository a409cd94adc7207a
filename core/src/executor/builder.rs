//! Builder pattern for CampaignExecutor construction

use crate::config::{CampaignConfig, ConfigError};
use crate::error::{CampaignError, CampaignResult};
use crate::progress::NoopProgressSink;
use crate::traits::{
    NoPrerequisites, OutcomeModel, PrerequisiteCheck, ProgressSink, ToolBinding, TrialGenerator,
};

use super::handle::{ExecutorHandle, ExecutorShared};
use super::rate_limiter::TrialRateLimiter;
use super::runner::CampaignExecutor;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Builder for creating CampaignExecutor instances
///
/// # Example
/// ```ignore
/// let handle = ExecutorBuilder::new("wordlist-1")
///     .tool_id("wordlist")
///     .config(config)
///     .generator(generator)
///     .model(model)
///     .start()?;
///
/// let summary = handle.wait().await;
/// ```
pub struct ExecutorBuilder {
    campaign_id: String,
    tool_id: String,
    config: Option<CampaignConfig>,
    generator: Option<Arc<dyn TrialGenerator>>,
    model: Option<Arc<dyn OutcomeModel>>,
    prerequisites: Arc<dyn PrerequisiteCheck>,
    sink: Arc<dyn ProgressSink>,
    ceiling: Option<Duration>,
}

impl ExecutorBuilder {
    /// Create a new builder for the given campaign identifier
    pub fn new(campaign_id: impl Into<String>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            tool_id: String::new(),
            config: None,
            generator: None,
            model: None,
            prerequisites: Arc::new(NoPrerequisites),
            sink: Arc::new(NoopProgressSink),
            ceiling: None,
        }
    }

    /// Set the tool identifier
    pub fn tool_id(mut self, tool_id: impl Into<String>) -> Self {
        self.tool_id = tool_id.into();
        self
    }

    /// Set the campaign configuration
    pub fn config(mut self, config: CampaignConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the trial generator
    pub fn generator(mut self, generator: Arc<dyn TrialGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the outcome model
    pub fn model(mut self, model: Arc<dyn OutcomeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the prerequisite check
    pub fn prerequisites(mut self, check: Arc<dyn PrerequisiteCheck>) -> Self {
        self.prerequisites = check;
        self
    }

    /// Set generator, model and prerequisites from a resolved tool
    pub fn binding(self, binding: ToolBinding) -> Self {
        self.generator(binding.generator)
            .model(binding.model)
            .prerequisites(binding.prerequisites)
    }

    /// Set the progress sink
    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Duration ceiling enforced on top of the configured bounds
    ///
    /// Required for campaigns configured as unbounded.
    pub fn ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Build the executor
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the configuration is missing or invalid, if
    /// generator or model are missing, or if an unbounded campaign has no
    /// ceiling.
    pub fn build(self) -> CampaignResult<CampaignExecutor> {
        let config = self.config.ok_or_else(|| missing("config"))?;
        config.validate()?;

        let generator = self.generator.ok_or_else(|| missing("generator"))?;
        let model = self.model.ok_or_else(|| missing("model"))?;

        let bounded = config.bounds.max_attempts.is_some() || config.bounds.max_duration.is_some();
        if !bounded && self.ceiling.is_none() {
            return Err(ConfigError::InvalidBounds(
                "unbounded campaigns require an enforced ceiling".into(),
            )
            .into());
        }

        let rate_limiter = TrialRateLimiter::new(&config.rate, config.jitter);
        let snapshot =
            CampaignExecutor::initial_snapshot(&self.campaign_id, &self.tool_id, &config);
        let shared = Arc::new(ExecutorShared::new(snapshot));
        let shutdown = shared.shutdown_tx.subscribe();
        let (terminal, _) = watch::channel(None);

        Ok(CampaignExecutor {
            campaign_id: self.campaign_id,
            tool_id: self.tool_id,
            config: Arc::new(config),
            generator,
            model,
            prerequisites: self.prerequisites,
            sink: self.sink,
            rate_limiter,
            ceiling: self.ceiling,
            shared,
            shutdown,
            terminal,
        })
    }

    /// Build the executor and start it
    pub fn start(self) -> CampaignResult<ExecutorHandle> {
        Ok(self.build()?.start())
    }
}

fn missing(field: &str) -> CampaignError {
    ConfigError::InvalidParameter(format!("missing required field: {field}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CampaignBounds, TrialRate};

    #[test]
    fn test_builder_missing_config() {
        let result = ExecutorBuilder::new("c1").build();
        let err = result.unwrap_err();
        assert!(matches!(err, CampaignError::ConfigInvalid(_)));
        assert!(err.to_string().contains("config"));
    }

    #[test]
    fn test_builder_invalid_config() {
        let config = CampaignConfig::new(TrialRate::PerSecond(-1.0), CampaignBounds::attempts(1));
        let result = ExecutorBuilder::new("c1").config(config).build();
        assert!(matches!(result, Err(CampaignError::ConfigInvalid(_))));
    }

    #[test]
    fn test_builder_missing_generator() {
        let config = CampaignConfig::new(TrialRate::PerSecond(1.0), CampaignBounds::attempts(1));
        let result = ExecutorBuilder::new("c1").config(config).build();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("generator"));
    }
}
