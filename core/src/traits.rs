//! Collaborator traits consumed by the engine
//!
//! These traits are defined in core to avoid circular dependencies.
//! Implementations live in their respective crates (samplers/, storage/) or in
//! the host application.

use crate::campaign::CampaignSummary;
use crate::config::CampaignConfig;
use crate::error::{CampaignResult, StorageError, TrialError};
use crate::history::HistoryEntry;
use crate::progress::ProgressEvent;
use crate::trial::{OutcomeKind, TrialInput};
use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Trial Generator
// ============================================================================

/// Produces the input for each trial
///
/// Generation is assumed to be pure. An `Err` is recorded as an `Error`
/// outcome for that trial.
pub trait TrialGenerator: Send + Sync {
    /// Generator name for identification
    fn name(&self) -> &str;

    /// Generate the input for trial `sequence` (1-based)
    fn generate(&self, sequence: u64, config: &CampaignConfig) -> Result<TrialInput, TrialError>;
}

// ============================================================================
// Outcome Model
// ============================================================================

/// Probabilistic classifier mapping a trial input to an outcome
///
/// The engine treats this as a black-box sampler. Calls are bounded by the
/// campaign's `trial_timeout`.
#[async_trait]
pub trait OutcomeModel: Send + Sync {
    /// Model identifier
    fn name(&self) -> &str;

    /// Nominal per-trial success probability (0.0 - 1.0)
    ///
    /// Used only for forward-looking success estimates in progress reports.
    fn nominal_success_rate(&self) -> f64;

    /// Sample an outcome for the given input
    async fn classify(&self, input: &TrialInput) -> Result<OutcomeKind, TrialError>;
}

// ============================================================================
// Prerequisites
// ============================================================================

/// Tool-specific predicate evaluated before the trial loop starts
pub trait PrerequisiteCheck: Send + Sync {
    /// `Err` carries a human-readable reason
    fn check(&self, config: &CampaignConfig) -> Result<(), String>;
}

impl<F> PrerequisiteCheck for F
where
    F: Fn(&CampaignConfig) -> Result<(), String> + Send + Sync,
{
    fn check(&self, config: &CampaignConfig) -> Result<(), String> {
        self(config)
    }
}

/// Prerequisite check that always passes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrerequisites;

impl PrerequisiteCheck for NoPrerequisites {
    fn check(&self, _config: &CampaignConfig) -> Result<(), String> {
        Ok(())
    }
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Everything the engine needs to run one tool
#[derive(Clone)]
pub struct ToolBinding {
    /// Trial input generator
    pub generator: Arc<dyn TrialGenerator>,

    /// Outcome model
    pub model: Arc<dyn OutcomeModel>,

    /// Prerequisite predicate
    pub prerequisites: Arc<dyn PrerequisiteCheck>,
}

impl ToolBinding {
    /// Bind a generator and model with no prerequisites
    pub fn new(generator: Arc<dyn TrialGenerator>, model: Arc<dyn OutcomeModel>) -> Self {
        Self {
            generator,
            model,
            prerequisites: Arc::new(NoPrerequisites),
        }
    }

    /// Set the prerequisite predicate
    pub fn with_prerequisites(mut self, check: Arc<dyn PrerequisiteCheck>) -> Self {
        self.prerequisites = check;
        self
    }
}

impl std::fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBinding")
            .field("generator", &self.generator.name())
            .field("model", &self.model.name())
            .finish()
    }
}

/// Resolves tool identifiers to their bindings
pub trait ToolRegistry: Send + Sync {
    /// Resolve a tool. Fails with `CampaignError::ToolNotFound` for unknown ids.
    fn resolve(&self, tool_id: &str) -> CampaignResult<ToolBinding>;

    /// Known tool identifiers
    fn tool_ids(&self) -> Vec<String>;

    /// Outcome model registered under `name`, used in place of a tool's own
    /// model when `CampaignConfig::outcome_model` is set
    fn outcome_model(&self, _name: &str) -> Option<Arc<dyn OutcomeModel>> {
        None
    }
}

// ============================================================================
// Durable Storage
// ============================================================================

/// Durable storage for the history log
///
/// Entries are passed most-recent-first and must be returned in the same order.
pub trait HistoryStore: Send + Sync {
    /// Load the stored log. `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<HistoryEntry>>, StorageError>;

    /// Replace the stored log
    fn save(&self, entries: &[HistoryEntry]) -> Result<(), StorageError>;
}

// ============================================================================
// Progress Sink
// ============================================================================

/// Fire-and-forget receiver of campaign progress
///
/// Called from inside the trial loop; implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// A trial was recorded
    fn on_progress(&self, event: &ProgressEvent);

    /// The campaign reached a terminal state. Called exactly once per campaign.
    fn on_terminal(&self, summary: &CampaignSummary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CampaignBounds, TrialRate};

    #[test]
    fn test_closure_prerequisite() {
        let check = |config: &CampaignConfig| {
            if config.param("target").is_some() {
                Ok(())
            } else {
                Err("target is required".to_string())
            }
        };

        let config = CampaignConfig::new(TrialRate::PerSecond(1.0), CampaignBounds::attempts(1));
        assert_eq!(check.check(&config), Err("target is required".to_string()));

        let config = config.with_param("target", serde_json::json!("lab"));
        assert!(check.check(&config).is_ok());
    }

    #[test]
    fn test_no_prerequisites() {
        let config = CampaignConfig::new(TrialRate::PerSecond(1.0), CampaignBounds::attempts(1));
        assert!(NoPrerequisites.check(&config).is_ok());
    }
}
