//! Error types for campaign-core

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Core error type
///
/// Admission-time failures are returned synchronously from `start_*` calls and
/// leave no residual state. Failures inside a running campaign never surface
/// here; they are absorbed into the campaign's own counters.
#[derive(Error, Debug)]
pub enum CampaignError {
    /// The campaign configuration failed validation
    #[error("invalid campaign configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),

    /// Tool-specific prerequisite check failed
    #[error("prerequisites not met: {0}")]
    PrerequisitesNotMet(String),

    /// Concurrency ceiling reached
    #[error("capacity exceeded: {active} of {limit} campaigns already active")]
    CapacityExceeded {
        /// Campaigns active when the request was rejected
        active: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// Terms-of-use policy flag has not been set
    #[error("policy not accepted: terms must be accepted before starting a campaign")]
    PolicyNotAccepted,

    /// Tool registry could not resolve the tool identifier
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Unknown campaign identifier
    #[error("campaign not found: {0}")]
    NotFound(String),

    /// Per-trial failure
    #[error(transparent)]
    Trial(#[from] TrialError),

    /// History persistence failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CampaignError {
    /// Create a prerequisites error
    pub fn prerequisites(msg: impl Into<String>) -> Self {
        Self::PrerequisitesNotMet(msg.into())
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(tool_id: impl Into<String>) -> Self {
        Self::ToolNotFound(tool_id.into())
    }

    /// Create a not-found error
    pub fn not_found(campaign_id: impl Into<String>) -> Self {
        Self::NotFound(campaign_id.into())
    }
}

/// Result type alias
pub type CampaignResult<T> = std::result::Result<T, CampaignError>;

/// Failure of a single trial
///
/// Recorded as an `Error` outcome and counted; never aborts the loop on its own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    /// The trial generator could not produce an input
    #[error("trial generation failed: {0}")]
    Generation(String),

    /// The outcome model failed or was unreachable
    #[error("outcome model failed: {0}")]
    Model(String),

    /// The outcome model did not resolve within the per-trial timeout
    #[error("trial timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data could not be interpreted
    #[error("corrupt history data: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message() {
        let err = CampaignError::CapacityExceeded {
            active: 2,
            limit: 2,
        };
        assert_eq!(
            err.to_string(),
            "capacity exceeded: 2 of 2 campaigns already active"
        );
    }

    #[test]
    fn test_trial_error_converts() {
        let err: CampaignError = TrialError::Timeout(Duration::from_millis(5)).into();
        assert!(matches!(err, CampaignError::Trial(TrialError::Timeout(_))));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: CampaignError = ConfigError::InvalidRate("rate must be positive".into()).into();
        assert!(matches!(err, CampaignError::ConfigInvalid(_)));
    }
}
