//! campaign-core: Execution and orchestration engine for rate-limited trial campaigns
//!
//! This crate provides the engine shared by all campaign-engine components,
//! including:
//!
//! - Campaign configuration, status, counters and summaries
//! - Core traits (TrialGenerator, OutcomeModel, ToolRegistry, HistoryStore, ProgressSink)
//! - The campaign executor (one rate-limited trial loop per campaign)
//! - The orchestrator (admission control, active registry, history log)
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod campaign;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod orchestrator;
pub mod progress;
pub mod traits;
pub mod trial;

pub use campaign::*;
pub use config::*;
pub use error::*;
pub use executor::{CampaignExecutor, ExecutorBuilder, ExecutorHandle, TrialRateLimiter};
pub use history::*;
pub use orchestrator::{
    aggregate_history, CampaignHandle, Orchestrator, OrchestratorBuilder, OrchestratorStatistics,
};
pub use progress::*;
pub use traits::*;
pub use trial::*;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    // =========================================================================
    // Configuration file format
    // =========================================================================

    #[test]
    fn test_campaign_config_from_minimal_json() {
        let json = r#"{
            "rate": { "per_second": 10.0 },
            "bounds": { "max_attempts": 50 }
        }"#;
        let config: CampaignConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.rate.interval(), Duration::from_millis(100));
        assert_eq!(config.bounds.max_attempts, Some(50));
        assert!(!config.success_terminal);
        assert_eq!(config.trial_timeout, DEFAULT_TRIAL_TIMEOUT);
        assert_eq!(config.max_consecutive_errors, DEFAULT_MAX_CONSECUTIVE_ERRORS);
        assert_eq!(config.record_buffer, DEFAULT_RECORD_BUFFER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_config_defaults_from_empty_json() {
        let config: OrchestratorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
        assert!(!config.terms_accepted);
    }

    // =========================================================================
    // Persisted history format
    // =========================================================================

    #[test]
    fn test_history_entry_json_format() {
        let start = HistoryEntry::start("flood-1-1", "flood");
        let json = serde_json::to_value(&start).unwrap();

        assert_eq!(json["campaign_id"], "flood-1-1");
        assert_eq!(json["tool_id"], "flood");
        assert_eq!(json["action"], "start");
        assert!(json.get("outcome").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_history_stop_entry_carries_outcome() {
        let mut counts = OutcomeCounts::default();
        counts.record(OutcomeKind::Miss);
        counts.record(OutcomeKind::Error);

        let summary = CampaignSummary {
            campaign_id: "flood-1-1".into(),
            tool_id: "flood".into(),
            status: CampaignStatus::Failed,
            reason: Some("error threshold exceeded".into()),
            started_at: chrono::Utc::now(),
            ended_at: chrono::Utc::now(),
            duration_ms: 1200,
            counts,
            winning_input: None,
            recent_trials: Vec::new(),
        };
        let json = serde_json::to_value(HistoryEntry::stop(&summary)).unwrap();

        assert_eq!(json["action"], "stop");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["counts"]["attempts"], 2);
        assert_eq!(json["outcome"]["success"], false);
        assert_eq!(json["error"], "error threshold exceeded");

        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.outcome.map(|o| o.duration_ms), Some(1200));
    }

    #[test]
    fn test_trial_input_is_transparent() {
        let input = TrialInput::new("1234");
        assert_eq!(serde_json::to_string(&input).unwrap(), r#""1234""#);
    }
}
