//! Statistics aggregated over the history log

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::history::{HistoryAction, HistoryEntry};

/// Orchestrator-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatistics {
    /// Campaigns started (start entries in the log)
    pub total_campaigns: usize,

    /// Campaigns finished (stop entries in the log)
    pub finished_campaigns: usize,

    /// Finished campaigns that achieved their objective
    pub successful_campaigns: usize,

    /// `successful_campaigns / finished_campaigns` (0.0 - 1.0)
    pub success_rate: f64,

    /// Mean run time of finished campaigns, in milliseconds
    pub average_duration_ms: f64,

    /// Start count per tool
    pub tool_usage: BTreeMap<String, usize>,

    /// Finished count per terminal status
    pub status_counts: BTreeMap<String, usize>,

    /// Campaigns currently running
    pub active_campaigns: usize,
}

impl OrchestratorStatistics {
    /// Mean run time of finished campaigns
    pub fn average_duration(&self) -> Duration {
        Duration::from_secs_f64(self.average_duration_ms.max(0.0) / 1000.0)
    }

    /// Most used tool, if any
    pub fn most_used_tool(&self) -> Option<&str> {
        self.tool_usage
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(tool, _)| tool.as_str())
    }
}

/// Aggregate statistics over history entries
pub fn aggregate_history<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
    active_campaigns: usize,
) -> OrchestratorStatistics {
    let mut stats = OrchestratorStatistics {
        active_campaigns,
        ..Default::default()
    };
    let mut total_duration_ms: u64 = 0;

    for entry in entries {
        match entry.action {
            HistoryAction::Start => {
                stats.total_campaigns += 1;
                *stats.tool_usage.entry(entry.tool_id.clone()).or_default() += 1;
            }
            HistoryAction::Stop => {
                stats.finished_campaigns += 1;
                if let Some(outcome) = &entry.outcome {
                    total_duration_ms += outcome.duration_ms;
                    if outcome.success {
                        stats.successful_campaigns += 1;
                    }
                    *stats
                        .status_counts
                        .entry(outcome.status.to_string())
                        .or_default() += 1;
                }
            }
        }
    }

    if stats.finished_campaigns > 0 {
        let finished = stats.finished_campaigns as f64;
        stats.success_rate = stats.successful_campaigns as f64 / finished;
        stats.average_duration_ms = total_duration_ms as f64 / finished;
    }

    stats
}
