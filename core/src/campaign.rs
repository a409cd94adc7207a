//! Campaign lifecycle status, counters, snapshots and summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::trial::{OutcomeKind, TrialInput, TrialRecord};

/// Campaign lifecycle state
///
/// `Initializing -> Running -> {Completed, Cracked, Failed, Stopped}`.
/// `Initializing` may also go straight to `Failed` when prerequisites are unmet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Prerequisites are being checked
    Initializing,
    /// Trial loop is active
    Running,
    /// Reached its duration or count bound without a terminal success
    Completed,
    /// A success occurred and the configuration treats it as terminal
    Cracked,
    /// Prerequisites failed or the error threshold was exceeded
    Failed,
    /// Cancelled while running
    Stopped,
}

impl CampaignStatus {
    /// Whether this status is final
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CampaignStatus::Initializing | CampaignStatus::Running)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignStatus::Initializing => "initializing",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cracked => "cracked",
            CampaignStatus::Failed => "failed",
            CampaignStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Per-outcome counters
///
/// `successes + misses + rejects + errors == attempts` always holds, since
/// `record` is the only way to move any of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    /// Total trials recorded
    pub attempts: u64,
    /// `Success` outcomes
    pub successes: u64,
    /// `Miss` outcomes
    pub misses: u64,
    /// `Rejected` outcomes
    pub rejects: u64,
    /// `Error` outcomes
    pub errors: u64,
}

impl OutcomeCounts {
    /// Count one outcome
    pub fn record(&mut self, outcome: OutcomeKind) {
        self.attempts += 1;
        match outcome {
            OutcomeKind::Success => self.successes += 1,
            OutcomeKind::Miss => self.misses += 1,
            OutcomeKind::Rejected => self.rejects += 1,
            OutcomeKind::Error => self.errors += 1,
        }
    }

    /// Counter for a single outcome kind
    pub fn get(&self, outcome: OutcomeKind) -> u64 {
        match outcome {
            OutcomeKind::Success => self.successes,
            OutcomeKind::Miss => self.misses,
            OutcomeKind::Rejected => self.rejects,
            OutcomeKind::Error => self.errors,
        }
    }

    /// Whether the per-outcome counters sum to `attempts`
    pub fn is_consistent(&self) -> bool {
        self.successes + self.misses + self.rejects + self.errors == self.attempts
    }

    /// Error rate (0.0 - 1.0)
    pub fn error_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.errors as f64 / self.attempts as f64
        }
    }

    /// Success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Progress percentage: `min(100, attempts / estimated_max * 100)`.
///
/// Returns 0 when no estimate exists (unbounded campaigns).
pub fn progress_percent(attempts: u64, estimated_max: Option<u64>) -> f64 {
    match estimated_max {
        Some(max) if max > 0 => (attempts as f64 / max as f64 * 100.0).min(100.0),
        _ => 0.0,
    }
}

/// Chance of at least one success in `remaining` further trials,
/// `1 - (1 - p)^remaining`.
///
/// This is a forward-looking estimate computed from the outcome model's
/// nominal per-trial rate. It is for reporting only and is not a statistical
/// inference from observed counts.
pub fn success_probability(per_trial_rate: f64, remaining: u64) -> f64 {
    let p = per_trial_rate.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powf(remaining as f64)
}

/// Point-in-time view of a campaign, readable while it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    /// Campaign identifier
    pub campaign_id: String,
    /// Tool identifier
    pub tool_id: String,
    /// Current status
    pub status: CampaignStatus,
    /// Counters so far
    pub counts: OutcomeCounts,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time, once terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Estimated total attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_max_attempts: Option<u64>,
    /// Progress percentage (0 - 100)
    pub progress_percent: f64,
    /// Estimated chance of a success in the remaining attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_probability: Option<f64>,
    /// Most recent trial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trial: Option<TrialRecord>,
    /// Failure reason, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Finalized campaign result. Computed exactly once, at termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    /// Campaign identifier
    pub campaign_id: String,
    /// Tool identifier
    pub tool_id: String,
    /// Terminal status
    pub status: CampaignStatus,
    /// Why the campaign failed or stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub ended_at: DateTime<Utc>,
    /// Wall-clock run time in milliseconds
    pub duration_ms: u64,
    /// Final counters
    pub counts: OutcomeCounts,
    /// Input that produced the terminal success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_input: Option<TrialInput>,
    /// Most recent trials retained by the record buffer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_trials: Vec<TrialRecord>,
}

impl CampaignSummary {
    /// Whether the campaign achieved its objective: it cracked, or it ran to
    /// its bound with at least one success.
    pub fn success(&self) -> bool {
        match self.status {
            CampaignStatus::Cracked => true,
            CampaignStatus::Completed => self.counts.successes > 0,
            _ => false,
        }
    }

    /// Wall-clock run time
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
