//! Campaign trial loop

use crate::campaign::{
    progress_percent, success_probability, CampaignSnapshot, CampaignStatus, CampaignSummary,
};
use crate::config::CampaignConfig;
use crate::error::{CampaignError, TrialError};
use crate::progress::ProgressEvent;
use crate::traits::{OutcomeModel, PrerequisiteCheck, ProgressSink, TrialGenerator};
use crate::trial::{OutcomeKind, TrialInput, TrialRecord};

use super::handle::{ExecutorHandle, ExecutorShared};
use super::rate_limiter::TrialRateLimiter;
use super::stats::CampaignState;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

/// Why the loop stopped, and how the campaign ends
struct Termination {
    status: CampaignStatus,
    reason: Option<String>,
}

impl Termination {
    fn new(status: CampaignStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    fn with_reason(status: CampaignStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
        }
    }
}

/// Runs one campaign: generate -> wait -> classify -> record -> report -> repeat
///
/// Built with [`ExecutorBuilder`](super::ExecutorBuilder) and consumed by
/// [`start`](CampaignExecutor::start), which spawns the loop as a tokio task
/// and returns an [`ExecutorHandle`].
pub struct CampaignExecutor {
    pub(crate) campaign_id: String,
    pub(crate) tool_id: String,
    pub(crate) config: Arc<CampaignConfig>,
    pub(crate) generator: Arc<dyn TrialGenerator>,
    pub(crate) model: Arc<dyn OutcomeModel>,
    pub(crate) prerequisites: Arc<dyn PrerequisiteCheck>,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) rate_limiter: TrialRateLimiter,
    pub(crate) ceiling: Option<Duration>,
    pub(crate) shared: Arc<ExecutorShared>,
    pub(crate) shutdown: broadcast::Receiver<()>,
    pub(crate) terminal: watch::Sender<Option<CampaignSummary>>,
}

impl CampaignExecutor {
    /// Handle to this campaign, usable before the executor is started
    ///
    /// Reports `Initializing` until [`start`](CampaignExecutor::start) runs.
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle::new(
            self.campaign_id.clone(),
            self.tool_id.clone(),
            Arc::clone(&self.shared),
            self.terminal.subscribe(),
        )
    }

    /// Check prerequisites and start the trial loop
    ///
    /// Must be called from within a tokio runtime. If prerequisites fail, no
    /// trial runs and the returned handle is already terminal with `Failed`.
    /// In that case the sink's terminal event fires before this returns.
    pub fn start(mut self) -> ExecutorHandle {
        let handle = self.handle();

        let mut state = CampaignState::new(self.config.record_buffer);

        if let Err(reason) = self.prerequisites.check(&self.config) {
            let reason = CampaignError::prerequisites(reason).to_string();
            tracing::warn!(
                campaign_id = %self.campaign_id,
                tool_id = %self.tool_id,
                reason = %reason,
                "Campaign failed before start"
            );
            let summary = self.finalize(
                &mut state,
                Termination::with_reason(CampaignStatus::Failed, reason),
            );
            self.terminal.send_replace(Some(summary));
            return handle;
        }

        state.status = CampaignStatus::Running;
        self.shared.snapshot.write().status = CampaignStatus::Running;

        tokio::spawn(async move {
            let summary = self.run(state).await;
            self.terminal.send_replace(Some(summary));
        });

        handle
    }

    /// Run the trial loop to a terminal state
    async fn run(&mut self, mut state: CampaignState) -> CampaignSummary {
        let deadline = self.deadline();

        tracing::info!(
            campaign_id = %self.campaign_id,
            tool_id = %self.tool_id,
            rate = self.config.rate.per_second(),
            max_attempts = ?self.config.bounds.max_attempts,
            max_duration = ?self.config.bounds.max_duration,
            success_terminal = self.config.success_terminal,
            "Campaign started"
        );

        let termination = loop {
            // Check stop conditions BEFORE starting a new trial
            if let Some(termination) = self.should_stop(&state, deadline) {
                break termination;
            }

            let sequence = state.next_sequence();
            let generated = self.generator.generate(sequence, &self.config);

            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    tracing::debug!(campaign_id = %self.campaign_id, "Cancelled during rate delay");
                    break Termination::new(CampaignStatus::Stopped);
                }

                _ = until(deadline) => {
                    tracing::debug!(campaign_id = %self.campaign_id, "Duration bound reached");
                    break Termination::new(CampaignStatus::Completed);
                }

                _ = self.rate_limiter.wait() => {}
            }

            let record = self.execute_one(sequence, generated).await;
            let outcome = record.outcome;
            let input = record.input.clone();
            state.record(record);
            self.publish(&state);

            // The in-flight trial stays recorded, but a cancelled campaign ends Stopped
            if self.shared.is_cancel_requested() {
                tracing::debug!(campaign_id = %self.campaign_id, "Cancelled during trial");
                break Termination::new(CampaignStatus::Stopped);
            }

            if outcome == OutcomeKind::Success && self.config.success_terminal {
                state.winning_input = input;
                break Termination::new(CampaignStatus::Cracked);
            }

            if let Some(termination) = self.error_threshold_exceeded(&state) {
                break termination;
            }
        };

        self.finalize(&mut state, termination)
    }

    /// Generate-independent half of a trial: classify and build the record
    async fn execute_one(
        &self,
        sequence: u64,
        generated: Result<TrialInput, TrialError>,
    ) -> TrialRecord {
        let (input, result) = match generated {
            Ok(input) => {
                let timeout = self.config.trial_timeout;
                let result = match tokio::time::timeout(timeout, self.model.classify(&input)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(TrialError::Timeout(timeout)),
                };
                (Some(input), result)
            }
            Err(e) => (None, Err(e)),
        };

        let (outcome, error) = match result {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                tracing::warn!(
                    campaign_id = %self.campaign_id,
                    sequence,
                    error = %e,
                    "Trial failed"
                );
                (OutcomeKind::Error, Some(e.to_string()))
            }
        };

        TrialRecord {
            sequence,
            timestamp: Utc::now(),
            input,
            outcome,
            error,
        }
    }

    /// Stop conditions evaluated before each trial
    fn should_stop(&self, state: &CampaignState, deadline: Option<Instant>) -> Option<Termination> {
        if self.shared.is_cancel_requested() {
            return Some(Termination::new(CampaignStatus::Stopped));
        }

        if let Some(max) = self.config.bounds.max_attempts {
            if state.counts.attempts >= max {
                tracing::debug!(
                    campaign_id = %self.campaign_id,
                    attempts = state.counts.attempts,
                    "Attempt bound reached"
                );
                return Some(Termination::new(CampaignStatus::Completed));
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(Termination::new(CampaignStatus::Completed));
        }

        None
    }

    fn error_threshold_exceeded(&self, state: &CampaignState) -> Option<Termination> {
        if state.consecutive_errors > self.config.max_consecutive_errors {
            let last = state
                .last_trial()
                .and_then(|r| r.error.clone())
                .unwrap_or_default();
            return Some(Termination::with_reason(
                CampaignStatus::Failed,
                format!(
                    "{} consecutive trial errors (last: {})",
                    state.consecutive_errors, last
                ),
            ));
        }

        if let Some(max_rate) = self.config.max_error_rate {
            let counts = &state.counts;
            if counts.attempts >= self.config.error_rate_min_samples
                && counts.error_rate() > max_rate
            {
                return Some(Termination::with_reason(
                    CampaignStatus::Failed,
                    format!(
                        "error rate {:.2} exceeded threshold {:.2}",
                        counts.error_rate(),
                        max_rate
                    ),
                ));
            }
        }

        None
    }

    /// Earliest of the duration bound and the unbounded ceiling, from now
    ///
    /// A limit too far out to represent as an `Instant` is no deadline at all.
    fn deadline(&self) -> Option<Instant> {
        let limit = match (self.config.bounds.max_duration, self.ceiling) {
            (Some(d), Some(c)) => Some(d.min(c)),
            (d, c) => d.or(c),
        };
        limit.and_then(|d| Instant::now().checked_add(d))
    }

    /// Publish counters to the shared snapshot and the progress sink
    fn publish(&self, state: &CampaignState) {
        let total_expected = self.config.estimated_max_attempts();
        let attempts = state.counts.attempts;
        let percent = progress_percent(attempts, total_expected);

        {
            let mut snapshot = self.shared.snapshot.write();
            snapshot.counts = state.counts;
            snapshot.progress_percent = percent;
            snapshot.success_probability = total_expected.map(|max| {
                success_probability(
                    self.model.nominal_success_rate(),
                    max.saturating_sub(attempts),
                )
            });
            snapshot.last_trial = state.last_trial().cloned();
        }

        if let Some(last) = state.last_trial() {
            self.sink.on_progress(&ProgressEvent {
                campaign_id: self.campaign_id.clone(),
                percent,
                attempts,
                total_expected,
                last_outcome: last.outcome,
            });
        }
    }

    /// Enter the terminal state and produce the summary. Runs exactly once.
    fn finalize(&self, state: &mut CampaignState, termination: Termination) -> CampaignSummary {
        state.finish(termination.status, termination.reason);

        let summary = CampaignSummary {
            campaign_id: self.campaign_id.clone(),
            tool_id: self.tool_id.clone(),
            status: state.status,
            reason: state.reason.clone(),
            started_at: state.started_at,
            ended_at: state.ended_at.unwrap_or_else(Utc::now),
            duration_ms: state.elapsed().as_millis() as u64,
            counts: state.counts,
            winning_input: state.winning_input.clone(),
            recent_trials: state.records.to_vec(),
        };

        {
            let mut snapshot = self.shared.snapshot.write();
            snapshot.status = summary.status;
            snapshot.counts = summary.counts;
            snapshot.ended_at = Some(summary.ended_at);
            snapshot.reason = summary.reason.clone();
            snapshot.last_trial = state.last_trial().cloned();
        }

        tracing::info!(
            campaign_id = %self.campaign_id,
            status = %summary.status,
            attempts = summary.counts.attempts,
            successes = summary.counts.successes,
            errors = summary.counts.errors,
            trials_per_second = state.trials_per_second(),
            elapsed_ms = summary.duration_ms,
            "Campaign terminated"
        );

        self.sink.on_terminal(&summary);
        summary
    }

    /// Initial snapshot published before the loop starts
    pub(crate) fn initial_snapshot(
        campaign_id: &str,
        tool_id: &str,
        config: &CampaignConfig,
    ) -> CampaignSnapshot {
        CampaignSnapshot {
            campaign_id: campaign_id.to_string(),
            tool_id: tool_id.to_string(),
            status: CampaignStatus::Initializing,
            counts: Default::default(),
            started_at: Utc::now(),
            ended_at: None,
            estimated_max_attempts: config.estimated_max_attempts(),
            progress_percent: 0.0,
            success_probability: None,
            last_trial: None,
            reason: None,
        }
    }

    /// Campaign identifier
    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }
}

/// Resolves at `deadline`, or never
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for CampaignExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignExecutor")
            .field("campaign_id", &self.campaign_id)
            .field("tool_id", &self.tool_id)
            .field("generator", &self.generator.name())
            .field("model", &self.model.name())
            .field("rate_limiter", &self.rate_limiter)
            .field("ceiling", &self.ceiling)
            .finish()
    }
}
