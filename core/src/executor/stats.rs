//! Mutable campaign state owned by the trial loop

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::campaign::{CampaignStatus, OutcomeCounts};
use crate::trial::{OutcomeKind, TrialBuffer, TrialInput, TrialRecord};

/// Campaign state
///
/// Mutated only by the owning executor. Read-only once `status` is terminal.
#[derive(Debug, Clone)]
pub struct CampaignState {
    /// Lifecycle status
    pub status: CampaignStatus,

    /// Outcome counters
    pub counts: OutcomeCounts,

    /// Current run of consecutive `Error` outcomes
    pub consecutive_errors: u32,

    /// Wall-clock start time
    pub started_at: DateTime<Utc>,

    /// Wall-clock end time
    pub ended_at: Option<DateTime<Utc>>,

    /// Recent trial records
    pub records: TrialBuffer,

    /// Input of the terminal success, if any
    pub winning_input: Option<TrialInput>,

    /// Failure or stop reason
    pub reason: Option<String>,

    started: Instant,
    ended: Option<Instant>,
}

impl CampaignState {
    /// Create state for a new campaign, retaining up to `buffer` records
    pub fn new(buffer: usize) -> Self {
        Self {
            status: CampaignStatus::Initializing,
            counts: OutcomeCounts::default(),
            consecutive_errors: 0,
            started_at: Utc::now(),
            ended_at: None,
            records: TrialBuffer::new(buffer),
            winning_input: None,
            reason: None,
            started: Instant::now(),
            ended: None,
        }
    }

    /// Sequence number of the next trial
    pub fn next_sequence(&self) -> u64 {
        self.counts.attempts + 1
    }

    /// Record a finished trial
    pub fn record(&mut self, record: TrialRecord) {
        self.counts.record(record.outcome);
        if record.outcome == OutcomeKind::Error {
            self.consecutive_errors += 1;
        } else {
            self.consecutive_errors = 0;
        }
        self.records.push(record);
    }

    /// Move to a terminal status. Only the first call has any effect.
    pub fn finish(&mut self, status: CampaignStatus, reason: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.reason = reason;
        self.ended_at = Some(Utc::now());
        self.ended = Some(Instant::now());
    }

    /// Time since start, frozen once terminal
    pub fn elapsed(&self) -> Duration {
        self.ended
            .map(|end| end.duration_since(self.started))
            .unwrap_or_else(|| self.started.elapsed())
    }

    /// Observed trials per second
    pub fn trials_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.counts.attempts as f64 / secs
        } else {
            0.0
        }
    }

    /// Most recent trial
    pub fn last_trial(&self) -> Option<&TrialRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64, outcome: OutcomeKind) -> TrialRecord {
        TrialRecord {
            sequence,
            timestamp: Utc::now(),
            input: None,
            outcome,
            error: None,
        }
    }

    #[test]
    fn test_state_defaults() {
        let state = CampaignState::new(8);
        assert_eq!(state.status, CampaignStatus::Initializing);
        assert_eq!(state.counts.attempts, 0);
        assert_eq!(state.next_sequence(), 1);
        assert!(state.ended_at.is_none());
        assert!(state.last_trial().is_none());
    }

    #[test]
    fn test_state_consecutive_errors_reset() {
        let mut state = CampaignState::new(8);
        state.record(record(1, OutcomeKind::Error));
        state.record(record(2, OutcomeKind::Error));
        assert_eq!(state.consecutive_errors, 2);

        state.record(record(3, OutcomeKind::Miss));
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.counts.errors, 2);
        assert_eq!(state.next_sequence(), 4);
        assert!(state.counts.is_consistent());
    }

    #[test]
    fn test_state_finish_once() {
        let mut state = CampaignState::new(8);
        state.status = CampaignStatus::Running;
        state.finish(CampaignStatus::Stopped, Some("cancelled".into()));
        state.finish(CampaignStatus::Completed, None);

        assert_eq!(state.status, CampaignStatus::Stopped);
        assert_eq!(state.reason.as_deref(), Some("cancelled"));
        assert!(state.ended_at.is_some());
    }

    #[test]
    fn test_state_elapsed_frozen() {
        let mut state = CampaignState::new(8);
        std::thread::sleep(Duration::from_millis(10));
        state.finish(CampaignStatus::Completed, None);

        let first = state.elapsed();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(state.elapsed(), first);
        assert!(first >= Duration::from_millis(10));
    }
}
