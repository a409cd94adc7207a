//! Handle to a started campaign executor

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::campaign::{CampaignSnapshot, CampaignStatus, CampaignSummary};

/// State shared between an executor task and its handles
pub(crate) struct ExecutorShared {
    /// Latest published snapshot
    pub(crate) snapshot: RwLock<CampaignSnapshot>,

    /// Checked by the trial loop before each trial
    pub(crate) cancel_requested: AtomicBool,

    /// Wakes the trial loop out of its rate delay
    pub(crate) shutdown_tx: broadcast::Sender<()>,
}

impl ExecutorShared {
    pub(crate) fn new(snapshot: CampaignSnapshot) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            snapshot: RwLock::new(snapshot),
            cancel_requested: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

/// Handle to a running or finished campaign
///
/// Cheap to clone. Status queries read the latest snapshot and never pause
/// the trial loop.
#[derive(Clone)]
pub struct ExecutorHandle {
    campaign_id: String,
    tool_id: String,
    shared: Arc<ExecutorShared>,
    terminal: watch::Receiver<Option<CampaignSummary>>,
}

impl ExecutorHandle {
    pub(crate) fn new(
        campaign_id: String,
        tool_id: String,
        shared: Arc<ExecutorShared>,
        terminal: watch::Receiver<Option<CampaignSummary>>,
    ) -> Self {
        Self {
            campaign_id,
            tool_id,
            shared,
            terminal,
        }
    }

    /// Campaign identifier
    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// Tool identifier
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// Current status snapshot
    pub fn status(&self) -> CampaignSnapshot {
        self.shared.snapshot.read().clone()
    }

    /// Request cancellation
    ///
    /// Idempotent. The loop observes the request before its next trial, or
    /// immediately if it is waiting on the rate delay. An in-flight trial is
    /// allowed to finish. Returns `false` if the campaign had already
    /// finished, in which case nothing changes.
    pub fn cancel(&self) -> bool {
        if self.shared.snapshot.read().status.is_terminal() {
            return false;
        }
        if !self.shared.cancel_requested.swap(true, Ordering::SeqCst) {
            tracing::debug!(campaign_id = %self.campaign_id, "Cancellation requested");
            let _ = self.shared.shutdown_tx.send(());
        }
        true
    }

    /// Whether the campaign has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.terminal.borrow().is_some()
    }

    /// Final summary, if the campaign has finished
    pub fn summary(&self) -> Option<CampaignSummary> {
        self.terminal.borrow().clone()
    }

    /// Wait for the campaign to finish and return its summary
    ///
    /// If the executor task disappears without producing a summary, the
    /// campaign is reported as `Failed`.
    pub async fn wait(&self) -> CampaignSummary {
        let mut rx = self.terminal.clone();
        let finished = rx.wait_for(Option::is_some).await.map(|s| s.clone());

        match finished {
            Ok(Some(summary)) => summary,
            _ => self.abandoned(),
        }
    }

    fn abandoned(&self) -> CampaignSummary {
        tracing::error!(
            campaign_id = %self.campaign_id,
            "Executor terminated without a summary"
        );

        let mut snapshot = self.shared.snapshot.write();
        let ended_at = Utc::now();
        snapshot.status = CampaignStatus::Failed;
        snapshot.ended_at = Some(ended_at);
        snapshot.reason = Some("executor terminated unexpectedly".into());

        let duration_ms = (ended_at - snapshot.started_at)
            .to_std()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        CampaignSummary {
            campaign_id: self.campaign_id.clone(),
            tool_id: self.tool_id.clone(),
            status: CampaignStatus::Failed,
            reason: snapshot.reason.clone(),
            started_at: snapshot.started_at,
            ended_at,
            duration_ms,
            counts: snapshot.counts,
            winning_input: None,
            recent_trials: snapshot.last_trial.iter().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for ExecutorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorHandle")
            .field("campaign_id", &self.campaign_id)
            .field("tool_id", &self.tool_id)
            .field("status", &self.shared.snapshot.read().status)
            .finish()
    }
}
