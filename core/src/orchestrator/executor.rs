//! Orchestrator admission control and campaign bookkeeping

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::campaign::{CampaignSnapshot, CampaignSummary};
use crate::config::{CampaignConfig, ConfigError, OrchestratorConfig};
use crate::error::{CampaignError, CampaignResult};
use crate::executor::{ExecutorBuilder, ExecutorHandle};
use crate::history::{HistoryEntry, PersistentHistory};
use crate::traits::{ProgressSink, ToolRegistry};

use super::aggregator::{aggregate_history, OrchestratorStatistics};

/// An admitted campaign, tracked while it is active
#[derive(Debug, Clone)]
pub struct CampaignHandle {
    campaign_id: String,
    tool_id: String,
    admitted_at: DateTime<Utc>,
    executor: ExecutorHandle,
}

impl CampaignHandle {
    /// Campaign identifier
    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    /// Tool identifier
    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    /// When the campaign was admitted
    pub fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }

    /// Current status snapshot
    pub fn status(&self) -> CampaignSnapshot {
        self.executor.status()
    }

    /// Underlying executor handle
    pub fn executor(&self) -> &ExecutorHandle {
        &self.executor
    }
}

/// Mutable orchestrator state. Only ever touched under `Shared::state`.
struct RegistryState {
    active: HashMap<String, CampaignHandle>,
    history: PersistentHistory,
}

struct Shared {
    config: OrchestratorConfig,
    registry: Arc<dyn ToolRegistry>,
    sink: Arc<dyn ProgressSink>,
    state: Mutex<RegistryState>,
    terms_accepted: AtomicBool,
    sequence: AtomicU64,
}

impl Shared {
    /// Move a finished campaign from the active set into the history log.
    ///
    /// Returns `false` if another path already finalized it. Either way the
    /// log is in storage when this returns; the write happens after the
    /// registry lock is released.
    async fn finalize(&self, summary: &CampaignSummary) -> bool {
        let (released, pending) = {
            let mut state = self.state.lock();
            if state.active.remove(&summary.campaign_id).is_some() {
                tracing::debug!(
                    campaign_id = %summary.campaign_id,
                    status = %summary.status,
                    active = state.active.len(),
                    "Campaign released"
                );
                (true, state.history.record(HistoryEntry::stop(summary)))
            } else {
                (false, state.history.pending())
            }
        };

        if let Err(e) = tokio::task::spawn_blocking(move || pending.commit()).await {
            tracing::warn!(
                target: "campaign::history",
                error = %e,
                "History write task failed"
            );
        }
        released
    }
}

/// Orchestrator manages concurrent campaigns
///
/// Responsible for admission control, tracking active campaigns, and the
/// persisted history log. Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<dyn ToolRegistry>,
        history: PersistentHistory,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let terms_accepted = AtomicBool::new(config.terms_accepted);
        Self {
            shared: Arc::new(Shared {
                config,
                registry,
                sink,
                state: Mutex::new(RegistryState {
                    active: HashMap::new(),
                    history,
                }),
                terms_accepted,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Get the orchestrator configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Set the terms-accepted policy flag
    pub fn accept_terms(&self) {
        self.shared.terms_accepted.store(true, Ordering::SeqCst);
    }

    /// Clear the terms-accepted policy flag
    pub fn revoke_terms(&self) {
        self.shared.terms_accepted.store(false, Ordering::SeqCst);
    }

    /// Whether campaigns may be started
    pub fn is_terms_accepted(&self) -> bool {
        self.shared.terms_accepted.load(Ordering::SeqCst)
    }

    /// Known tool identifiers
    pub fn tools(&self) -> Vec<String> {
        self.shared.registry.tool_ids()
    }

    /// Admit and start a campaign
    ///
    /// Returns as soon as the campaign is running; it continues independently
    /// of the caller. Rejections leave no trace in the active set or history.
    ///
    /// # Errors
    /// `ConfigInvalid` (including an unknown `outcome_model`),
    /// `PolicyNotAccepted`, `ToolNotFound` or `CapacityExceeded`.
    pub fn start_campaign(
        &self,
        tool_id: &str,
        config: CampaignConfig,
    ) -> CampaignResult<CampaignHandle> {
        config.validate()?;

        if !self.is_terms_accepted() {
            return Err(CampaignError::PolicyNotAccepted);
        }

        let mut binding = self.shared.registry.resolve(tool_id)?;
        if !config.outcome_model.is_empty() {
            binding.model = self
                .shared
                .registry
                .outcome_model(&config.outcome_model)
                .ok_or_else(|| {
                    ConfigError::InvalidParameter(format!(
                        "unknown outcome model: {}",
                        config.outcome_model
                    ))
                })?;
        }

        let campaign_id = self.next_campaign_id(tool_id);
        let mut builder = ExecutorBuilder::new(campaign_id.clone())
            .tool_id(tool_id)
            .binding(binding)
            .sink(Arc::clone(&self.shared.sink));
        if config.bounds.max_attempts.is_none() && config.bounds.max_duration.is_none() {
            builder = builder.ceiling(self.shared.config.unbounded_ceiling());
        }
        let executor = builder.config(config).build()?;

        // Only admission bookkeeping happens under the lock. The executor starts
        // after it is released, since starting may call into the progress sink.
        let (handle, pending) = {
            let mut state = self.shared.state.lock();

            let limit = self.shared.config.max_concurrent;
            if state.active.len() >= limit {
                tracing::debug!(
                    tool_id,
                    active = state.active.len(),
                    limit,
                    "Campaign rejected by admission control"
                );
                return Err(CampaignError::CapacityExceeded {
                    active: state.active.len(),
                    limit,
                });
            }

            let handle = CampaignHandle {
                campaign_id: campaign_id.clone(),
                tool_id: tool_id.to_string(),
                admitted_at: Utc::now(),
                executor: executor.handle(),
            };
            state.active.insert(campaign_id.clone(), handle.clone());
            let pending = state
                .history
                .record(HistoryEntry::start(campaign_id, tool_id));

            (handle, pending)
        };
        pending.commit();

        tracing::info!(
            campaign_id = %handle.campaign_id,
            tool_id,
            "Campaign admitted"
        );

        executor.start();

        // Release the slot when the campaign ends on its own
        let shared = Arc::clone(&self.shared);
        let executor = handle.executor.clone();
        tokio::spawn(async move {
            let summary = executor.wait().await;
            shared.finalize(&summary).await;
        });

        Ok(handle)
    }

    /// Cancel a campaign, wait for it to finish, and return its summary
    ///
    /// # Errors
    /// `NotFound` if the campaign is not active.
    pub async fn stop_campaign(&self, campaign_id: &str) -> CampaignResult<CampaignSummary> {
        let handle = self
            .shared
            .state
            .lock()
            .active
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| CampaignError::not_found(campaign_id))?;

        tracing::info!(campaign_id, "Stopping campaign");
        handle.executor.cancel();
        let summary = handle.executor.wait().await;
        self.shared.finalize(&summary).await;

        Ok(summary)
    }

    /// Stop every active campaign
    ///
    /// Stops run concurrently; one failing does not prevent the others.
    pub async fn stop_all(&self) -> Vec<(String, CampaignResult<CampaignSummary>)> {
        let ids: Vec<String> = self.shared.state.lock().active.keys().cloned().collect();

        let stops = ids.into_iter().map(|id| async move {
            let result = self.stop_campaign(&id).await;
            if let Err(e) = &result {
                tracing::warn!(campaign_id = %id, error = %e, "Failed to stop campaign");
            }
            (id, result)
        });

        futures::future::join_all(stops).await
    }

    /// Wait for an active campaign to finish on its own
    ///
    /// # Errors
    /// `NotFound` if the campaign is not active.
    pub async fn wait(&self, campaign_id: &str) -> CampaignResult<CampaignSummary> {
        let handle = self
            .shared
            .state
            .lock()
            .active
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| CampaignError::not_found(campaign_id))?;

        let summary = handle.executor.wait().await;
        self.shared.finalize(&summary).await;
        Ok(summary)
    }

    /// Status of an active campaign, or of a finished one still in the history log
    ///
    /// # Errors
    /// `NotFound` if the campaign is neither active nor in the history log.
    pub fn status(&self, campaign_id: &str) -> CampaignResult<CampaignSnapshot> {
        let state = self.shared.state.lock();

        if let Some(handle) = state.active.get(campaign_id) {
            return Ok(handle.status());
        }

        state
            .history
            .log()
            .last_stop(campaign_id)
            .and_then(snapshot_from_history)
            .ok_or_else(|| CampaignError::not_found(campaign_id))
    }

    /// Snapshots of all active campaigns, oldest admission first
    pub fn list_active(&self) -> Vec<CampaignSnapshot> {
        let mut handles: Vec<CampaignHandle> =
            self.shared.state.lock().active.values().cloned().collect();
        handles.sort_by_key(|h| h.admitted_at);
        handles.iter().map(CampaignHandle::status).collect()
    }

    /// Number of active campaigns
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active.len()
    }

    /// History log, most recent first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.shared.state.lock().history.log().to_vec()
    }

    /// Aggregate statistics over the history log
    pub fn statistics(&self) -> OrchestratorStatistics {
        let (entries, active) = {
            let state = self.shared.state.lock();
            (state.history.log().to_vec(), state.active.len())
        };
        aggregate_history(&entries, active)
    }

    fn next_campaign_id(&self, tool_id: &str) -> String {
        let seq = self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{}", tool_id, Utc::now().timestamp_millis(), seq)
    }
}

fn snapshot_from_history(entry: &HistoryEntry) -> Option<CampaignSnapshot> {
    let outcome = entry.outcome.as_ref()?;
    let elapsed_ms = i64::try_from(outcome.duration_ms).unwrap_or(i64::MAX);
    let elapsed = chrono::Duration::milliseconds(elapsed_ms);
    let started_at = entry
        .timestamp
        .checked_sub_signed(elapsed)
        .unwrap_or(entry.timestamp);

    Some(CampaignSnapshot {
        campaign_id: entry.campaign_id.clone(),
        tool_id: entry.tool_id.clone(),
        status: outcome.status,
        counts: outcome.counts,
        started_at,
        ended_at: Some(entry.timestamp),
        estimated_max_attempts: None,
        progress_percent: 100.0,
        success_probability: None,
        last_trial: None,
        reason: entry.error.clone(),
    })
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Orchestrator")
            .field("config", &self.shared.config)
            .field("active", &state.active.len())
            .field("history", &state.history)
            .field("terms_accepted", &self.is_terms_accepted())
            .finish()
    }
}
