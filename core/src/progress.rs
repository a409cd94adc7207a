//! Progress events and the built-in progress sinks

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::campaign::CampaignSummary;
use crate::traits::ProgressSink;
use crate::trial::OutcomeKind;

/// Default buffer size for [`ChannelProgressSink`]
pub const DEFAULT_PROGRESS_BUFFER: usize = 1024;

/// Emitted after every recorded trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Campaign identifier
    pub campaign_id: String,
    /// Progress percentage (0 - 100)
    pub percent: f64,
    /// Trials recorded so far
    pub attempts: u64,
    /// Estimated total trials, if bounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_expected: Option<u64>,
    /// Outcome of the trial just recorded
    pub last_outcome: OutcomeKind,
}

/// Discards all events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_progress(&self, _event: &ProgressEvent) {}

    fn on_terminal(&self, _summary: &CampaignSummary) {}
}

/// Logs events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        tracing::debug!(
            campaign_id = %event.campaign_id,
            attempts = event.attempts,
            percent = event.percent,
            outcome = %event.last_outcome,
            "Campaign progress"
        );
    }

    fn on_terminal(&self, summary: &CampaignSummary) {
        tracing::info!(
            campaign_id = %summary.campaign_id,
            tool_id = %summary.tool_id,
            status = %summary.status,
            attempts = summary.counts.attempts,
            successes = summary.counts.successes,
            duration_ms = summary.duration_ms,
            "Campaign finished"
        );
    }
}

/// Message carried by [`ChannelProgressSink`]
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// A trial was recorded
    Progress(ProgressEvent),
    /// A campaign reached a terminal state
    Terminal(CampaignSummary),
}

/// Forwards events into a bounded channel without waiting
///
/// Updates are dropped, never awaited, when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ChannelProgressSink {
    /// Create a sink and its receiving end
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    fn forward(&self, update: ProgressUpdate) {
        if let Err(e) = self.tx.try_send(update) {
            tracing::trace!(error = %e, "Progress update dropped");
        }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.forward(ProgressUpdate::Progress(event.clone()));
    }

    fn on_terminal(&self, summary: &CampaignSummary) {
        self.forward(ProgressUpdate::Terminal(summary.clone()));
    }
}

/// Delivers every event to each inner sink in order
#[derive(Clone, Default)]
pub struct FanoutProgressSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutProgressSink {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for FanoutProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            sink.on_progress(event);
        }
    }

    fn on_terminal(&self, summary: &CampaignSummary) {
        for sink in &self.sinks {
            sink.on_terminal(summary);
        }
    }
}

impl std::fmt::Debug for FanoutProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutProgressSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(attempts: u64) -> ProgressEvent {
        ProgressEvent {
            campaign_id: "flood-1".into(),
            percent: attempts as f64,
            attempts,
            total_expected: Some(100),
            last_outcome: OutcomeKind::Miss,
        }
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelProgressSink::channel(4);
        sink.on_progress(&event(1));

        match rx.try_recv() {
            Ok(ProgressUpdate::Progress(e)) => assert_eq!(e.attempts, 1),
            other => panic!("Expected progress update, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelProgressSink::channel(2);
        for i in 0..5 {
            sink.on_progress(&event(i));
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[test]
    fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelProgressSink::channel(2);
        drop(rx);
        // Must not panic
        sink.on_progress(&event(1));
    }

    #[test]
    fn test_fanout_delivers_to_all() {
        let (a, mut rx_a) = ChannelProgressSink::channel(4);
        let (b, mut rx_b) = ChannelProgressSink::channel(4);
        let fanout = FanoutProgressSink::new()
            .with(Arc::new(a))
            .with(Arc::new(b))
            .with(Arc::new(NoopProgressSink));

        fanout.on_progress(&event(3));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(format!("{:?}", fanout).contains("3"));
    }
}
