//! Trial inputs, outcomes and the bounded record buffer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Classification of a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The trial achieved its objective
    Success,
    /// The trial was delivered but did not succeed
    Miss,
    /// The target refused the trial
    Rejected,
    /// The trial itself failed
    Error,
}

impl OutcomeKind {
    /// All outcome kinds, in counter order
    pub const ALL: [OutcomeKind; 4] = [
        OutcomeKind::Success,
        OutcomeKind::Miss,
        OutcomeKind::Rejected,
        OutcomeKind::Error,
    ];
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Miss => "miss",
            OutcomeKind::Rejected => "rejected",
            OutcomeKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// Generated input for one trial (a candidate guess, a packet descriptor, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialInput(pub String);

impl TrialInput {
    /// Create a new trial input
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the input as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrialInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrialInput {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrialInput {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One recorded trial. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Sequence number, starting at 1
    pub sequence: u64,

    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,

    /// Generated input; absent when generation itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<TrialInput>,

    /// Sampled outcome
    pub outcome: OutcomeKind,

    /// Failure detail for `Error` outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ring buffer holding only the most recent trial records.
///
/// Aggregate counters live elsewhere, so evicted records are never needed again.
#[derive(Debug, Clone)]
pub struct TrialBuffer {
    records: VecDeque<TrialRecord>,
    capacity: usize,
}

/// Records allocated up front; larger buffers grow as trials arrive
const PREALLOCATED_RECORDS: usize = 128;

impl TrialBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(PREALLOCATED_RECORDS)),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full
    pub fn push(&mut self, record: TrialRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Most recent record
    pub fn last(&self) -> Option<&TrialRecord> {
        self.records.back()
    }

    /// Records from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter()
    }

    /// Copy out the retained records, oldest first
    pub fn to_vec(&self) -> Vec<TrialRecord> {
        self.records.iter().cloned().collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are retained
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of retained records
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64) -> TrialRecord {
        TrialRecord {
            sequence,
            timestamp: Utc::now(),
            input: Some(TrialInput::new(format!("input-{sequence}"))),
            outcome: OutcomeKind::Miss,
            error: None,
        }
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = TrialBuffer::new(3);
        for seq in 1..=5 {
            buffer.push(record(seq));
        }

        assert_eq!(buffer.len(), 3);
        let sequences: Vec<u64> = buffer.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);
        assert_eq!(buffer.last().map(|r| r.sequence), Some(5));
    }

    #[test]
    fn test_buffer_zero_capacity() {
        let mut buffer = TrialBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(record(1));
        buffer.push(record(2));
        assert_eq!(buffer.to_vec().len(), 1);
    }

    #[test]
    fn test_buffer_huge_capacity_allocates_lazily() {
        let mut buffer = TrialBuffer::new(usize::MAX);
        assert_eq!(buffer.capacity(), usize::MAX);
        for seq in 1..=3 {
            buffer.push(record(seq));
        }
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_outcome_snake_case_serialization() {
        assert_eq!(
            serde_json::to_string(&OutcomeKind::Rejected).unwrap(),
            "\"rejected\""
        );
        assert_eq!(OutcomeKind::Success.to_string(), "success");
    }

    #[test]
    fn test_trial_input_transparent() {
        let input = TrialInput::from("hunter2");
        assert_eq!(serde_json::to_string(&input).unwrap(), "\"hunter2\"");
        assert_eq!(input.as_str(), "hunter2");
    }

    #[test]
    fn test_record_skips_empty_fields() {
        let mut r = record(1);
        r.input = None;
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("input"));
        assert!(!json.contains("error"));
    }
}
