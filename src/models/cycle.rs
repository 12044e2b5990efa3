//! Per-cycle outcome, kept only for logging and the status endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Record;

/// Stage a cycle is in, or failed in.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Fetching,
    Extracting,
    Detecting,
    Notifying,
    Committing,
    Done,
}

/// Why a cycle ended early.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleFailure {
    pub stage: CycleStage,
    pub message: String,
}

/// Outcome of one check of one source.
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last stage reached
    pub stage: CycleStage,
    pub fetched: bool,
    /// Number of records extracted (after key dedup)
    pub extracted: usize,
    /// Records absent from the previous snapshot
    pub new_records: Vec<Record>,
    pub notified: bool,
    /// Whether the snapshot was replaced
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<CycleFailure>,
}

impl CycleResult {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            started_at: Utc::now(),
            finished_at: None,
            stage: CycleStage::Fetching,
            fetched: false,
            extracted: 0,
            new_records: Vec::new(),
            notified: false,
            committed: false,
            failure: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Mark the cycle failed at its current stage.
    pub fn fail(&mut self, message: impl ToString) {
        self.failure = Some(CycleFailure {
            stage: self.stage,
            message: message.to_string(),
        });
        self.finished_at = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.stage = CycleStage::Done;
        self.finished_at = Some(Utc::now());
    }
}
