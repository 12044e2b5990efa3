//! Shared view of scheduler progress, read by the status endpoint.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::CycleResult;

/// Latest pass timing and per-source cycle outcomes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Completed passes since start
    pub passes: u64,
    pub last_pass_started: Option<DateTime<Utc>>,
    pub last_pass_finished: Option<DateTime<Utc>>,
    /// Most recent cycle per source name
    pub cycles: BTreeMap<String, CycleResult>,
}

#[derive(Debug, Default)]
pub struct StatusBoard {
    report: RwLock<StatusReport>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass_started(&self) {
        self.update(|r| r.last_pass_started = Some(Utc::now()));
    }

    pub fn pass_finished(&self) {
        self.update(|r| {
            r.passes += 1;
            r.last_pass_finished = Some(Utc::now());
        });
    }

    pub fn record_cycle(&self, result: &CycleResult) {
        self.update(|r| {
            r.cycles.insert(result.source.clone(), result.clone());
        });
    }

    /// Copy of the current report.
    pub fn report(&self) -> StatusReport {
        self.report
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut StatusReport)) {
        let mut report = self
            .report
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut report);
    }
}
