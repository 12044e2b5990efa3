// src/pipeline/cycle.rs

//! One check of one source: fetch → extract → detect → notify → commit.
//!
//! The snapshot only advances after the notifier reports success. A failed
//! delivery leaves it untouched so the same records are detected again on
//! the next tick; delivery is at-least-once and a record is never dropped
//! before it went out.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{CycleResult, CycleStage, Snapshot, SourceConfig, dedup_by_key};
use crate::pipeline::diff::calculate_diff;
use crate::services::{Extractor, Fetcher, Notifier};
use crate::storage::SnapshotStore;

/// Runs cycles against a fetcher, a notifier and a snapshot store.
#[derive(Clone)]
pub struct CycleRunner {
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn SnapshotStore>,
}

impl CycleRunner {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
        }
    }

    /// Run one cycle. Failures are recorded in the result, never returned.
    pub async fn run(&self, source: &SourceConfig, extractor: &dyn Extractor) -> CycleResult {
        let mut result = CycleResult::new(&source.name);

        match self.execute(source, extractor, &mut result).await {
            Ok(()) => result.finish(),
            Err(e) => {
                log::error!(
                    "[{}] Cycle failed while {:?}: {}",
                    source.name,
                    result.stage,
                    e
                );
                result.fail(e);
            }
        }
        result
    }

    async fn execute(
        &self,
        source: &SourceConfig,
        extractor: &dyn Extractor,
        result: &mut CycleResult,
    ) -> Result<()> {
        result.stage = CycleStage::Fetching;
        log::info!("[{}] Fetching {}", source.name, source.url);
        let markup = self
            .fetcher
            .fetch(&source.url)
            .await
            .map_err(|e| match e {
                AppError::Fetch { .. } => e,
                other => AppError::fetch(&source.url, other),
            })?;
        result.fetched = true;
        log::debug!("[{}] Fetched {} bytes", source.name, markup.len());

        result.stage = CycleStage::Extracting;
        let current = match extractor.extract(&markup) {
            Ok(records) => dedup_by_key(records),
            Err(e) => {
                log::warn!("[{}] {}. Treating page as empty", source.name, e);
                Vec::new()
            }
        };
        result.extracted = current.len();
        log::info!("[{}] Found {} records", source.name, current.len());

        if current.is_empty() {
            log::info!("[{}] No records on page, nothing to compare", source.name);
            return Ok(());
        }

        result.stage = CycleStage::Detecting;
        let previous = self.store.load(source).await;
        log::debug!(
            "[{}] Loaded {} previously notified records",
            source.name,
            previous.len()
        );

        let diff = calculate_diff(&previous, &current);
        if !diff.removed.is_empty() {
            log::debug!(
                "[{}] {} records no longer listed",
                source.name,
                diff.removed.len()
            );
        }
        if !diff.has_new() {
            log::info!("[{}] No new records", source.name);
            return Ok(());
        }

        log::info!("[{}] {} new records", source.name, diff.added.len());
        for record in &diff.added {
            log::debug!("[{}]   - {}", source.name, record.key);
        }
        result.new_records = diff.added;

        result.stage = CycleStage::Notifying;
        self.notifier
            .notify(source, &result.new_records)
            .await
            .map_err(|e| match e {
                AppError::Notify { .. } => e,
                other => AppError::notify(&source.name, other),
            })?;
        result.notified = true;
        log::info!("[{}] Notification sent", source.name);

        result.stage = CycleStage::Committing;
        self.store
            .save(source, &Snapshot::from_records(current))
            .await?;
        result.committed = true;

        Ok(())
    }
}
