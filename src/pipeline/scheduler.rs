// src/pipeline/scheduler.rs

//! Repeating passes over every configured source.
//!
//! A pass runs the sources strictly one after another; a failing source is
//! logged and the pass moves on. Stopping prevents any further pass from
//! starting but lets a pass already in progress run to completion, so a
//! snapshot is never abandoned mid-write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::models::{Config, SourceConfig};
use crate::pipeline::cycle::CycleRunner;
use crate::pipeline::status::StatusBoard;
use crate::services::{Extractor, build_extractor};

/// Cloneable stop signal for a `Scheduler`.
///
/// `stop()` is synchronous and never blocks, so it can be called from a
/// signal-handling task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `stop()` has been called.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Tallies for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sources: usize,
    pub failed: usize,
    /// Records delivered and committed during the pass
    pub notified_records: usize,
}

struct WatchedSource {
    config: SourceConfig,
    extractor: Box<dyn Extractor>,
}

/// Owns the timer, the source list and the stop signal.
pub struct Scheduler {
    sources: Vec<WatchedSource>,
    runner: CycleRunner,
    interval: Duration,
    stop: StopHandle,
    status: Arc<StatusBoard>,
}

impl Scheduler {
    /// Build a scheduler for every source in `config`, in config order.
    pub fn new(config: &Config, runner: CycleRunner) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|source| {
                Ok(WatchedSource {
                    config: source.clone(),
                    extractor: build_extractor(&source.extractor)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sources,
            runner,
            interval: config.interval(),
            stop: StopHandle::new(),
            status: Arc::new(StatusBoard::new()),
        })
    }

    /// Report progress to a shared status board.
    pub fn with_status(mut self, status: Arc<StatusBoard>) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.status)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Check every source once, sequentially.
    pub async fn run_pass(&self) -> PassSummary {
        log::info!("=== Checking {} sources ===", self.sources.len());
        self.status.pass_started();

        let mut summary = PassSummary {
            sources: self.sources.len(),
            ..PassSummary::default()
        };

        for source in &self.sources {
            let result = self.runner.run(&source.config, source.extractor.as_ref()).await;
            if result.is_failed() {
                summary.failed += 1;
            } else if result.committed {
                summary.notified_records += result.new_records.len();
            }
            self.status.record_cycle(&result);
        }

        self.status.pass_finished();
        log::info!(
            "=== Finished checking all sources ({} failed, {} new records delivered) ===",
            summary.failed,
            summary.notified_records
        );
        summary
    }

    /// Run a pass now, then one every interval, until stopped.
    pub async fn start(&self) {
        let mut stop_rx = self.stop.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Monitoring {} sources every {}s",
            self.sources.len(),
            self.interval.as_secs()
        );

        loop {
            if self.stop.is_stopped() {
                break;
            }

            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if self.stop.is_stopped() {
                break;
            }
            self.run_pass().await;
        }

        log::info!("Monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::pipeline::cycle::tests::{FakeFetcher, FakeNotifier, MemoryStore, source};
    use crate::services::Fetcher;

    /// Holds the fetch of one URL until released.
    #[derive(Default)]
    struct GatedFetcher {
        inner: FakeFetcher,
        gated_url: String,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url == self.gated_url {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.fetch(url).await
        }
    }

    struct Fixture {
        fetcher: Arc<FakeFetcher>,
        notifier: Arc<FakeNotifier>,
        store: Arc<MemoryStore>,
        scheduler: Arc<Scheduler>,
    }

    fn fixture(names: &[&str], interval_secs: u64) -> Fixture {
        let fetcher = Arc::new(FakeFetcher::default());
        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = CycleRunner::new(fetcher.clone(), notifier.clone(), store.clone());

        let mut config = Config::default();
        config.monitor.interval_secs = interval_secs;
        config.sources = names.iter().map(|n| source(n)).collect();

        let scheduler = Arc::new(Scheduler::new(&config, runner).unwrap());
        Fixture {
            fetcher,
            notifier,
            store,
            scheduler,
        }
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_pass() {
        let f = fixture(&["First", "Second"], 60);
        // "First" has no page, so its fetch fails.
        f.fetcher.set_page(&source("Second").url, &["X"]);

        let summary = f.scheduler.run_pass().await;

        assert_eq!(summary.sources, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.notified_records, 1);
        assert_eq!(
            f.notifier.sent(),
            vec![("Second".to_string(), vec!["X".to_string()])]
        );
        assert_eq!(f.store.keys("Second"), vec!["X"]);

        let report = f.scheduler.status().report();
        assert!(report.cycles["First"].is_failed());
        assert!(report.cycles["Second"].committed);
    }

    #[tokio::test]
    async fn test_sources_run_in_config_order() {
        let f = fixture(&["A", "B", "C"], 60);
        for name in ["A", "B", "C"] {
            f.fetcher.set_page(&source(name).url, &[name]);
        }

        f.scheduler.run_pass().await;

        let order: Vec<String> = f.notifier.sent().into_iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_pass_then_every_interval() {
        let f = fixture(&["A", "B"], 300);
        let scheduler = Arc::clone(&f.scheduler);
        let task = tokio::spawn(async move { scheduler.start().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.fetcher.calls(), 2);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(f.fetcher.calls(), 4);

        f.scheduler.stop();
        task.await.unwrap();
        assert_eq!(f.scheduler.status().report().passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_passes() {
        let f = fixture(&["A"], 300);
        let handle = f.scheduler.stop_handle();
        let scheduler = Arc::clone(&f.scheduler);
        let task = tokio::spawn(async move { scheduler.start().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();
        task.await.unwrap();

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(f.fetcher.calls(), 1);
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_stop() {
        let handle = StopHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        handle.stop();
        task.await.unwrap();
        // Already stopped: returns immediately.
        handle.stopped().await;
    }

    #[tokio::test]
    async fn test_stopped_before_start_runs_nothing() {
        let f = fixture(&["A"], 300);
        f.scheduler.stop();
        f.scheduler.start().await;
        assert_eq!(f.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_during_pass_lets_it_finish() {
        let mut fetcher = GatedFetcher {
            gated_url: source("First").url,
            ..GatedFetcher::default()
        };
        fetcher.inner.set_page(&source("First").url, &["A"]);
        fetcher.inner.set_page(&source("Second").url, &["B"]);
        let fetcher = Arc::new(fetcher);

        let notifier = Arc::new(FakeNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = CycleRunner::new(fetcher.clone(), notifier.clone(), store.clone());

        let mut config = Config::default();
        config.monitor.interval_secs = 1;
        config.sources = vec![source("First"), source("Second")];
        let scheduler = Arc::new(Scheduler::new(&config, runner).unwrap());

        let running = Arc::clone(&scheduler);
        let task = tokio::spawn(async move { running.start().await });

        // First source is mid-fetch when the stop arrives.
        fetcher.entered.notified().await;
        scheduler.stop();
        fetcher.release.notify_one();
        task.await.unwrap();

        assert_eq!(fetcher.inner.calls(), 2);
        assert_eq!(
            notifier.sent(),
            vec![
                ("First".to_string(), vec!["A".to_string()]),
                ("Second".to_string(), vec!["B".to_string()]),
            ]
        );
        assert_eq!(store.keys("First"), vec!["A"]);
        assert_eq!(store.keys("Second"), vec!["B"]);

        let report = scheduler.status().report();
        assert_eq!(report.passes, 1);
        assert!(report.cycles.values().all(|c| c.committed));
    }
}
