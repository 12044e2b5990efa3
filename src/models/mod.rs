// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod cycle;
mod record;
mod snapshot;
mod source;

// Re-export all public types
pub use config::{Config, HttpConfig, MonitorConfig, NotifyConfig, ServerConfig};
pub use cycle::{CycleFailure, CycleResult, CycleStage};
pub use record::{Record, dedup_by_key};
pub use snapshot::Snapshot;
pub use source::{ExtractorConfig, ListingSelectors, NotifyMode, SourceConfig};
