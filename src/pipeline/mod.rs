//! Pipeline entry points for the watcher.
//!
//! - `cycle`: One fetch → extract → detect → notify → commit pass over a source
//! - `diff`: Which records are new relative to the stored snapshot
//! - `scheduler`: Sequential passes over all sources on a fixed interval
//! - `status`: Progress shared with the status endpoint

pub mod cycle;
pub mod diff;
pub mod scheduler;
pub mod status;

pub use cycle::CycleRunner;
pub use diff::{DiffResult, calculate_diff, detect_new};
pub use scheduler::{PassSummary, Scheduler, StopHandle};
pub use status::{StatusBoard, StatusReport};
