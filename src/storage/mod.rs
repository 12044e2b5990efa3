//! Snapshot persistence.
//!
//! One JSON document per monitored source, all in a single directory:
//!
//! ```text
//! storage/
//! ├── tech-news-headlines.json
//! ├── primary-listings.json
//! └── custom-business-headlines.json
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Snapshot, SourceConfig};

// Re-export for convenience
pub use local::LocalStorage;

/// Durable store of the records already notified for each source.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot for a source.
    ///
    /// Never fails: a missing or unreadable document yields the empty
    /// snapshot (with a warning for the unreadable case). An empty snapshot
    /// makes every current record look new, so a corrupt file produces one
    /// notification burst on the next cycle.
    async fn load(&self, source: &SourceConfig) -> Snapshot;

    /// Replace the snapshot for a source. An `Err` means nothing was
    /// committed.
    async fn save(&self, source: &SourceConfig, snapshot: &Snapshot) -> Result<()>;
}
