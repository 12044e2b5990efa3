//! Snapshot of the records already notified for one source.
//!
//! The persisted document is always written as
//!
//! ```json
//! { "timestamp": "2025-07-28T10:00:00Z", "records": [ { "key": "..." } ] }
//! ```
//!
//! but older layouts are still accepted on read: a flat list of keys, a
//! flat list of records (or listing objects keyed by `url`), and
//! `{ "timestamp", "headlines" }`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Record;

/// The set of records already notified for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// When this snapshot was taken
    pub timestamp: Option<DateTime<Utc>>,
    /// Notified records, in extraction order
    pub records: Vec<Record>,
}

impl Snapshot {
    /// Replace-wholesale constructor used after a successful notification.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Keys of all stored records.
    pub fn keys(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.iter().any(|r| r.key == key)
    }

    /// Decode any supported snapshot layout.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let document: SnapshotDocument = serde_json::from_slice(bytes)?;
        Ok(document.into())
    }

    /// Encode in the current layout.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&SnapshotFile {
            timestamp: self.timestamp,
            records: &self.records,
        })
    }
}

#[derive(Serialize)]
struct SnapshotFile<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    records: &'a [Record],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Stamped {
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(alias = "headlines")]
        records: Vec<StoredEntry>,
    },
    Flat(Vec<StoredEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Key(String),
    Record(Record),
    Listing(StoredListing),
}

/// Listing object as written before records carried an explicit key.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredListing {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    rooms: Option<String>,
    #[serde(default)]
    area: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl From<StoredEntry> for Record {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Key(key) => Record::from_key(key),
            StoredEntry::Record(record) => record,
            StoredEntry::Listing(listing) => {
                let mut record = Record::from_key(listing.url.clone());
                record.title = listing.title;
                record.url = Some(listing.url);
                record.image_url = listing.image_url;
                for (name, value) in [
                    ("price", listing.price),
                    ("rooms", listing.rooms),
                    ("area", listing.area),
                ] {
                    if let Some(value) = value {
                        record.attributes.insert(name.to_string(), value);
                    }
                }
                record
            }
        }
    }
}

impl From<SnapshotDocument> for Snapshot {
    fn from(document: SnapshotDocument) -> Self {
        match document {
            SnapshotDocument::Stamped { timestamp, records } => Snapshot {
                timestamp: timestamp
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc)),
                records: records.into_iter().map(Record::from).collect(),
            },
            SnapshotDocument::Flat(entries) => Snapshot {
                timestamp: None,
                records: entries.into_iter().map(Record::from).collect(),
            },
        }
    }
}
