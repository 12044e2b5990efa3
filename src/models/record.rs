//! Record data structure.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One item observed on a source page (a listing or a headline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Stable identifier: the listing URL or the headline text
    pub key: String,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Link to the item, if the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Image reference, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Source-specific display attributes (price, area, rooms, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    /// Create a record whose key doubles as its title (headlines).
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            title: key.clone(),
            key,
            url: None,
            image_url: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Look up a display attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Collapse duplicate keys in one extraction result.
///
/// Each key keeps the position of its first occurrence and the payload of
/// its last one.
pub fn dedup_by_key(records: Vec<Record>) -> Vec<Record> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Record> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.key) {
            Some(&idx) => out[idx] = record,
            None => {
                positions.insert(record.key.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
