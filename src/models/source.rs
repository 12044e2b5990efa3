// src/models/source.rs

//! Monitored source definitions.

use serde::{Deserialize, Serialize};

use crate::utils::slugify;

/// Static description of one monitored source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Display name (also used for the default storage file name)
    pub name: String,

    /// Page to poll
    pub url: String,

    /// Webhook receiving notifications for this source
    pub webhook_url: String,

    /// Storage file name override, relative to the storage directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_file: Option<String>,

    /// How records are pulled out of the page
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Batch all new records in one message, or send one per record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_mode: Option<NotifyMode>,
}

impl SourceConfig {
    /// Create a headline source with default settings.
    pub fn headlines(
        name: impl Into<String>,
        url: impl Into<String>,
        webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            webhook_url: webhook_url.into(),
            storage_file: None,
            extractor: ExtractorConfig::default(),
            notify_mode: None,
        }
    }

    /// File name of this source's snapshot.
    pub fn storage_file_name(&self) -> String {
        match &self.storage_file {
            Some(file) => file.clone(),
            None => format!("{}-{}.json", slugify(&self.name), self.extractor.family()),
        }
    }

    /// Effective notification mode.
    pub fn notify_mode(&self) -> NotifyMode {
        self.notify_mode
            .unwrap_or_else(|| self.extractor.default_notify_mode())
    }
}

/// Extractor selection and its selectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorConfig {
    /// Text of every element matching `selector`
    Headlines {
        #[serde(default = "defaults::headline_selector")]
        selector: String,
    },
    /// Structured listing cards
    Listings(ListingSelectors),
}

impl ExtractorConfig {
    /// Short name of the extractor family.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Headlines { .. } => "headlines",
            Self::Listings(_) => "listings",
        }
    }

    pub fn default_notify_mode(&self) -> NotifyMode {
        match self {
            Self::Headlines { .. } => NotifyMode::Batch,
            Self::Listings(_) => NotifyMode::PerRecord,
        }
    }

    /// All CSS selectors, for validation.
    pub fn selectors(&self) -> Vec<&str> {
        match self {
            Self::Headlines { selector } => vec![selector.as_str()],
            Self::Listings(s) => vec![
                s.entry_selector.as_str(),
                s.title_selector.as_str(),
                s.price_selector.as_str(),
                s.attributes_selector.as_str(),
                s.image_selector.as_str(),
            ],
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::Headlines {
            selector: defaults::headline_selector(),
        }
    }
}

/// CSS selectors for scraping a listing search page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingSelectors {
    /// Base URL relative links are resolved against
    #[serde(default = "defaults::listing_base_url")]
    pub base_url: String,

    /// Selector for each listing's link element
    #[serde(default = "defaults::entry_selector")]
    pub entry_selector: String,

    /// Selector for the title within an entry
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Selector for the price within an entry
    #[serde(default = "defaults::price_selector")]
    pub price_selector: String,

    /// Selector for the teaser attributes (area, rooms) within an entry
    #[serde(default = "defaults::attributes_selector")]
    pub attributes_selector: String,

    /// Selector for the preview image within an entry
    #[serde(default = "defaults::image_selector")]
    pub image_selector: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            base_url: defaults::listing_base_url(),
            entry_selector: defaults::entry_selector(),
            title_selector: defaults::title_selector(),
            price_selector: defaults::price_selector(),
            attributes_selector: defaults::attributes_selector(),
            image_selector: defaults::image_selector(),
        }
    }
}

/// Notification granularity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// One message listing every new record
    Batch,
    /// One message per new record
    PerRecord,
}

mod defaults {
    pub fn headline_selector() -> String {
        "h3".into()
    }
    pub fn listing_base_url() -> String {
        "https://www.willhaben.at".into()
    }
    pub fn entry_selector() -> String {
        "a[id*=search-result-entry-header]".into()
    }
    pub fn title_selector() -> String {
        "h3".into()
    }
    pub fn price_selector() -> String {
        "[data-testid*=search-result-entry-price]".into()
    }
    pub fn attributes_selector() -> String {
        "[data-testid*=search-result-entry-teaser-attributes]".into()
    }
    pub fn image_selector() -> String {
        "img".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_storage_file_name() {
        let source = SourceConfig::headlines(
            "Tech  News",
            "https://example.com",
            "https://discord.com/api/webhooks/1/x",
        );
        assert_eq!(source.storage_file_name(), "tech-news-headlines.json");
    }

    #[test]
    fn test_storage_file_override() {
        let mut source = SourceConfig::headlines("Business", "https://a.b", "https://c.d");
        source.storage_file = Some("custom-business-headlines.json".into());
        assert_eq!(source.storage_file_name(), "custom-business-headlines.json");
    }

    #[test]
    fn test_notify_mode_follows_extractor() {
        let mut source = SourceConfig::headlines("Flats", "https://a.b", "https://c.d");
        assert_eq!(source.notify_mode(), NotifyMode::Batch);

        source.extractor = ExtractorConfig::Listings(ListingSelectors::default());
        assert_eq!(source.notify_mode(), NotifyMode::PerRecord);

        source.notify_mode = Some(NotifyMode::Batch);
        assert_eq!(source.notify_mode(), NotifyMode::Batch);
    }

    #[test]
    fn test_parse_listing_source() {
        let source: SourceConfig = toml::from_str(
            r#"
            name = "Primary"
            url = "https://www.willhaben.at/iad/immobilien/mietwohnungen/mietwohnung-angebote"
            webhook_url = "https://discord.com/api/webhooks/1/x"
            extractor = { kind = "listings" }
            "#,
        )
        .unwrap();

        assert_eq!(
            source.extractor,
            ExtractorConfig::Listings(ListingSelectors::default())
        );
        assert_eq!(source.storage_file_name(), "primary-listings.json");
    }
}
