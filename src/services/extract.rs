// src/services/extract.rs

//! Record extraction from page markup.
//!
//! Each source family gets its own `Extractor`; the one in use is chosen by
//! the source's `ExtractorConfig`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ExtractorConfig, ListingSelectors, Record};
use crate::utils::resolve_url;

/// Pure transform from page markup to records, in page order.
pub trait Extractor: Send + Sync {
    fn extract(&self, markup: &str) -> Result<Vec<Record>>;
}

/// Build the extractor a source is configured for.
pub fn build_extractor(config: &ExtractorConfig) -> Result<Box<dyn Extractor>> {
    Ok(match config {
        ExtractorConfig::Headlines { selector } => Box::new(HeadlineExtractor::new(selector)?),
        ExtractorConfig::Listings(selectors) => Box::new(ListingExtractor::new(selectors)?),
    })
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text content with whitespace runs collapsed, as rendered.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Headlines: the trimmed text of every matching element, keyed by that text.
pub struct HeadlineExtractor {
    selector: Selector,
}

impl HeadlineExtractor {
    pub fn new(selector: &str) -> Result<Self> {
        Ok(Self {
            selector: parse_selector(selector)?,
        })
    }
}

impl Extractor for HeadlineExtractor {
    fn extract(&self, markup: &str) -> Result<Vec<Record>> {
        let document = Html::parse_document(markup);
        Ok(document
            .select(&self.selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
            .map(Record::from_key)
            .collect())
    }
}

/// Listing cards on a classifieds search page, keyed by absolute URL.
pub struct ListingExtractor {
    base_url: Url,
    entry_selector: String,
    entry: Selector,
    title: Selector,
    price: Selector,
    attributes: Selector,
    image: Selector,
}

impl ListingExtractor {
    pub fn new(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&selectors.base_url)?,
            entry_selector: selectors.entry_selector.clone(),
            entry: parse_selector(&selectors.entry_selector)?,
            title: parse_selector(&selectors.title_selector)?,
            price: parse_selector(&selectors.price_selector)?,
            attributes: parse_selector(&selectors.attributes_selector)?,
            image: parse_selector(&selectors.image_selector)?,
        })
    }

    fn parse_entry(&self, entry: ElementRef<'_>) -> Option<Record> {
        let href = entry.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        let url = resolve_url(&self.base_url, href);

        let title = entry
            .select(&self.title)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "(No title)".to_string());
        let price = entry
            .select(&self.price)
            .next()
            .map(|el| element_text(&el))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "No price found".to_string());

        let teaser: Vec<String> = entry
            .select(&self.attributes)
            .map(|el| element_text(&el))
            .collect();

        let image_url = entry
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| resolve_url(&self.base_url, src));

        let mut record = Record::from_key(url.clone());
        record.title = title;
        record.url = Some(url);
        record.image_url = image_url;
        record.attributes.insert("price".into(), price);
        record
            .attributes
            .insert("area".into(), teaser.get(1).cloned().unwrap_or_default());
        record
            .attributes
            .insert("rooms".into(), teaser.get(2).cloned().unwrap_or_default());
        Some(record)
    }
}

impl Extractor for ListingExtractor {
    fn extract(&self, markup: &str) -> Result<Vec<Record>> {
        let document = Html::parse_document(markup);
        let entries: Vec<ElementRef<'_>> = document.select(&self.entry).collect();

        let records: Vec<Record> = entries
            .iter()
            .filter_map(|entry| self.parse_entry(*entry))
            .collect();

        if records.is_empty() && !entries.is_empty() {
            return Err(AppError::extract(
                &self.entry_selector,
                format!("{} listing entries found but none had a link", entries.len()),
            ));
        }
        Ok(records)
    }
}
