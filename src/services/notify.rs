// src/services/notify.rs

//! Webhook notifications in Discord embed format.
//!
//! Batch sources get one embed listing every new record; per-record sources
//! get one embed per record. Delivery counts as successful only when every
//! POST comes back with a 2xx status. A 429 is waited out and re-posted a
//! bounded number of times before it counts as a failure.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{NotifyConfig, NotifyMode, Record, SourceConfig};
use crate::utils::get_domain;
use crate::utils::http::create_webhook_client;

/// Discord rejects embed descriptions longer than this.
const DESCRIPTION_LIMIT: usize = 4096;

/// Wait used when a 429 carries no usable retry hint.
const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(1);
/// Longest rate-limit wait honored for a single re-post.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Delivers new records for a source.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, source: &SourceConfig, records: &[Record]) -> Result<()>;
}

/// Posts embeds to the source's Discord webhook.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    batch_color: u32,
    record_color: u32,
    rate_limit_retries: u32,
}

impl DiscordNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self> {
        Ok(Self {
            client: create_webhook_client(config)?,
            batch_color: config.batch_color,
            record_color: config.record_color,
            rate_limit_retries: config.rate_limit_retries,
        })
    }

    /// Payloads to send for `records`, in delivery order.
    pub fn payloads(&self, source: &SourceConfig, records: &[Record]) -> Vec<WebhookPayload> {
        let now = Utc::now();
        match source.notify_mode() {
            NotifyMode::Batch => vec![batch_payload(source, records, self.batch_color, now)],
            NotifyMode::PerRecord => records
                .iter()
                .map(|r| record_payload(r, self.record_color, now))
                .collect(),
        }
    }

    async fn post(&self, source: &SourceConfig, payload: &WebhookPayload) -> Result<()> {
        let mut retries = 0;
        loop {
            let response = self
                .client
                .post(&source.webhook_url)
                .json(payload)
                .send()
                .await
                .map_err(|e| AppError::notify(&source.name, e))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS && retries < self.rate_limit_retries {
                retries += 1;
                let wait = retry_after(response).await;
                log::warn!(
                    "[{}] Webhook rate limited, re-posting in {:.2}s ({}/{})",
                    source.name,
                    wait.as_secs_f64(),
                    retries,
                    self.rate_limit_retries
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notify(
                &source.name,
                format!("webhook returned {status}: {body}"),
            ));
        }
    }
}

/// Body Discord sends with a 429.
#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

/// How long a 429 asks us to wait: the JSON `retry_after`, else the
/// `Retry-After` header, in seconds.
async fn retry_after(response: Response) -> Duration {
    let header = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok());
    let body = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<RateLimited>(&text).ok())
        .map(|r| r.retry_after);

    body.or(header)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(DEFAULT_RETRY_WAIT)
        .min(MAX_RETRY_WAIT)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, source: &SourceConfig, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let payloads = self.payloads(source, records);
        let total = payloads.len();
        for (i, payload) in payloads.iter().enumerate() {
            self.post(source, payload).await.map_err(|e| {
                log::warn!("[{}] Webhook delivery {}/{} failed", source.name, i + 1, total);
                e
            })?;
        }
        log::debug!("[{}] {} webhook message(s) delivered", source.name, total);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

fn batch_payload(
    source: &SourceConfig,
    records: &[Record],
    color: u32,
    now: DateTime<Utc>,
) -> WebhookPayload {
    let lines: Vec<String> = records.iter().map(|r| format!("• {}", r.title)).collect();
    let host = get_domain(&source.url).unwrap_or_else(|| source.url.clone());

    WebhookPayload {
        embeds: vec![Embed {
            title: format!("🆕 New items from {}!", source.name),
            description: truncate(&lines.join("\n"), DESCRIPTION_LIMIT),
            color,
            timestamp: now,
            url: source.url.clone(),
            image: None,
            footer: Some(EmbedFooter {
                text: format!("Monitored from {host}"),
            }),
        }],
    }
}

fn record_payload(record: &Record, color: u32, now: DateTime<Utc>) -> WebhookPayload {
    let details: Vec<&str> = ["price", "rooms", "area"]
        .iter()
        .map(|name| record.attribute(name).unwrap_or_default())
        .collect();

    WebhookPayload {
        embeds: vec![Embed {
            title: format!("🆕 {}", record.title),
            description: truncate(&details.join(" | "), DESCRIPTION_LIMIT),
            color,
            timestamp: now,
            url: record.url.clone().unwrap_or_else(|| record.key.clone()),
            image: record
                .image_url
                .as_ref()
                .map(|url| EmbedImage { url: url.clone() }),
            footer: None,
        }],
    }
}

/// Cut to at most `limit` characters, marking the cut with an ellipsis.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::models::{ExtractorConfig, ListingSelectors};
    use crate::utils::http::tests::spawn_local;

    fn notifier() -> DiscordNotifier {
        DiscordNotifier::new(&NotifyConfig::default()).unwrap()
    }

    fn headline_source() -> SourceConfig {
        SourceConfig::headlines(
            "Tech News",
            "https://example-tech.com/latest",
            "https://discord.com/api/webhooks/1/tech",
        )
    }

    fn listing(id: u32) -> Record {
        let url = format!("https://www.willhaben.at/iad/object/{id}");
        let mut record = Record::from_key(url.clone());
        record.title = format!("Flat {id}");
        record.url = Some(url);
        record.image_url = Some(format!("https://cache.willhaben.at/{id}.jpg"));
        record.attributes.insert("price".into(), "€ 850".into());
        record.attributes.insert("rooms".into(), "2 Zimmer".into());
        record.attributes.insert("area".into(), "55 m²".into());
        record
    }

    #[test]
    fn test_batch_payload() {
        let records = vec![Record::from_key("First"), Record::from_key("Second")];
        let payloads = notifier().payloads(&headline_source(), &records);

        assert_eq!(payloads.len(), 1);
        let embed = &payloads[0].embeds[0];
        assert_eq!(embed.title, "🆕 New items from Tech News!");
        assert_eq!(embed.description, "• First\n• Second");
        assert_eq!(embed.url, "https://example-tech.com/latest");
        assert_eq!(embed.color, 0x00ff00);
        assert_eq!(
            embed.footer.as_ref().unwrap().text,
            "Monitored from example-tech.com"
        );
    }

    #[test]
    fn test_per_record_payloads() {
        let mut source = headline_source();
        source.extractor = ExtractorConfig::Listings(ListingSelectors::default());

        let payloads = notifier().payloads(&source, &[listing(1), listing(2)]);
        assert_eq!(payloads.len(), 2);

        let embed = &payloads[1].embeds[0];
        assert_eq!(embed.title, "🆕 Flat 2");
        assert_eq!(embed.description, "€ 850 | 2 Zimmer | 55 m²");
        assert_eq!(embed.url, "https://www.willhaben.at/iad/object/2");
        assert_eq!(
            embed.image.as_ref().unwrap().url,
            "https://cache.willhaben.at/2.jpg"
        );
    }

    #[test]
    fn test_per_record_keeps_empty_slots() {
        let mut record = listing(3);
        record.attributes.remove("rooms");

        let payload = record_payload(&record, 0xcc0000, Utc::now());
        assert_eq!(payload.embeds[0].description, "€ 850 |  | 55 m²");
    }

    #[test]
    fn test_payload_json_shape() {
        let payloads = notifier().payloads(&headline_source(), &[Record::from_key("Only")]);
        let json = serde_json::to_value(&payloads[0]).unwrap();

        let embed = &json["embeds"][0];
        assert!(embed["timestamp"].is_string());
        assert!(embed.get("image").is_none());
        assert_eq!(embed["description"], "• Only");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"é".repeat(20), 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }

    #[tokio::test]
    async fn test_notify_nothing_is_success() {
        // No records means no request at all, so the unroutable webhook is never hit.
        let mut source = headline_source();
        source.webhook_url = "http://127.0.0.1:9/never".into();
        assert!(notifier().notify(&source, &[]).await.is_ok());
    }

    /// Test webhook: accepts `limit` posts per window, then answers one 429
    /// and opens a new window.
    struct Webhook {
        limit: usize,
        fail_on: Option<usize>,
        window: AtomicUsize,
        posts: AtomicUsize,
        limited: AtomicUsize,
        delivered: Mutex<Vec<String>>,
    }

    impl Webhook {
        fn build(limit: usize, fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                limit,
                fail_on,
                window: AtomicUsize::new(0),
                posts: AtomicUsize::new(0),
                limited: AtomicUsize::new(0),
                delivered: Mutex::new(Vec::new()),
            })
        }

        fn new(limit: usize) -> Arc<Self> {
            Self::build(limit, None)
        }

        /// Answers 500 to the `n`th post (zero-based).
        fn failing_on(n: usize) -> Arc<Self> {
            Self::build(usize::MAX, Some(n))
        }

        fn posts(&self) -> usize {
            self.posts.load(Ordering::SeqCst)
        }
    }

    async fn receive(
        State(hook): State<Arc<Webhook>>,
        Json(body): Json<serde_json::Value>,
    ) -> axum::response::Response {
        let n = hook.posts.fetch_add(1, Ordering::SeqCst);
        if hook.fail_on == Some(n) {
            return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        if hook.window.load(Ordering::SeqCst) >= hook.limit {
            hook.window.store(0, Ordering::SeqCst);
            hook.limited.fetch_add(1, Ordering::SeqCst);
            let body = json!({
                "message": "You are being rate limited.",
                "retry_after": 0.01,
                "global": false
            });
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
        hook.window.fetch_add(1, Ordering::SeqCst);

        let url = body["embeds"][0]["url"].as_str().unwrap_or_default();
        hook.delivered.lock().unwrap().push(url.to_string());
        StatusCode::NO_CONTENT.into_response()
    }

    async fn serve_webhook(hook: Arc<Webhook>) -> String {
        let app = Router::new().route("/hook", post(receive)).with_state(hook);
        format!("{}/hook", spawn_local(app).await)
    }

    fn listing_source(webhook_url: String) -> SourceConfig {
        let mut source = SourceConfig::headlines(
            "Flats",
            "https://www.willhaben.at/iad/immobilien",
            webhook_url,
        );
        source.extractor = ExtractorConfig::Listings(ListingSelectors::default());
        source
    }

    #[tokio::test]
    async fn test_no_content_response_is_success() {
        let hook = Webhook::new(usize::MAX);
        let mut source = headline_source();
        source.webhook_url = serve_webhook(hook.clone()).await;

        let records = vec![Record::from_key("First"), Record::from_key("Second")];
        notifier().notify(&source, &records).await.unwrap();
        assert_eq!(hook.posts(), 1);
    }

    #[tokio::test]
    async fn test_server_error_fails_delivery() {
        let hook = Webhook::failing_on(0);
        let mut source = headline_source();
        source.webhook_url = serve_webhook(hook.clone()).await;

        let result = notifier().notify(&source, &[Record::from_key("First")]).await;
        match result {
            Err(AppError::Notify { source_name, message }) => {
                assert_eq!(source_name, "Tech News");
                assert!(message.contains("500"));
            }
            other => panic!("expected notify error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_per_record_stops_at_first_failure() {
        let hook = Webhook::failing_on(1);
        let source = listing_source(serve_webhook(hook.clone()).await);

        let result = notifier()
            .notify(&source, &[listing(1), listing(2), listing(3)])
            .await;
        assert!(matches!(result, Err(AppError::Notify { .. })));
        assert_eq!(hook.posts(), 2);
        assert_eq!(
            *hook.delivered.lock().unwrap(),
            vec!["https://www.willhaben.at/iad/object/1"]
        );
    }

    #[tokio::test]
    async fn test_rate_limited_burst_is_fully_delivered() {
        let hook = Webhook::new(5);
        let source = listing_source(serve_webhook(hook.clone()).await);
        let records: Vec<Record> = (1..=30).map(listing).collect();

        notifier().notify(&source, &records).await.unwrap();

        let expected: Vec<String> = records.iter().map(|r| r.key.clone()).collect();
        assert_eq!(*hook.delivered.lock().unwrap(), expected);
        assert_eq!(hook.limited.load(Ordering::SeqCst), 5);
        assert_eq!(hook.posts(), 35);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let hook = Webhook::new(0);
        let source = listing_source(serve_webhook(hook.clone()).await);
        let config = NotifyConfig {
            rate_limit_retries: 2,
            ..NotifyConfig::default()
        };

        let result = DiscordNotifier::new(&config)
            .unwrap()
            .notify(&source, &[listing(1)])
            .await;
        assert!(matches!(result, Err(AppError::Notify { .. })));
        assert_eq!(hook.posts(), 3);
    }

    fn rate_limited_response(retry_header: Option<&str>, body: &'static str) -> Response {
        let mut builder = axum::http::Response::builder().status(429);
        if let Some(value) = retry_header {
            builder = builder.header("retry-after", value);
        }
        Response::from(builder.body(body).unwrap())
    }

    #[tokio::test]
    async fn test_retry_after_sources() {
        let from_body = rate_limited_response(Some("3"), r#"{"retry_after": 0.5}"#);
        assert_eq!(retry_after(from_body).await, Duration::from_millis(500));

        let from_header = rate_limited_response(Some("2"), "");
        assert_eq!(retry_after(from_header).await, Duration::from_secs(2));

        let missing = rate_limited_response(None, "slow down");
        assert_eq!(retry_after(missing).await, DEFAULT_RETRY_WAIT);

        let huge = rate_limited_response(None, r#"{"retry_after": 86400}"#);
        assert_eq!(retry_after(huge).await, MAX_RETRY_WAIT);
    }
}
