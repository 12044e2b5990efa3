//! Services for talking to the outside world.
//!
//! - `fetch`: Retrieve page markup over HTTP
//! - `extract`: Turn markup into records, one extractor per source family
//! - `notify`: Deliver new records to a webhook

pub mod extract;
pub mod fetch;
pub mod notify;

pub use extract::{Extractor, HeadlineExtractor, ListingExtractor, build_extractor};
pub use fetch::{Fetcher, HttpFetcher};
pub use notify::{DiscordNotifier, Notifier};
