// src/lib.rs

//! Listing Watch Library
//!
//! Polls listing pages, detects entries that were not there before and
//! announces them through a webhook.

pub mod error;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
