//! Proxy Sweep - Proxy Scraper and Checker
//!
//! Scrapes candidate proxies (HTTP, SOCKS4, SOCKS5) from remote and local
//! sources, verifies them with real requests under a bounded concurrency
//! cap, and saves the working proxies in JSON and TXT formats.

pub mod pipeline;
pub mod proxy;

pub use pipeline::{PipelineConfig, PipelineError};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
