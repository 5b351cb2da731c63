//! Proxy module for scraping and checking proxies
//!
//! This module provides functionality for:
//! - Extracting proxy endpoints from free-form source text
//! - Scraping all configured sources concurrently into one deduplicated set
//! - Checking candidate validity under a hard concurrency bound
//! - Ordering, grouping, and persisting the working proxies

pub mod aggregate;
pub mod checker;
pub mod extractor;
pub mod models;
pub mod output;
pub mod scraper;

pub use checker::{CheckerConfig, ProxyChecker};
pub use extractor::{extract, Extraction};
pub use models::{Protocol, ProxyEndpoint, SourceDescriptor, VerifiedProxy};
pub use output::{OutputConfig, OutputWriter};
pub use scraper::{FetchError, Scraper, ScraperConfig};
