//! Source scraping: fetching proxy lists and merging extracted endpoints
//!
//! Every configured source is fetched concurrently and mined through the
//! extractor; the scrape is best effort, so a source that fails to fetch
//! contributes nothing and never disturbs its siblings.

use crate::proxy::extractor;
use crate::proxy::models::{ProxyEndpoint, SourceDescriptor};
use crate::Result;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Default timeout for fetching one source
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default cap on matches accepted from one source (0 = unlimited)
const DEFAULT_MAX_PER_SOURCE: usize = 100_000;

/// Default user agent for source requests
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Error fetching a single source. Always recovered locally: the affected
/// source degrades to zero endpoints.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for the scraper
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Request timeout for fetching one source
    pub timeout: Duration,
    /// User agent for source requests
    pub user_agent: String,
    /// Cap on matches accepted per source, 0 = unlimited
    pub max_per_source: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_per_source: DEFAULT_MAX_PER_SOURCE,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_max_per_source(mut self, max_per_source: usize) -> Self {
        self.max_per_source = max_per_source;
        self
    }
}

/// Scraper that fetches all configured sources and merges their endpoints
/// into one deduplicated set.
pub struct Scraper {
    config: ScraperConfig,
    client: Client,
}

impl Scraper {
    /// Create a new scraper with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ScraperConfig::default())
    }

    /// Create a new scraper with custom configuration
    pub fn with_config(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { config, client })
    }

    /// Retrieve the raw text of one source.
    ///
    /// A `file://` location or a location without a scheme reads a local
    /// file; anything else is fetched with an HTTP GET that fails on
    /// non-2xx status.
    pub async fn fetch_source(&self, source: &SourceDescriptor) -> std::result::Result<String, FetchError> {
        let location = source.location.as_str();
        if let Some(path) = location.strip_prefix("file://") {
            Ok(tokio::fs::read_to_string(path).await?)
        } else if !location.contains("://") {
            Ok(tokio::fs::read_to_string(location).await?)
        } else {
            let response = self.client.get(location).send().await?.error_for_status()?;
            Ok(response.text().await?)
        }
    }

    /// Fetch every source concurrently and merge extracted endpoints into
    /// one deduplicated set. Best effort across all sources: individual
    /// fetch failures are logged and contribute nothing.
    pub async fn scrape_all(&self, sources: &[SourceDescriptor]) -> HashSet<ProxyEndpoint> {
        let merged = Arc::new(Mutex::new(HashSet::new()));

        let tasks = sources.iter().map(|source| {
            let merged = Arc::clone(&merged);
            async move {
                match self.fetch_source(source).await {
                    Ok(text) => {
                        let extraction =
                            extractor::extract(&text, source.fallback_protocol, self.config.max_per_source);
                        if extraction.truncated {
                            warn!(
                                "{}: too many proxies (> {}), rest of source skipped",
                                source.location, self.config.max_per_source
                            );
                        }
                        if extraction.endpoints.is_empty() {
                            warn!("{}: no proxies found", source.location);
                        } else {
                            info!(
                                "scraped {} proxies from {}",
                                extraction.endpoints.len(),
                                source.location
                            );
                        }
                        merged.lock().await.extend(extraction.endpoints);
                    }
                    Err(e) => warn!("failed to fetch {}: {}", source.location, e),
                }
            }
        });
        futures::future::join_all(tasks).await;

        let mut merged = merged.lock().await;
        std::mem::take(&mut *merged)
    }
}
