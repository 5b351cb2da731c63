//! The scrape → check → aggregate → save pipeline
//!
//! Individual source or candidate failures never surface here; the only
//! terminal failures are whole-phase exhaustion (nothing scraped, or
//! nothing working). There is no checkpointing: a rerun starts from
//! scratch.

use crate::proxy::aggregate;
use crate::proxy::checker::{CheckerConfig, ProxyChecker};
use crate::proxy::models::{SourceDescriptor, VerifiedProxy};
use crate::proxy::output::{OutputConfig, OutputWriter};
use crate::proxy::scraper::{Scraper, ScraperConfig};
use tracing::info;

/// Terminal pipeline failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no proxies scraped from any source")]
    NoCandidates,
    #[error("no working proxies found")]
    NoWorkingProxies,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sources: Vec<SourceDescriptor>,
    pub scraper: ScraperConfig,
    pub checker: CheckerConfig,
    pub output: OutputConfig,
    /// Sort the final list by measured latency instead of by address
    pub sort_by_speed: bool,
}

/// Run the whole pipeline and return the ordered working-proxy list.
pub async fn run(config: PipelineConfig) -> Result<Vec<VerifiedProxy>, PipelineError> {
    let scraper = Scraper::with_config(config.scraper)?;
    let scraped = scraper.scrape_all(&config.sources).await;
    if scraped.is_empty() {
        return Err(PipelineError::NoCandidates);
    }
    info!("total unique proxies scraped: {}", scraped.len());

    // The scraped set is frozen here; the checker works on its own copies.
    let candidates: Vec<_> = scraped.into_iter().collect();
    let checker = ProxyChecker::with_config(config.checker);
    let verified = checker.check_all(candidates).await;
    if verified.is_empty() {
        return Err(PipelineError::NoWorkingProxies);
    }

    let ordered = aggregate::aggregate(verified, config.sort_by_speed);
    OutputWriter::new(config.output).save(&ordered)?;
    Ok(ordered)
}
