use anyhow::Result;
use clap::Parser;
use proxy_sweep::pipeline::{self, PipelineConfig};
use proxy_sweep::proxy::checker::CheckerConfig;
use proxy_sweep::proxy::models::{Protocol, SourceDescriptor};
use proxy_sweep::proxy::output::OutputConfig;
use proxy_sweep::proxy::scraper::ScraperConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_HTTP_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v3/free-proxy-list/get?request=getproxies&protocol=http",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/refs/heads/master/http.txt",
];

const DEFAULT_SOCKS4_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v3/free-proxy-list/get?request=getproxies&protocol=socks4",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/refs/heads/master/socks4.txt",
];

const DEFAULT_SOCKS5_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v3/free-proxy-list/get?request=getproxies&protocol=socks5",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/refs/heads/master/socks5.txt",
];

/// A proxy scraper and checker with bounded-concurrency verification
#[derive(Parser)]
#[command(name = "proxy-sweep")]
#[command(about = "Scrape proxies from sources, verify them, save the working ones")]
struct Cli {
    /// HTTP proxy source (URL or local file, repeatable)
    #[arg(long)]
    http_source: Vec<String>,

    /// SOCKS4 proxy source (URL or local file, repeatable)
    #[arg(long)]
    socks4_source: Vec<String>,

    /// SOCKS5 proxy source (URL or local file, repeatable)
    #[arg(long)]
    socks5_source: Vec<String>,

    /// Maximum proxies to collect per source (0 = unlimited)
    #[arg(long, default_value_t = 100_000)]
    max_proxies_per_source: usize,

    /// Request timeout for fetching sources (seconds)
    #[arg(long, default_value_t = 60.0)]
    scraping_timeout: f64,

    /// URL for checking proxy functionality
    #[arg(long, default_value = "https://api.ipify.org")]
    check_url: String,

    /// Skip proxy checking (scrape only)
    #[arg(long)]
    no_check: bool,

    /// Number of concurrent proxy checks
    #[arg(long, default_value_t = 1024)]
    max_concurrent_checks: usize,

    /// Proxy response timeout (seconds)
    #[arg(long, default_value_t = 60.0)]
    checking_timeout: f64,

    /// Proxy connect timeout (seconds)
    #[arg(long, default_value_t = 5.0)]
    checking_connect_timeout: f64,

    /// Output directory
    #[arg(short, long, default_value = "./out")]
    output: PathBuf,

    /// Sort by (protocol, host, port) instead of response time
    #[arg(long)]
    sort_by_address: bool,

    /// Disable TXT output
    #[arg(long)]
    no_txt: bool,

    /// Disable JSON output
    #[arg(long)]
    no_json: bool,
}

impl Cli {
    fn sources(&self) -> Vec<SourceDescriptor> {
        // The built-in source lists apply only when no source of any
        // protocol was given on the command line.
        if self.http_source.is_empty()
            && self.socks4_source.is_empty()
            && self.socks5_source.is_empty()
        {
            return DEFAULT_HTTP_SOURCES
                .iter()
                .map(|url| SourceDescriptor::new(*url, Protocol::Http))
                .chain(
                    DEFAULT_SOCKS4_SOURCES
                        .iter()
                        .map(|url| SourceDescriptor::new(*url, Protocol::Socks4)),
                )
                .chain(
                    DEFAULT_SOCKS5_SOURCES
                        .iter()
                        .map(|url| SourceDescriptor::new(*url, Protocol::Socks5)),
                )
                .collect();
        }

        self.http_source
            .iter()
            .map(|url| SourceDescriptor::new(url.as_str(), Protocol::Http))
            .chain(
                self.socks4_source
                    .iter()
                    .map(|url| SourceDescriptor::new(url.as_str(), Protocol::Socks4)),
            )
            .chain(
                self.socks5_source
                    .iter()
                    .map(|url| SourceDescriptor::new(url.as_str(), Protocol::Socks5)),
            )
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let check_url = if cli.no_check || cli.check_url.is_empty() {
        None
    } else {
        Some(cli.check_url.clone())
    };

    let config = PipelineConfig {
        sources: cli.sources(),
        scraper: ScraperConfig::new()
            .with_timeout(Duration::from_secs_f64(cli.scraping_timeout))
            .with_max_per_source(cli.max_proxies_per_source),
        checker: CheckerConfig::new()
            .with_check_url(check_url)
            .with_concurrency(cli.max_concurrent_checks)
            .with_timeout(Duration::from_secs_f64(cli.checking_timeout))
            .with_connect_timeout(Duration::from_secs_f64(cli.checking_connect_timeout)),
        output: OutputConfig {
            path: cli.output,
            json_enabled: !cli.no_json,
            txt_enabled: !cli.no_txt,
        },
        sort_by_speed: !cli.sort_by_address,
    };

    let saved = pipeline::run(config).await?;
    info!("done: {} working proxies saved", saved.len());
    Ok(())
}
