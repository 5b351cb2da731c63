//! Proxy verification with bounded concurrency
//!
//! Each candidate is exercised with a real GET to the check URL routed
//! through the candidate as a proxy. Admission is controlled by a counting
//! semaphore: at most `concurrency` checks are in flight at any instant,
//! regardless of how many candidates there are. Failed candidates are
//! dropped silently; only the aggregate checked/working counts are
//! reported.

use crate::proxy::models::{ProxyEndpoint, VerifiedProxy};
use crate::Result;
use futures::Future;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::info;

/// Default total timeout for one proxy check
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default connect-phase timeout for one proxy check
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent checks
const DEFAULT_CONCURRENCY: usize = 1024;

/// Default user agent for check requests
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Progress is logged every this many completions, and always on the last.
const PROGRESS_EVERY: usize = 100;

/// A bare IPv4 literal, optionally with a trailing port, surrounded only
/// by whitespace. Used to reduce check responses to the host portion.
static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<host>(?:[0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])",
        r"(?:\.(?:[0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])){3})",
        r"(?::(?:[0-9]|[1-9][0-9]{1,3}|[1-5][0-9]{4}|6[0-4][0-9]{3}|65[0-4][0-9]{2}|655[0-2][0-9]|6553[0-5]))?\s*$",
    ))
    .expect("invalid ipv4 regex")
});

/// Configuration for the proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// URL to test proxies against; `None` or empty disables checking.
    pub check_url: Option<String>,
    /// Hard bound on concurrent checks
    pub concurrency: usize,
    /// Total timeout for each check
    pub timeout: Duration,
    /// Connect-phase timeout for each check
    pub connect_timeout: Duration,
    /// User agent for check requests
    pub user_agent: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            check_url: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_url(mut self, url: Option<String>) -> Self {
        self.check_url = url;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Proxy checker for verifying candidate endpoints
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self {
            config: CheckerConfig::default(),
        }
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Verify every candidate under the configured concurrency bound.
    ///
    /// With no check URL configured this degrades to the identity: every
    /// candidate is wrapped unchanged, with no latency or exit IP, and the
    /// skip is logged. Otherwise failed candidates are dropped and the
    /// surviving proxies are returned; an empty result is a valid outcome
    /// the caller must handle.
    pub async fn check_all(&self, candidates: Vec<ProxyEndpoint>) -> Vec<VerifiedProxy> {
        let Some(check_url) = self.config.check_url.clone().filter(|u| !u.is_empty()) else {
            info!(
                "proxy checking disabled, keeping all {} candidates unverified",
                candidates.len()
            );
            return candidates.into_iter().map(VerifiedProxy::unchecked).collect();
        };

        let total = candidates.len();
        info!("checking {} proxies against {}", total, check_url);

        let working = Arc::new(Mutex::new(Vec::new()));
        let checked = Arc::new(AtomicUsize::new(0));
        let checker = self.clone();
        let check_url = Arc::new(check_url);

        run_bounded(candidates, self.config.concurrency, {
            let working = Arc::clone(&working);
            let checked = Arc::clone(&checked);
            move |candidate| {
                let working = Arc::clone(&working);
                let checked = Arc::clone(&checked);
                let checker = checker.clone();
                let check_url = Arc::clone(&check_url);
                async move {
                    let result = checker.check_one(&candidate, &check_url).await;
                    let working_now = {
                        let mut working = working.lock().await;
                        if let Some((latency, exit_ip)) = result {
                            working.push(VerifiedProxy::checked(candidate, latency, exit_ip));
                        }
                        working.len()
                    };
                    let done = checked.fetch_add(1, Ordering::SeqCst) + 1;
                    if done % PROGRESS_EVERY == 0 || done == total {
                        info!("checked {}/{} proxies, found {} working", done, total, working_now);
                    }
                }
            }
        })
        .await;

        let mut working = working.lock().await;
        let working = std::mem::take(&mut *working);
        info!("checking complete: {}/{} proxies are working", working.len(), total);
        working
    }

    /// Check one candidate: route a GET through it and, on success, return
    /// the measured latency (seconds, two decimals) and the exit address.
    /// Any failure collapses to `None`.
    async fn check_one(&self, candidate: &ProxyEndpoint, check_url: &str) -> Option<(f64, Option<String>)> {
        let client = self.build_client(candidate).ok()?;
        let start = Instant::now();
        let response = client.get(check_url).send().await.ok()?;
        let response = response.error_for_status().ok()?;
        let elapsed = start.elapsed().as_secs_f64();
        let body = response.text().await.ok()?;
        Some(((elapsed * 100.0).round() / 100.0, parse_exit_ip(&body)))
    }

    /// Create a reqwest client routed through the candidate.
    ///
    /// Every target scheme goes through the proxy: an HTTP proxy carries
    /// https targets via CONNECT, so the check URL's scheme must never
    /// decide whether the candidate is actually exercised.
    fn build_client(&self, candidate: &ProxyEndpoint) -> Result<Client> {
        let proxy_url = candidate.to_url(true);
        let proxy = ReqwestProxy::all(&proxy_url)?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(&self.config.user_agent)
            .build()?;

        Ok(client)
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the exit address out of a check response body: a JSON object's
/// `origin` or `ip` field when present, otherwise the trimmed raw text,
/// reduced to the host portion when it is a bare IPv4 literal.
fn parse_exit_ip(body: &str) -> Option<String> {
    let text = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(object)) => object
            .get("origin")
            .or_else(|| object.get("ip"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => body.trim().to_string(),
    };

    if let Some(caps) = IPV4_REGEX.captures(&text) {
        return Some(caps["host"].to_string());
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Run one task per item with at most `limit` executing at any instant.
///
/// The semaphore is the sole admission-control mechanism: tasks are spawned
/// eagerly but each waits for a permit before doing any work, and all are
/// awaited regardless of individual panics or failures.
async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, f: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit));
    let tasks: Vec<_> = items
        .into_iter()
        .map(|item| {
            let semaphore = Arc::clone(&semaphore);
            let f = f.clone();
            tokio::spawn(async move {
                // Acquire only fails if the semaphore is closed, which
                // cannot happen while this task holds an Arc to it.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore closed unexpectedly");
                f(item).await;
            })
        })
        .collect();
    futures::future::join_all(tasks).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::Protocol;

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert!(config.check_url.is_none());
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(
            config.connect_timeout,
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_check_url(Some("https://api.ipify.org".to_string()))
            .with_concurrency(32)
            .with_timeout(Duration::from_secs(30))
            .with_connect_timeout(Duration::from_secs(3));

        assert_eq!(config.check_url.as_deref(), Some("https://api.ipify.org"));
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_disabled_check_is_identity() {
        let candidates = vec![
            ProxyEndpoint::new(Protocol::Http, "1.2.3.4".to_string(), 8080),
            ProxyEndpoint::new(Protocol::Socks4, "5.6.7.8".to_string(), 1080),
            ProxyEndpoint::new(Protocol::Socks5, "9.9.9.9".to_string(), 9050),
        ];

        let checker = ProxyChecker::new();
        let verified = checker.check_all(candidates.clone()).await;

        assert_eq!(verified.len(), candidates.len());
        for (result, candidate) in verified.iter().zip(&candidates) {
            assert_eq!(&result.endpoint, candidate);
            assert!(result.latency.is_none());
            assert!(result.exit_ip.is_none());
        }
    }

    #[tokio::test]
    async fn test_empty_check_url_also_disables() {
        let checker =
            ProxyChecker::with_config(CheckerConfig::new().with_check_url(Some(String::new())));
        let candidates = vec![ProxyEndpoint::new(Protocol::Http, "1.2.3.4".to_string(), 80)];
        let verified = checker.check_all(candidates).await;
        assert_eq!(verified.len(), 1);
        assert!(verified[0].latency.is_none());
    }

    #[tokio::test]
    async fn test_run_bounded_never_exceeds_limit() {
        const LIMIT: usize = 8;
        const ITEMS: usize = 50;

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        run_bounded((0..ITEMS).collect::<Vec<_>>(), LIMIT, {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let completed = Arc::clone(&completed);
            move |_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let completed = Arc::clone(&completed);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .await;

        assert_eq!(completed.load(Ordering::SeqCst), ITEMS);
        assert!(peak.load(Ordering::SeqCst) <= LIMIT);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_exit_ip_json_origin() {
        assert_eq!(
            parse_exit_ip(r#"{"origin": "1.2.3.4"}"#),
            Some("1.2.3.4".to_string())
        );
        assert_eq!(
            parse_exit_ip(r#"{"ip": "5.6.7.8"}"#),
            Some("5.6.7.8".to_string())
        );
        // origin wins when both are present
        assert_eq!(
            parse_exit_ip(r#"{"origin": "1.2.3.4", "ip": "5.6.7.8"}"#),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn test_parse_exit_ip_plain_text() {
        assert_eq!(parse_exit_ip("  1.2.3.4\n"), Some("1.2.3.4".to_string()));
        assert_eq!(parse_exit_ip("1.2.3.4:8080"), Some("1.2.3.4".to_string()));
        // non-IPv4-shaped text passes through trimmed
        assert_eq!(
            parse_exit_ip("your address is hidden"),
            Some("your address is hidden".to_string())
        );
    }

    #[test]
    fn test_parse_exit_ip_empty() {
        assert_eq!(parse_exit_ip(""), None);
        assert_eq!(parse_exit_ip(r#"{"unrelated": true}"#), None);
    }
}
