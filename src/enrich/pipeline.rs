//! The enrichment state machine.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::fetch::{Fetcher, HttpFetcher};
use super::limits::{HostLimiter, NegativeCache};
use super::resolve::resolve_image;
use super::search::{search_query, ImageSearch, NoImageSearch};
use super::EnrichError;
use crate::config::EnrichmentConfig;

/// Input for one enrichment attempt. Built per record write, never stored.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentRequest {
    pub full_name: String,
    pub website: Option<String>,
    pub locality: String,
}

impl EnrichmentRequest {
    pub fn new(full_name: &str, website: Option<&str>, locality: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            website: website.map(str::to_string),
            locality: locality.to_string(),
        }
    }

    fn website(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }
}

/// Pipeline states. `Found` and `NotFound` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    TryWebsite,
    TrySearch,
    Found,
    NotFound,
}

/// Which strategy produced the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Website,
    Search,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub image: Option<String>,
    pub found_by: Option<Strategy>,
    /// States visited, in order, ending with a terminal state.
    pub trail: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub timeout: Duration,
    pub max_concurrent_per_host: usize,
    pub max_concurrent_total: usize,
    pub negative_cache_ttl: Duration,
}

impl From<&EnrichmentConfig> for PipelineOptions {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_concurrent_per_host: config.max_concurrent_per_host,
            max_concurrent_total: config.max_concurrent_total,
            negative_cache_ttl: Duration::from_secs(config.negative_cache_ttl_secs),
        }
    }
}

/// Best-effort profile image discovery.
///
/// Shared between request handlers behind an `Arc`; the only state it
/// carries across calls is the per-host limiter and the negative cache.
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    search: Arc<dyn ImageSearch>,
    options: PipelineOptions,
    hosts: HostLimiter,
    misses: NegativeCache,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        fetcher: Arc<dyn Fetcher>,
        search: Arc<dyn ImageSearch>,
    ) -> Self {
        Self {
            fetcher,
            search,
            hosts: HostLimiter::new(options.max_concurrent_per_host),
            misses: NegativeCache::new(options.negative_cache_ttl),
            options,
        }
    }

    /// HTTP fetcher plus the stub search provider.
    pub fn from_config(config: &EnrichmentConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            PipelineOptions::from(config),
            Arc::new(HttpFetcher::new(config)?),
            Arc::new(NoImageSearch),
        ))
    }

    /// Returns an absolute image URL for the agent, or `None`.
    pub async fn enrich(&self, full_name: &str, website: Option<&str>, locality: &str) -> Option<String> {
        self.run(&EnrichmentRequest::new(full_name, website, locality))
            .await
            .image
    }

    pub async fn run(&self, request: &EnrichmentRequest) -> Resolution {
        let mut stage = Stage::Start;
        let mut trail = Vec::with_capacity(4);
        let mut image = None;
        let mut found_by = None;

        loop {
            trail.push(stage);
            stage = match stage {
                Stage::Start => match request.website() {
                    Some(website) if self.misses.contains(website, &request.full_name) => {
                        tracing::debug!(website, "recent miss cached, skipping website fetch");
                        Stage::TrySearch
                    }
                    Some(_) => Stage::TryWebsite,
                    None => Stage::TrySearch,
                },
                Stage::TryWebsite => {
                    let website = request.website().unwrap_or_default();
                    match self.try_website(website, &request.full_name).await {
                        Ok(url) => {
                            image = Some(url);
                            found_by = Some(Strategy::Website);
                            Stage::Found
                        }
                        Err(err) => {
                            tracing::info!(website, error = %err, "website strategy found no image");
                            self.misses.remember(website, &request.full_name);
                            Stage::TrySearch
                        }
                    }
                }
                Stage::TrySearch => {
                    let query = search_query(&request.full_name, &request.locality);
                    match self
                        .search
                        .find_image(&query)
                        .await
                        .filter(|url| !url.trim().is_empty())
                    {
                        Some(url) => {
                            image = Some(url);
                            found_by = Some(Strategy::Search);
                            Stage::Found
                        }
                        None => {
                            tracing::debug!(
                                provider = self.search.name(),
                                query = %query,
                                "search strategy found no image"
                            );
                            Stage::NotFound
                        }
                    }
                }
                Stage::Found | Stage::NotFound => break,
            };
        }

        tracing::debug!(full_name = %request.full_name, ?trail, found = image.is_some(), "enrichment finished");
        Resolution {
            image,
            found_by,
            trail,
        }
    }

    async fn try_website(&self, website: &str, full_name: &str) -> Result<String, EnrichError> {
        let _permit = self.hosts.acquire(website).await;

        // The fetcher is asked to honour the timeout too; this bounds
        // fetchers that ignore it.
        let page = tokio::time::timeout(
            self.options.timeout,
            self.fetcher.fetch(website, self.options.timeout),
        )
        .await
        .map_err(|_| EnrichError::Fetch {
            url: website.to_string(),
            reason: format!("timed out after {}s", self.options.timeout.as_secs_f64()),
        })??;

        if !(200..300).contains(&page.status) {
            return Err(EnrichError::Fetch {
                url: website.to_string(),
                reason: format!("HTTP {}", page.status),
            });
        }

        resolve_image(&page.body, full_name, website)
    }

    /// Runs many requests on a bounded pool. Output order matches input.
    pub async fn enrich_batch(self: &Arc<Self>, requests: Vec<EnrichmentRequest>) -> Vec<Option<String>> {
        let limit = Arc::new(Semaphore::new(self.options.max_concurrent_total.max(1)));
        let mut results = vec![None; requests.len()];
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let pipeline = Arc::clone(self);
            let limit = Arc::clone(&limit);
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                (index, pipeline.run(&request).await.image)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, image)) => results[index] = image,
                Err(e) => tracing::warn!(error = %e, "enrichment task aborted"),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::fetch::FetchedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"<html><body>
        <img alt="Brokerage logo" src="/logo.png">
        <img alt="Jane Smith - Top Agent" src="/photos/jane.jpg">
        <img alt="Jane Smith closing day" src="/photos/jane-2.jpg">
    </body></html>"#;

    enum Reply {
        Page(u16, &'static str),
        Fail,
        Hang,
    }

    struct FakeFetcher {
        reply: Reply,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl FakeFetcher {
        fn new(reply: Reply) -> Arc<Self> {
            Self::with_delay(reply, Duration::ZERO)
        }

        fn with_delay(reply: Reply, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.reply {
                Reply::Page(status, body) => Ok(FetchedPage {
                    body: body.as_bytes().to_vec(),
                    status,
                }),
                Reply::Fail => Err(EnrichError::Fetch {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(EnrichError::Fetch {
                        url: url.to_string(),
                        reason: "unreachable".to_string(),
                    })
                }
            }
        }
    }

    struct FixedSearch(Option<&'static str>, AtomicUsize);

    #[async_trait]
    impl ImageSearch for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn find_image(&self, _query: &str) -> Option<String> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.map(str::to_string)
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            timeout: Duration::from_millis(200),
            max_concurrent_per_host: 2,
            max_concurrent_total: 8,
            negative_cache_ttl: Duration::ZERO,
        }
    }

    fn pipeline(fetcher: Arc<FakeFetcher>, opts: PipelineOptions) -> Pipeline {
        Pipeline::new(opts, fetcher, Arc::new(NoImageSearch))
    }

    #[tokio::test]
    async fn test_found_on_website() {
        let fetcher = FakeFetcher::new(Reply::Page(200, PAGE));
        let p = pipeline(fetcher.clone(), options());

        let res = p
            .run(&EnrichmentRequest::new("Jane Smith", Some("https://example.com/agents"), "Brooklyn"))
            .await;

        assert_eq!(res.image.as_deref(), Some("https://example.com/photos/jane.jpg"));
        assert_eq!(res.found_by, Some(Strategy::Website));
        assert_eq!(res.trail, vec![Stage::Start, Stage::TryWebsite, Stage::Found]);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_website_skips_fetch() {
        let fetcher = FakeFetcher::new(Reply::Page(200, PAGE));
        let p = pipeline(fetcher.clone(), options());

        for website in [None, Some(""), Some("   ")] {
            let res = p
                .run(&EnrichmentRequest::new("Jane Smith", website, "Queens"))
                .await;
            assert_eq!(res.image, None);
            assert_eq!(res.trail, vec![Stage::Start, Stage::TrySearch, Stage::NotFound]);
        }
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_http_errors_degrade_to_none() {
        for status in [404, 500] {
            let fetcher = FakeFetcher::new(Reply::Page(status, PAGE));
            let p = pipeline(fetcher, options());
            let res = p
                .run(&EnrichmentRequest::new("Jane Smith", Some("https://example.com"), ""))
                .await;
            assert_eq!(res.image, None, "status {}", status);
            assert_eq!(
                res.trail,
                vec![Stage::Start, Stage::TryWebsite, Stage::TrySearch, Stage::NotFound]
            );
        }
    }

    #[tokio::test]
    async fn test_network_failure_degrades_to_none() {
        let p = pipeline(FakeFetcher::new(Reply::Fail), options());
        assert_eq!(p.enrich("Jane Smith", Some("https://down.example"), "").await, None);
    }

    #[tokio::test]
    async fn test_timeout_bounded_even_if_fetcher_ignores_it() {
        let p = pipeline(FakeFetcher::new(Reply::Hang), options());
        let started = std::time::Instant::now();
        let res = p.enrich("Jane Smith", Some("https://slow.example"), "").await;
        assert_eq!(res, None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_search_fallback_used_after_website_miss() {
        let search = Arc::new(FixedSearch(Some("https://img.example/jane.jpg"), AtomicUsize::new(0)));
        let p = Pipeline::new(
            options(),
            FakeFetcher::new(Reply::Page(200, "<img alt='office' src='/o.jpg'>")),
            search.clone(),
        );
        let res = p
            .run(&EnrichmentRequest::new("Jane Smith", Some("https://example.com"), "Bronx"))
            .await;
        assert_eq!(res.image.as_deref(), Some("https://img.example/jane.jpg"));
        assert_eq!(res.found_by, Some(Strategy::Search));
        assert_eq!(search.1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_search_result_is_not_found() {
        let p = Pipeline::new(
            options(),
            FakeFetcher::new(Reply::Fail),
            Arc::new(FixedSearch(Some("  "), AtomicUsize::new(0))),
        );
        let res = p
            .run(&EnrichmentRequest::new("Jane", Some("https://x.example"), ""))
            .await;
        assert_eq!(res.image, None);
        assert_eq!(res.trail.last(), Some(&Stage::NotFound));
    }

    #[tokio::test]
    async fn test_repeat_runs_are_identical() {
        let p = pipeline(FakeFetcher::new(Reply::Page(200, PAGE)), options());
        let req = EnrichmentRequest::new("Jane Smith", Some("https://example.com/agents"), "");
        let first = p.run(&req).await;
        let second = p.run(&req).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_negative_cache_skips_refetch() {
        let fetcher = FakeFetcher::new(Reply::Page(200, "<p>no images</p>"));
        let mut opts = options();
        opts.negative_cache_ttl = Duration::from_millis(100);
        let p = pipeline(fetcher.clone(), opts);
        let req = EnrichmentRequest::new("Jane Smith", Some("https://example.com"), "");

        assert_eq!(p.run(&req).await.image, None);
        let cached = p.run(&req).await;
        assert_eq!(cached.trail, vec![Stage::Start, Stage::TrySearch, Stage::NotFound]);
        assert_eq!(fetcher.calls(), 1);

        // A different name on the same site is not covered by the miss.
        p.enrich("John Doe", Some("https://example.com"), "").await;
        assert_eq!(fetcher.calls(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        p.run(&req).await;
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_hits_are_never_cached() {
        let fetcher = FakeFetcher::new(Reply::Page(200, PAGE));
        let mut opts = options();
        opts.negative_cache_ttl = Duration::from_secs(60);
        let p = pipeline(fetcher.clone(), opts);
        p.enrich("Jane Smith", Some("https://example.com"), "").await;
        p.enrich("Jane Smith", Some("https://example.com"), "").await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_respects_per_host_cap_and_order() {
        let fetcher = FakeFetcher::with_delay(Reply::Page(200, PAGE), Duration::from_millis(40));
        let mut opts = options();
        opts.max_concurrent_per_host = 2;
        opts.timeout = Duration::from_secs(5);
        let p = Arc::new(pipeline(fetcher.clone(), opts));

        let mut requests: Vec<EnrichmentRequest> = (0..6)
            .map(|_| EnrichmentRequest::new("Jane Smith", Some("https://example.com/agents"), ""))
            .collect();
        requests.insert(3, EnrichmentRequest::new("Nobody Here", None, ""));

        let results = p.enrich_batch(requests).await;
        assert_eq!(results.len(), 7);
        assert_eq!(results[3], None);
        for (i, r) in results.iter().enumerate().filter(|(i, _)| *i != 3) {
            assert_eq!(
                r.as_deref(),
                Some("https://example.com/photos/jane.jpg"),
                "index {}",
                i
            );
        }
        assert_eq!(fetcher.calls(), 6);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }
}
