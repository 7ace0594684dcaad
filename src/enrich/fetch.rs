//! Page retrieval for the website strategy.

use async_trait::async_trait;
use std::time::Duration;

use super::EnrichError;
use crate::config::EnrichmentConfig;

/// Raw page content and the status it was served with.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    pub status: u16,
}

/// Retrieves a remote page.
///
/// Implementations perform exactly one outbound request per call and never
/// retry. Any non-2xx status must be reported as [`EnrichError::Fetch`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, EnrichError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &EnrichmentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, EnrichError> {
        if url.trim().is_empty() {
            return Err(fetch_error(url, "empty url"));
        }

        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fetch_error(url, describe(&e, timeout)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(url, format!("HTTP {}", status.as_u16())));
        }

        // Pages beyond the cap are truncated; profile photos sit near the top.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(url, describe(&e, timeout)))?
        {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            body,
            status: status.as_u16(),
        })
    }
}

fn describe(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {}s", timeout.as_secs_f64())
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

fn fetch_error(url: &str, reason: impl Into<String>) -> EnrichError {
    EnrichError::Fetch {
        url: url.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    const CAP: usize = 1_000;

    async fn start_site() -> String {
        let app = Router::new()
            .route("/small", get(|| async { "<img alt='Jane Smith' src='/j.jpg'>" }))
            .route("/big", get(|| async { "a".repeat(CAP * 10) }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{}", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&EnrichmentConfig {
            max_body_bytes: CAP,
            ..EnrichmentConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_status() {
        let site = start_site().await;
        let page = fetcher()
            .fetch(&format!("{}/small", site), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, b"<img alt='Jane Smith' src='/j.jpg'>");
    }

    #[tokio::test]
    async fn test_error_statuses_are_fetch_errors() {
        let site = start_site().await;
        for (path, code) in [("missing", "404"), ("broken", "500")] {
            let err = fetcher()
                .fetch(&format!("{}/{}", site, path), Duration::from_secs(5))
                .await
                .unwrap_err();
            match err {
                EnrichError::Fetch { reason, .. } => {
                    assert_eq!(reason, format!("HTTP {}", code))
                }
                other => panic!("expected a fetch error for /{}, got {:?}", path, other),
            }
        }
    }

    #[tokio::test]
    async fn test_body_truncated_at_cap() {
        let site = start_site().await;
        let page = fetcher()
            .fetch(&format!("{}/big", site), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(page.body.len(), CAP);
        assert!(page.body.iter().all(|b| *b == b'a'));
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let err = fetcher().fetch("  ", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, EnrichError::Fetch { .. }));
    }
}
