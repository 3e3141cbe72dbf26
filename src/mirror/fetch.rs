use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::redirect;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("retry budget exhausted after {attempts} attempts fetching {url}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("request for {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Network seam. Production uses [`HttpFetcher`]; tests substitute stubs.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Total attempts per URL, transient failures included.
    pub attempts: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Follow https -> http redirects (on by default; some feed hosts
    /// redirect through plain-http trackers).
    pub allow_cross_scheme_redirects: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            timeout: Duration::from_secs(30),
            allow_cross_scheme_redirects: true,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let policy = if config.allow_cross_scheme_redirects {
            redirect::Policy::limited(10)
        } else {
            redirect::Policy::custom(|attempt| {
                if attempt.previous().len() > 10 {
                    return attempt.error("too many redirects");
                }
                let downgrade = attempt.url().scheme() == "http"
                    && attempt.previous().last().is_some_and(|u| u.scheme() == "https");
                if downgrade { attempt.stop() } else { attempt.follow() }
            })
        };
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(policy)
            .build()
            .context("building http client")?;
        Ok(Self { client, config })
    }

    async fn try_fetch(&self, url: &str) -> Result<Bytes, reqwest::Error> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        resp.bytes().await
    }
}

// HTTP error status and timeout get retried; anything else surfaces at once.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_status() || err.is_timeout()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_fetch(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if is_transient(&err) && attempt < self.config.attempts => {
                    warn!("error downloading {url} (attempt {attempt}/{}): {err}", self.config.attempts);
                }
                Err(err) if is_transient(&err) => {
                    error!("retry count exceeded, giving up on downloading {url}");
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    return Err(FetchError::Request { url: url.to_string(), source: err });
                }
            }
        }
    }
}
