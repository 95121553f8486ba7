//! Snapshot fetcher: `GET {base}/users/{address}` over HTTP with linear
//! retry, or a validated local read when the source is a filesystem root.
//! Houses the `SnapshotSource` trait consumed by the scheduler.

use super::backoff::{retry_with_backoff, RetryBackoff, RetryDisposition};
use super::local;
use super::location::{validate_address, SourceLocation};
use super::metrics::{FetchMetrics, FetchMetricsSnapshot};
use super::options::FetchOptions;
use super::payload::RawSnapshot;
use super::retry::{RetryContext, REMOTE_FETCH_RETRY};
use crate::error::SyncError;
use crate::runtime::config::SyncConfig;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::time::Instant;
use url::Url;

pub trait SnapshotSource: Send + Sync {
    fn fetch<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<RawSnapshot, SyncError>>;
}

#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    location: Arc<SourceLocation>,
    http: reqwest::Client,
    options: FetchOptions,
    metrics: Arc<FetchMetrics>,
}

impl SnapshotSource for SnapshotFetcher {
    fn fetch<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<RawSnapshot, SyncError>> {
        Box::pin(self.fetch(address))
    }
}

impl SnapshotFetcher {
    pub fn new(source: &str) -> Result<Self> {
        Self::with_options(source, FetchOptions::default())
    }

    pub fn with_options(source: &str, options: FetchOptions) -> Result<Self> {
        options.validate()?;
        let location = SourceLocation::resolve(source)?;

        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|err| anyhow!("failed to build HTTP client: {err}"))?;

        Ok(Self {
            location: Arc::new(location),
            http,
            options,
            metrics: Arc::new(FetchMetrics::default()),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::with_options(config.source_url(), config.fetch_options())
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn metrics(&self) -> FetchMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetches one participant's raw snapshot.
    ///
    /// The address is validated before any URL or path is built. Remote
    /// failures are retried `max_attempts` times with a `delay × attempt`
    /// pause between them and surface as `TransientFetch`. Local roots use
    /// their own retry loop and report a still-missing file as
    /// `FileNotFound`.
    pub async fn fetch(&self, address: &str) -> Result<RawSnapshot, SyncError> {
        validate_address(address)?;

        match self.location.as_ref() {
            SourceLocation::Remote(base) => {
                let url = SourceLocation::user_url(base, address)?;
                self.fetch_remote(address, url).await
            }
            SourceLocation::Local(root) => {
                local::read_snapshot(root, address, &self.options, &self.metrics).await
            }
        }
    }

    async fn fetch_remote(&self, address: &str, url: Url) -> Result<RawSnapshot, SyncError> {
        let context = RetryContext::new(address, &REMOTE_FETCH_RETRY);
        let config = RetryBackoff::new(self.options.remote_schedule(), self.options.max_attempts);

        let result = retry_with_backoff(
            config,
            |attempt| {
                let request = self.fetch_once(url.clone());
                async move { request.await.map(|snapshot| (snapshot, attempt)) }
            },
            |attempt, backoff, err: &reqwest::Error, will_retry| {
                if will_retry {
                    self.metrics.record_retry();
                }
                context.log_attempt(attempt, backoff, err, will_retry);
            },
            |_, _| RetryDisposition::Retry,
        )
        .await;

        match result {
            Ok((snapshot, attempt)) => {
                context.log_recovered(attempt);
                Ok(snapshot)
            }
            Err(failure) => Err(SyncError::TransientFetch {
                address: address.to_owned(),
                attempts: failure.attempts,
                message: failure.error.without_url().to_string(),
            }),
        }
    }

    async fn fetch_once(&self, url: Url) -> Result<RawSnapshot, reqwest::Error> {
        let started = Instant::now();
        let result: Result<RawSnapshot, reqwest::Error> = async {
            self.http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json::<RawSnapshot>()
                .await
        }
        .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => self.metrics.record_success(elapsed),
            Err(err) if err.is_timeout() => self.metrics.record_timeout(elapsed),
            Err(_) => self.metrics.record_failure(elapsed),
        }
        result
    }
}
