use crate::source::location::SourceLocation;
use crate::source::options::{
    FetchOptions, DEFAULT_FETCH_MAX_ATTEMPTS, DEFAULT_FETCH_RETRY_DELAY_MS,
    DEFAULT_LOCAL_INITIAL_BACKOFF_MS, DEFAULT_LOCAL_MAX_ATTEMPTS, DEFAULT_LOCAL_MAX_BACKOFF_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::env::{self, VarError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

pub const ENV_SOURCE_URL: &str = "POOLSTATS_SOURCE_URL";
pub const ENV_DATABASE_PATH: &str = "POOLSTATS_DATABASE_PATH";
pub const ENV_BATCH_SIZE: &str = "POOLSTATS_BATCH_SIZE";
pub const ENV_FETCH_ATTEMPTS: &str = "POOLSTATS_FETCH_ATTEMPTS";
pub const ENV_FETCH_RETRY_DELAY_MS: &str = "POOLSTATS_FETCH_RETRY_DELAY_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "POOLSTATS_REQUEST_TIMEOUT_SECS";
pub const ENV_LOCAL_ATTEMPTS: &str = "POOLSTATS_LOCAL_ATTEMPTS";
pub const ENV_SYNC_INTERVAL_SECS: &str = "POOLSTATS_SYNC_INTERVAL_SECS";
pub const ENV_METRICS_INTERVAL_SECS: &str = "POOLSTATS_METRICS_INTERVAL_SECS";

/// Runtime configuration for the snapshot sync pipeline.
///
/// All instances must be constructed via [`SyncConfig::builder`] or [`SyncConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    source_url: String,
    database_path: PathBuf,
    batch_size: usize,
    fetch_max_attempts: usize,
    fetch_retry_delay: Duration,
    request_timeout: Duration,
    local_max_attempts: usize,
    local_initial_backoff: Duration,
    local_max_backoff: Duration,
    sync_interval: Duration,
    metrics_interval: Duration,
}

pub struct SyncConfigParams {
    pub source_url: String,
    pub database_path: PathBuf,
    pub batch_size: usize,
    pub fetch_max_attempts: usize,
    pub fetch_retry_delay: Duration,
    pub request_timeout: Duration,
    pub local_max_attempts: usize,
    pub local_initial_backoff: Duration,
    pub local_max_backoff: Duration,
    pub sync_interval: Duration,
    pub metrics_interval: Duration,
}

impl SyncConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`SyncConfig::builder`] when most values use defaults.
    pub fn new(params: SyncConfigParams) -> Result<Self> {
        let SyncConfigParams {
            source_url,
            database_path,
            batch_size,
            fetch_max_attempts,
            fetch_retry_delay,
            request_timeout,
            local_max_attempts,
            local_initial_backoff,
            local_max_backoff,
            sync_interval,
            metrics_interval,
        } = params;

        let config = Self {
            source_url: source_url.trim().to_owned(),
            database_path,
            batch_size,
            fetch_max_attempts,
            fetch_retry_delay,
            request_timeout,
            local_max_attempts,
            local_initial_backoff,
            local_max_backoff,
            sync_interval,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from `POOLSTATS_*` environment variables.
    ///
    /// Absent variables fall back to defaults; present but unparsable ones
    /// are errors naming the variable.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key))
    }

    pub(crate) fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let mut builder = Self::builder();

        if let Some(url) = read_var(&lookup, ENV_SOURCE_URL)? {
            builder = builder.source_url(url);
        }
        if let Some(path) = read_var(&lookup, ENV_DATABASE_PATH)? {
            builder = builder.database_path(path);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, ENV_BATCH_SIZE)? {
            builder = builder.batch_size(size);
        }
        if let Some(attempts) = parse_var::<usize, _>(&lookup, ENV_FETCH_ATTEMPTS)? {
            builder = builder.fetch_max_attempts(attempts);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_FETCH_RETRY_DELAY_MS)? {
            builder = builder.fetch_retry_delay(Duration::from_millis(ms));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_var::<usize, _>(&lookup, ENV_LOCAL_ATTEMPTS)? {
            builder = builder.local_max_attempts(attempts);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SYNC_INTERVAL_SECS)? {
            builder = builder.sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_METRICS_INTERVAL_SECS)? {
            builder = builder.metrics_interval(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Upstream base URL or local root the snapshots are read from.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// SQLite database file.
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Participants processed concurrently per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn fetch_max_attempts(&self) -> usize {
        self.fetch_max_attempts
    }

    /// Base delay of the linear remote retry schedule.
    pub fn fetch_retry_delay(&self) -> Duration {
        self.fetch_retry_delay
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn local_max_attempts(&self) -> usize {
        self.local_max_attempts
    }

    pub fn local_initial_backoff(&self) -> Duration {
        self.local_initial_backoff
    }

    pub fn local_max_backoff(&self) -> Duration {
        self.local_max_backoff
    }

    /// Pause between the end of one scheduler run and the start of the next.
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            request_timeout: self.request_timeout,
            max_attempts: self.fetch_max_attempts,
            retry_delay: self.fetch_retry_delay,
            local_max_attempts: self.local_max_attempts,
            local_initial_backoff: self.local_initial_backoff,
            local_max_backoff: self.local_max_backoff,
        }
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        SourceLocation::resolve(&self.source_url).context("source_url is invalid")?;

        if self.database_path.as_os_str().is_empty() {
            bail!("database_path cannot be empty");
        }

        if self.batch_size == 0 {
            bail!("batch_size must be greater than 0");
        }

        if self.sync_interval.is_zero() {
            bail!("sync_interval must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        self.fetch_options().validate()
    }
}

#[derive(Debug, Default, Clone)]
pub struct SyncConfigBuilder {
    source_url: Option<String>,
    database_path: Option<PathBuf>,
    batch_size: Option<usize>,
    fetch_max_attempts: Option<usize>,
    fetch_retry_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    local_max_attempts: Option<usize>,
    local_initial_backoff: Option<Duration>,
    local_max_backoff: Option<Duration>,
    sync_interval: Option<Duration>,
    metrics_interval: Option<Duration>,
}

impl SyncConfigBuilder {
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn fetch_max_attempts(mut self, attempts: usize) -> Self {
        self.fetch_max_attempts = Some(attempts);
        self
    }

    pub fn fetch_retry_delay(mut self, delay: Duration) -> Self {
        self.fetch_retry_delay = Some(delay);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn local_max_attempts(mut self, attempts: usize) -> Self {
        self.local_max_attempts = Some(attempts);
        self
    }

    pub fn local_initial_backoff(mut self, backoff: Duration) -> Self {
        self.local_initial_backoff = Some(backoff);
        self
    }

    pub fn local_max_backoff(mut self, backoff: Duration) -> Self {
        self.local_max_backoff = Some(backoff);
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        let params = SyncConfigParams {
            source_url: self.source_url.context("source_url is required")?,
            database_path: self.database_path.context("database_path is required")?,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            fetch_max_attempts: self.fetch_max_attempts.unwrap_or(DEFAULT_FETCH_MAX_ATTEMPTS),
            fetch_retry_delay: self
                .fetch_retry_delay
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_FETCH_RETRY_DELAY_MS)),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            local_max_attempts: self.local_max_attempts.unwrap_or(DEFAULT_LOCAL_MAX_ATTEMPTS),
            local_initial_backoff: self
                .local_initial_backoff
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_LOCAL_INITIAL_BACKOFF_MS)),
            local_max_backoff: self
                .local_max_backoff
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_LOCAL_MAX_BACKOFF_MS)),
            sync_interval: self
                .sync_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        SyncConfig::new(params)
    }
}

fn read_var<F>(lookup: &F, key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, VarError>,
{
    read_var(lookup, key)?
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("failed to parse {key}='{value}'"))
        })
        .transpose()
}
