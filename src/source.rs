//! Source Fetcher: retrieves one participant's raw snapshot from the
//! upstream pool endpoint or a local fallback directory.

pub mod backoff;
pub mod client;
mod local;
pub mod location;
mod metrics;
pub mod options;
pub mod payload;
mod retry;

pub use backoff::BackoffSchedule;
pub use client::{SnapshotFetcher, SnapshotSource};
pub use location::{validate_address, SourceLocation};
pub use metrics::FetchMetricsSnapshot;
pub use options::FetchOptions;
pub use payload::{LooseNumber, RawSnapshot, RawWorker};
