pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod normalize;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod source;
pub mod store;

pub use cache::{CacheInvalidator, NoopCache, ReadCache, TtlCache};
pub use error::{StoreError, SyncError};
pub use lifecycle::{Lifecycle, LifecycleDecision, GRACE_PERIOD_DAYS};
pub use normalize::{normalize_snapshot, NormalizedSnapshot, NormalizedWorker};
pub use reconcile::{ReconcileMode, ReconcileOutcome, Reconciler};
pub use runtime::clock::{Clock, FixedClock, SystemClock};
pub use runtime::config::{SyncConfig, SyncConfigBuilder, SyncConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use scheduler::{BatchScheduler, ParticipantOutcome, RunSummary};
pub use source::{RawSnapshot, SnapshotFetcher, SnapshotSource, SourceLocation};
pub use store::SqliteStore;
