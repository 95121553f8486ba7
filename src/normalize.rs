//! Pure, deterministic conversion of upstream snapshot fields into canonical
//! typed values: hashrates with unit suffixes, exact integer counters,
//! device identifiers and worker names.

pub mod agent;
pub mod decimal;
pub mod hashrate;
pub mod snapshot;

pub use agent::{normalize_user_agent, sanitize_user_agent};
pub use decimal::integer_from_float_like;
pub use hashrate::{hashrate_to_integer, parse_hashrate};
pub use snapshot::{
    derive_worker_name, normalize_snapshot, HashrateSet, NormalizedSnapshot, NormalizedWorker,
};
