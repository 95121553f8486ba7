//! Conversion of a fetched [`RawSnapshot`] into canonical, typed values.

use super::agent::{normalize_user_agent, sanitize_user_agent};
use super::decimal::integer_from_float_like;
use super::hashrate::{hashrate_to_integer, parse_hashrate};
use crate::source::payload::{LooseNumber, RawSnapshot, RawWorker};
use chrono::{DateTime, Utc};

/// The five rolling hashrate windows, in H/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HashrateSet {
    pub h1m: f64,
    pub h5m: f64,
    pub h1hr: f64,
    pub h1d: f64,
    pub h7d: f64,
}

impl HashrateSet {
    fn from_raw(
        h1m: &LooseNumber,
        h5m: &LooseNumber,
        h1hr: &LooseNumber,
        h1d: &LooseNumber,
        h7d: &LooseNumber,
    ) -> Self {
        Self {
            h1m: parse_hashrate(&h1m.as_text()),
            h5m: parse_hashrate(&h5m.as_text()),
            h1hr: parse_hashrate(&h1hr.as_text()),
            h1d: parse_hashrate(&h1d.as_text()),
            h7d: parse_hashrate(&h7d.as_text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWorker {
    pub name: String,
    pub user_agent_token: String,
    pub user_agent_raw: String,
    pub hashrate: HashrateSet,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub last_update: DateTime<Utc>,
    pub started: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSnapshot {
    pub authorised: String,
    pub last_share_epoch: String,
    pub worker_count: i64,
    pub hashrate: HashrateSet,
    /// 7-day hashrate as an exact integer string of H/s.
    pub hashrate_7d_exact: String,
    pub shares: f64,
    pub best_share: f64,
    pub best_ever: f64,
    pub workers: Vec<NormalizedWorker>,
}

/// Derives the per-participant worker name from an upstream device name.
///
/// `address` → `""`, `address.rig` / `address_rig` → `"rig"`, anything else
/// is kept verbatim.
pub fn derive_worker_name(workername: &str, address: &str) -> String {
    if workername == address {
        return String::new();
    }

    match workername.strip_prefix(address) {
        Some(rest) => match rest.strip_prefix('.').or_else(|| rest.strip_prefix('_')) {
            Some(suffix) => suffix.to_owned(),
            None => workername.to_owned(),
        },
        None => workername.to_owned(),
    }
}

/// Converts an epoch-seconds value to a timestamp, clamping garbage to the
/// Unix epoch.
pub fn epoch_seconds_to_datetime(value: &LooseNumber) -> DateTime<Utc> {
    integer_from_float_like(&value.as_text())
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn normalize_snapshot(raw: &RawSnapshot, address: &str) -> NormalizedSnapshot {
    NormalizedSnapshot {
        authorised: integer_from_float_like(&raw.authorised.as_text()),
        last_share_epoch: integer_from_float_like(&raw.lastshare.as_text()),
        worker_count: integer_from_float_like(&raw.workers.as_text())
            .parse::<i64>()
            .unwrap_or(0),
        hashrate: HashrateSet::from_raw(
            &raw.hashrate1m,
            &raw.hashrate5m,
            &raw.hashrate1hr,
            &raw.hashrate1d,
            &raw.hashrate7d,
        ),
        hashrate_7d_exact: hashrate_to_integer(&raw.hashrate7d.as_text()),
        shares: raw.shares.as_f64(),
        best_share: raw.bestshare.as_f64(),
        best_ever: raw.bestever.as_f64(),
        workers: raw
            .worker
            .iter()
            .map(|worker| normalize_worker(worker, address))
            .collect(),
    }
}

fn normalize_worker(raw: &RawWorker, address: &str) -> NormalizedWorker {
    NormalizedWorker {
        name: derive_worker_name(raw.workername.trim(), address),
        user_agent_token: normalize_user_agent(raw.useragent.as_deref()),
        user_agent_raw: sanitize_user_agent(raw.useragent.as_deref()),
        hashrate: HashrateSet::from_raw(
            &raw.hashrate1m,
            &raw.hashrate5m,
            &raw.hashrate1hr,
            &raw.hashrate1d,
            &raw.hashrate7d,
        ),
        shares: raw.shares.as_f64(),
        best_share: raw.bestshare.as_f64(),
        best_ever: raw.bestever.as_f64(),
        last_update: epoch_seconds_to_datetime(&raw.lastshare),
        started: raw
            .started
            .as_ref()
            .map(|started| integer_from_float_like(&started.as_text()))
            .unwrap_or_else(|| "0".to_owned()),
    }
}
