//! Lifecycle State Machine: Active ↔ Inactive from share staleness and a
//! rolling seven-day grace window after (re)activation.
//!
//! The pure half ([`evaluate`], [`should_mark_inactive`], [`days_remaining`],
//! [`missing_source_days_remaining`]) holds every boundary rule; [`Lifecycle`]
//! applies decisions to the store and notifies the read cache.

use crate::cache::CacheInvalidator;
use crate::error::SyncError;
use crate::store::{participants, SqliteStore};
use chrono::{DateTime, Duration, Utc};
use std::num::IntErrorKind;

pub const GRACE_PERIOD_DAYS: i64 = 7;

const DAY_MS: i64 = 86_400_000;
const GRACE_PERIOD_MS: i64 = GRACE_PERIOD_DAYS * DAY_MS;

/// Outcome of evaluating one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleDecision {
    /// Shares are recent; nothing else is checked.
    Fresh,
    /// Shares are stale but the grace window is still open.
    Grace { days_remaining: i64 },
    /// Stale shares and an expired grace window: deactivate, skip stats.
    MarkInactive,
}

impl LifecycleDecision {
    pub fn is_inactive(self) -> bool {
        matches!(self, LifecycleDecision::MarkInactive)
    }
}

/// True once the grace window has fully elapsed. Exactly seven days counts
/// as expired.
pub fn should_mark_inactive(activation_age: Duration) -> bool {
    activation_age.num_milliseconds() >= GRACE_PERIOD_MS
}

/// Whole days left in the grace window, rounded up. `None` once expired.
pub fn days_remaining(activation_age: Duration) -> Option<i64> {
    if should_mark_inactive(activation_age) {
        return None;
    }
    let remaining_ms = GRACE_PERIOD_MS - activation_age.num_milliseconds().max(0);
    Some(ceil_days(remaining_ms))
}

/// Age of the last share, or `None` when the epoch is too large to be in
/// the past. Unparsable values count as the Unix epoch.
fn share_age(last_share_epoch: &str, now: DateTime<Utc>) -> Option<Duration> {
    let seconds = match last_share_epoch.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => return None,
        Err(_) => 0,
    };
    let share_ms = seconds.checked_mul(1_000)?;
    Some(Duration::milliseconds(
        now.timestamp_millis().saturating_sub(share_ms),
    ))
}

/// Decides the participant's state at `now`.
///
/// Fresh activity (share age ≤ 7 days) always wins. Otherwise the grace
/// window is measured from `last_activated_at`, falling back to
/// `created_at` when it was never stamped.
pub fn evaluate(
    last_share_epoch: &str,
    last_activated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> LifecycleDecision {
    match share_age(last_share_epoch, now) {
        None => return LifecycleDecision::Fresh,
        Some(age) if age.num_milliseconds() <= GRACE_PERIOD_MS => return LifecycleDecision::Fresh,
        Some(_) => {}
    }

    let activation_age = now - last_activated_at.unwrap_or(created_at);
    match days_remaining(activation_age) {
        Some(days_remaining) => LifecycleDecision::Grace { days_remaining },
        None => LifecycleDecision::MarkInactive,
    }
}

/// Days left when the participant's source file is gone, measured from
/// `last_activated_at` alone. A missing stamp means no days left.
pub fn missing_source_days_remaining(
    last_activated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    last_activated_at
        .and_then(|at| days_remaining(now - at))
        .unwrap_or(0)
}

fn ceil_days(ms: i64) -> i64 {
    (ms + DAY_MS - 1).div_euclid(DAY_MS).min(GRACE_PERIOD_DAYS)
}

/// Store-backed lifecycle transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    store: SqliteStore,
    invalidator: CacheInvalidator,
}

impl Lifecycle {
    pub fn new(store: SqliteStore, invalidator: CacheInvalidator) -> Self {
        Self { store, invalidator }
    }

    /// Backfills every null `last_activated_at` from `created_at`. Runs
    /// before each scheduling pass.
    pub async fn repair(&self) -> Result<usize, SyncError> {
        let repaired = self
            .store
            .transaction(|tx| participants::backfill_last_activated_at(tx))
            .await?;
        if repaired > 0 {
            tracing::info!(repaired, "backfilled last_activated_at from created_at");
        }
        Ok(repaired)
    }

    /// Evaluates the participant against a freshly fetched `last_share_epoch`
    /// and deactivates it when the grace window has expired.
    ///
    /// Unknown participants are treated as just created.
    pub async fn apply(
        &self,
        address: &str,
        last_share_epoch: &str,
        now: DateTime<Utc>,
    ) -> Result<LifecycleDecision, SyncError> {
        let owned_address = address.to_owned();
        let epoch = last_share_epoch.to_owned();
        let (decision, transitioned) = self
            .store
            .transaction(move |tx| {
                let Some(participant) = participants::find_by_address(tx, &owned_address)? else {
                    return Ok((evaluate(&epoch, Some(now), now, now), false));
                };
                let decision = evaluate(
                    &epoch,
                    participant.last_activated_at,
                    participant.created_at,
                    now,
                );
                let transitioned = decision.is_inactive()
                    && participant.is_active
                    && participants::set_active(tx, &owned_address, false, now)?;
                Ok((decision, transitioned))
            })
            .await?;

        self.report(address, decision, transitioned);
        Ok(decision)
    }

    /// Handles a participant whose local source file is absent: keep it
    /// active while grace days remain, deactivate once none do.
    pub async fn handle_missing_source(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<LifecycleDecision, SyncError> {
        let owned_address = address.to_owned();
        let (decision, transitioned) = self
            .store
            .transaction(move |tx| {
                let participant = participants::find_by_address(tx, &owned_address)?;
                let last_activated_at = participant.as_ref().and_then(|p| p.last_activated_at);
                let days_remaining = missing_source_days_remaining(last_activated_at, now);
                if days_remaining > 0 {
                    return Ok((LifecycleDecision::Grace { days_remaining }, false));
                }
                let transitioned = match participant {
                    Some(p) if p.is_active => participants::set_active(tx, &owned_address, false, now)?,
                    _ => false,
                };
                Ok((LifecycleDecision::MarkInactive, transitioned))
            })
            .await?;

        self.report(address, decision, transitioned);
        Ok(decision)
    }

    /// Restarts the full grace window: `last_activated_at = now`, active.
    pub async fn reactivate(&self, address: &str, now: DateTime<Utc>) -> Result<(), SyncError> {
        let owned_address = address.to_owned();
        let found = self
            .store
            .transaction(move |tx| participants::reactivate(tx, &owned_address, now))
            .await?;
        if !found {
            return Err(SyncError::validation(format!("unknown participant {address}")));
        }

        tracing::info!(address, "participant reactivated");
        self.invalidator.participant_transitioned(address);
        Ok(())
    }

    fn report(&self, address: &str, decision: LifecycleDecision, transitioned: bool) {
        match decision {
            LifecycleDecision::Fresh => {}
            LifecycleDecision::Grace { days_remaining } => {
                tracing::info!(address, days_remaining, "stale participant held by grace period");
            }
            LifecycleDecision::MarkInactive => {
                if transitioned {
                    tracing::info!(address, "participant marked inactive");
                }
            }
        }
        if transitioned {
            self.invalidator.participant_transitioned(address);
        }
    }
}
