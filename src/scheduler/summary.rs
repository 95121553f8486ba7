use std::time::Duration;

/// What happened to one participant during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantOutcome {
    /// Snapshot reconciled. `grace_days_remaining` is set when shares were
    /// stale but the grace window kept the participant active.
    Synced {
        changed: bool,
        workers: usize,
        grace_days_remaining: Option<i64>,
    },
    /// Marked inactive this run; no stats were written.
    Deactivated,
    /// Source file absent but grace days remain; state untouched.
    GraceHold { days_remaining: i64 },
    /// Any other failure; state untouched, retried next run.
    Failed { kind: &'static str },
}

/// Aggregate counters for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub participants: usize,
    pub workers: usize,
    pub synced: usize,
    pub changed: usize,
    pub deactivated: usize,
    pub grace_holds: usize,
    pub errors: usize,
    pub repaired: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub(crate) fn record(&mut self, outcome: &ParticipantOutcome) {
        self.participants += 1;
        match outcome {
            ParticipantOutcome::Synced {
                changed,
                workers,
                grace_days_remaining,
            } => {
                self.synced += 1;
                self.workers += workers;
                if *changed {
                    self.changed += 1;
                }
                if grace_days_remaining.is_some() {
                    self.grace_holds += 1;
                }
            }
            ParticipantOutcome::Deactivated => self.deactivated += 1,
            ParticipantOutcome::GraceHold { .. } => self.grace_holds += 1,
            ParticipantOutcome::Failed { .. } => self.errors += 1,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            target: "poolstats::summary",
            batches = self.batches,
            participants = self.participants,
            workers = self.workers,
            synced = self.synced,
            changed = self.changed,
            deactivated = self.deactivated,
            grace_holds = self.grace_holds,
            errors = self.errors,
            repaired = self.repaired,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "sync run complete"
        );
    }
}
