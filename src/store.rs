//! Relational persistence on SQLite: participants, workers and the two
//! append-only stats collections.

pub mod models;
pub mod participants;
pub mod schema;
pub mod sqlite;
pub mod stats;
pub mod workers;

pub use models::{
    NewParticipant, Participant, ParticipantStatsPoint, WorkerRecord, WorkerStatsPoint,
};
pub use sqlite::SqliteStore;
pub use workers::WorkerColumn;
