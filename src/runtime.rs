//! Runtime glue that wires configuration, clocks, telemetry and the runner
//! loop.

pub mod clock;
pub mod config;
pub mod runner;
pub mod telemetry;
