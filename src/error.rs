//! Error types for pgprobe.
//!
//! Probe failures are data (see [`crate::probe::ProbeResult`]); this enum
//! covers what can go wrong around the probe: loading configuration,
//! setting up telemetry, talking to the database driver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, Error>;
