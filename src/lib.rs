//! # pgprobe
//!
//! Connectivity probe for PostgreSQL, local or cloud-hosted.
//!
//! Reads connection parameters from the environment, makes one bounded
//! connection attempt, runs one introspection query, and reports the result
//! with a hint for well-known failures (DNS, refused, timeout, bad
//! credentials, pg_hba rejection).

pub mod config;
pub mod db;
pub mod error;
pub mod probe;
pub mod report;
pub mod telemetry;
