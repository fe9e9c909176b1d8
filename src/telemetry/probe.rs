//! Probe span helpers.
//!
//! Field names follow the OpenTelemetry database conventions where one
//! exists (`db.system`, `db.namespace`, `server.address`, `server.port`).

use crate::config::ProbeConfig;
use crate::probe::Outcome;
use tracing::Span;
use uuid::Uuid;

/// Start the span covering one probe.
///
/// `probe.outcome` and `probe.elapsed_ms` are declared empty and filled by
/// [`record_outcome`].
pub fn start_probe_span(probe_id: &Uuid, config: &ProbeConfig) -> Span {
    tracing::info_span!(
        "db.probe",
        "probe.id" = %probe_id,
        "db.system" = "postgresql",
        "db.namespace" = %config.database,
        "server.address" = %config.host,
        "server.port" = config.port,
        "probe.outcome" = tracing::field::Empty,
        "probe.elapsed_ms" = tracing::field::Empty,
    )
}

/// Record how the probe ended and emit a summary event inside its span.
pub fn record_outcome(span: &Span, outcome: Outcome, elapsed_ms: u64) {
    span.record("probe.outcome", outcome.as_str());
    span.record("probe.elapsed_ms", elapsed_ms);
    span.in_scope(|| {
        tracing::info!(outcome = outcome.as_str(), elapsed_ms, "probe finished");
    });
}
