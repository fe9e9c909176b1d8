//! Metric instruments for probe runs.
//!
//! Uses the globally-registered `MeterProvider`; without an OTLP endpoint
//! that is the no-op provider and recording costs nothing.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("pgprobe")
}

/// Counter: completed probes.
/// Labels: `outcome` ("success" | "configuration-error" | "connection-error" | "query-error").
pub fn probe_runs() -> Counter<u64> {
    meter()
        .u64_counter("pgprobe.probe.runs")
        .with_description("Number of completed connectivity probes")
        .build()
}

/// Histogram: time spent in each probe phase.
/// Labels: `phase` ("connect" | "query").
pub fn phase_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("pgprobe.probe.phase_duration_ms")
        .with_description("Probe phase duration in milliseconds")
        .with_unit("ms")
        .build()
}
