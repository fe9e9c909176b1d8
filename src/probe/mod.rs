//! The connectivity probe: validate, connect, introspect, release, report.
//!
//! One probe makes at most one connection attempt and runs at most one
//! query. Every failure is captured as data in a [`ProbeResult`]; nothing
//! here returns `Err`.

pub mod hint;

use crate::config::ProbeConfig;
use crate::db::PgConnector;
use crate::telemetry::{self, metrics};
use chrono::{DateTime, Utc};
use futures_util::FutureExt as _;
use hint::Hint;
use opentelemetry::KeyValue;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{Instrument as _, debug, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Opens sessions. The real implementation is [`PgConnector`].
pub trait Connector {
    type Session: Session;

    /// Open one session. Timeouts are applied by the caller.
    fn connect(
        &self,
        config: &ProbeConfig,
    ) -> impl Future<Output = Result<Self::Session, ProbeFailure>> + Send;
}

/// An open database session.
pub trait Session: Send {
    /// Run the introspection query and return the single row.
    fn introspect(&mut self) -> impl Future<Output = Result<ServerInfo, ProbeFailure>> + Send;

    /// Release the session.
    fn close(self) -> impl Future<Output = Result<(), ProbeFailure>> + Send;
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// How a probe ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    /// Required input missing; no I/O was attempted.
    ConfigurationError,
    /// Transport, authentication, or access-control failure during connect.
    ConnectionError,
    /// Connected, but the introspection query failed.
    QueryError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::ConfigurationError => "configuration-error",
            Outcome::ConnectionError => "connection-error",
            Outcome::QueryError => "query-error",
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::ConnectionError => 1,
            Outcome::ConfigurationError => 2,
            Outcome::QueryError => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the server says about itself and this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub version: String,
    pub database: String,
    pub user: String,
    /// `inet_server_addr()`; absent over a Unix socket.
    pub server_addr: Option<String>,
    /// `inet_client_addr()`; absent over a Unix socket.
    pub client_addr: Option<String>,
}

/// A provider error, as reported by the driver or transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    /// Socket-style code (`ECONNREFUSED`) or SQLSTATE (`28P01`).
    pub code: Option<String>,
    pub message: String,
    /// Full driver error, printed only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeFailure {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The probe's own deadline elapsed before the driver answered.
    pub fn timed_out(phase: &str, after: Duration) -> Self {
        Self::new(
            Some(hint::code::TIMED_OUT),
            format!("{phase} timed out after {after:?}"),
        )
    }

    pub fn hint(&self) -> Option<Hint> {
        Hint::classify(self.code.as_deref(), &self.message)
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of a single probe. Built once, read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    probe_id: Uuid,
    started_at: DateTime<Utc>,
    elapsed_ms: u64,
    outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ProbeFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<Hint>,
}

impl ProbeResult {
    fn from_finding(
        probe_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        finding: Finding,
    ) -> Self {
        let mut result = Self {
            probe_id,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            outcome: Outcome::Success,
            server: None,
            missing_fields: Vec::new(),
            error: None,
            hint: None,
        };
        match finding {
            Finding::Reached(info) => result.server = Some(info),
            Finding::Missing(fields) => {
                result.outcome = Outcome::ConfigurationError;
                result.missing_fields = fields.into_iter().map(str::to_string).collect();
            }
            Finding::ConnectFailed(failure) => {
                result.outcome = Outcome::ConnectionError;
                result.hint = failure.hint();
                result.error = Some(failure);
            }
            Finding::QueryFailed(failure) => {
                result.outcome = Outcome::QueryError;
                result.hint = failure.hint().map(Hint::after_connect);
                result.error = Some(failure);
            }
        }
        result
    }

    pub fn probe_id(&self) -> Uuid {
        self.probe_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn server(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    pub fn missing_fields(&self) -> &[String] {
        &self.missing_fields
    }

    pub fn error(&self) -> Option<&ProbeFailure> {
        self.error.as_ref()
    }

    pub fn hint(&self) -> Option<Hint> {
        self.hint
    }
}

enum Finding {
    Reached(ServerInfo),
    Missing(Vec<&'static str>),
    ConnectFailed(ProbeFailure),
    QueryFailed(ProbeFailure),
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Probe the configured Postgres server.
pub async fn run(config: &ProbeConfig) -> ProbeResult {
    run_with(&PgConnector, config).await
}

/// Probe through an arbitrary connector.
pub async fn run_with<C: Connector>(connector: &C, config: &ProbeConfig) -> ProbeResult {
    let probe_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = Instant::now();

    let span = telemetry::probe::start_probe_span(&probe_id, config);
    let finding = probe(connector, config).instrument(span.clone()).await;
    let result = ProbeResult::from_finding(probe_id, started_at, start.elapsed(), finding);

    telemetry::probe::record_outcome(&span, result.outcome(), result.elapsed_ms());
    metrics::probe_runs().add(1, &[KeyValue::new("outcome", result.outcome().as_str())]);

    result
}

async fn probe<C: Connector>(connector: &C, config: &ProbeConfig) -> Finding {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        warn!(missing = ?missing, "required configuration missing, not connecting");
        return Finding::Missing(missing);
    }

    let phase_start = Instant::now();
    let connected = tokio::time::timeout(config.connect_timeout, connector.connect(config)).await;
    record_phase("connect", phase_start);

    let mut session = match connected {
        Ok(Ok(session)) => session,
        Ok(Err(failure)) => {
            warn!(error = %failure, "connect failed");
            return Finding::ConnectFailed(failure);
        }
        Err(_) => {
            warn!(timeout_secs = config.connect_timeout.as_secs(), "connect timed out");
            return Finding::ConnectFailed(ProbeFailure::timed_out(
                "connect",
                config.connect_timeout,
            ));
        }
    };
    info!("connected");

    let phase_start = Instant::now();
    let queried = AssertUnwindSafe(tokio::time::timeout(
        config.query_timeout,
        session.introspect(),
    ))
    .catch_unwind()
    .await;
    record_phase("query", phase_start);

    release(session, config.query_timeout).await;

    // The session is closed; let the fault reach the caller's boundary.
    let queried = match queried {
        Ok(queried) => queried,
        Err(panic) => {
            warn!("introspection panicked after session release");
            std::panic::resume_unwind(panic);
        }
    };

    match queried {
        Ok(Ok(info)) => {
            info!(server_version = %info.version, database = %info.database, "introspection succeeded");
            Finding::Reached(info)
        }
        Ok(Err(failure)) => {
            warn!(error = %failure, "introspection query failed");
            Finding::QueryFailed(failure)
        }
        Err(_) => {
            warn!(timeout_secs = config.query_timeout.as_secs(), "introspection query timed out");
            Finding::QueryFailed(ProbeFailure::timed_out("query", config.query_timeout))
        }
    }
}

/// Close the session. Failures here are logged and never change the outcome.
async fn release<S: Session>(session: S, timeout: Duration) {
    match tokio::time::timeout(timeout, session.close()).await {
        Ok(Ok(())) => debug!("session closed"),
        Ok(Err(failure)) => warn!(error = %failure, "session close failed"),
        Err(_) => warn!(timeout_secs = timeout.as_secs(), "session close timed out"),
    }
}

fn record_phase(phase: &'static str, start: Instant) {
    metrics::phase_duration_ms().record(
        start.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("phase", phase)],
    );
}
