//! Probe lifecycle against scripted connectors.
//!
//! No database needed: each fake connector plays one failure mode and
//! counts how many sessions were opened and closed.

use pgprobe::config::ProbeConfig;
use pgprobe::probe::hint::Hint;
use pgprobe::probe::{self, Connector, Outcome, ProbeFailure, ServerInfo, Session};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone)]
enum Script {
    Healthy,
    ConnectFails(ProbeFailure),
    ConnectHangs,
    QueryFails(ProbeFailure),
    QueryHangs,
    QueryPanics,
    CloseFails,
}

struct FakeConnector {
    script: Script,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    fn new(script: Script) -> Self {
        Self {
            script,
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    script: Script,
    database: String,
    user: String,
    closes: Arc<AtomicUsize>,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, config: &ProbeConfig) -> Result<FakeSession, ProbeFailure> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::ConnectFails(failure) => Err(failure.clone()),
            Script::ConnectHangs => std::future::pending().await,
            script => Ok(FakeSession {
                script: script.clone(),
                database: config.database.clone(),
                user: config.username.clone(),
                closes: Arc::clone(&self.closes),
            }),
        }
    }
}

impl Session for FakeSession {
    async fn introspect(&mut self) -> Result<ServerInfo, ProbeFailure> {
        match &self.script {
            Script::QueryFails(failure) => Err(failure.clone()),
            Script::QueryHangs => std::future::pending().await,
            Script::QueryPanics => panic!("row decoder blew up"),
            _ => Ok(ServerInfo {
                version: "PostgreSQL 16.4 on x86_64-pc-linux-gnu".to_string(),
                database: self.database.clone(),
                user: self.user.clone(),
                server_addr: Some("127.0.0.1/32".to_string()),
                client_addr: Some("127.0.0.1/32".to_string()),
            }),
        }
    }

    async fn close(self) -> Result<(), ProbeFailure> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::CloseFails => Err(ProbeFailure::new(Some("ECONNRESET"), "connection reset")),
            _ => Ok(()),
        }
    }
}

fn test_config() -> ProbeConfig {
    ProbeConfig::new("localhost", "testdb", "u", "p").port(5432)
}

#[tokio::test]
async fn reachable_server_reports_success() {
    let connector = FakeConnector::new(Script::Healthy);

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::Success);
    let server = result.server().expect("server info on success");
    assert!(!server.version.is_empty());
    assert_eq!(server.database, "testdb");
    assert_eq!(server.user, "u");
    assert!(result.error().is_none());
    assert!(result.hint().is_none());
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn empty_host_is_a_configuration_error_without_io() {
    let connector = FakeConnector::new(Script::Healthy);
    let config = ProbeConfig::new("", "testdb", "u", "p");

    let result = probe::run_with(&connector, &config).await;

    assert_eq!(result.outcome(), Outcome::ConfigurationError);
    assert!(result.missing_fields().iter().any(|f| f == "DB_HOST"));
    assert_eq!(connector.connects(), 0);
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn every_missing_field_is_listed() {
    let connector = FakeConnector::new(Script::Healthy);
    let config = ProbeConfig::new("", "", "", "");

    let result = probe::run_with(&connector, &config).await;

    assert_eq!(result.outcome(), Outcome::ConfigurationError);
    assert_eq!(
        result.missing_fields(),
        ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASSWORD"]
    );
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn bad_credentials_get_authentication_hint() {
    let connector = FakeConnector::new(Script::ConnectFails(ProbeFailure::new(
        Some("28P01"),
        "password authentication failed for user \"u\"",
    )));

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::ConnectionError);
    assert_eq!(result.hint(), Some(Hint::Authentication));
    assert_eq!(result.error().and_then(|e| e.code.as_deref()), Some("28P01"));
    assert!(result.server().is_none());
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn pg_hba_rejection_gets_host_based_hint() {
    let connector = FakeConnector::new(Script::ConnectFails(ProbeFailure::new(
        Some("28000"),
        "no pg_hba.conf entry for host \"10.0.1.5\", user \"u\", database \"testdb\", no encryption",
    )));

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::ConnectionError);
    assert_eq!(result.hint(), Some(Hint::HostBasedAccess));
}

#[tokio::test]
async fn unknown_connect_error_has_no_hint() {
    let connector = FakeConnector::new(Script::ConnectFails(ProbeFailure::new(
        Some("3D000"),
        "database \"testdb\" does not exist",
    )));

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::ConnectionError);
    assert!(result.hint().is_none());
    assert_eq!(
        result.error().map(|e| e.message.as_str()),
        Some("database \"testdb\" does not exist")
    );
}

#[tokio::test(start_paused = true)]
async fn hanging_connect_times_out() {
    let connector = FakeConnector::new(Script::ConnectHangs);
    let config = test_config().connect_timeout(Duration::from_secs(3));

    let result = probe::run_with(&connector, &config).await;

    assert_eq!(result.outcome(), Outcome::ConnectionError);
    assert_eq!(result.hint(), Some(Hint::Timeout));
    assert_eq!(result.error().and_then(|e| e.code.as_deref()), Some("ETIMEDOUT"));
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 0);
}

#[tokio::test]
async fn query_failure_still_releases_session() {
    let connector = FakeConnector::new(Script::QueryFails(ProbeFailure::new(
        Some("42501"),
        "permission denied for function inet_server_addr",
    )));

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::QueryError);
    assert!(result.server().is_none());
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_query_times_out_and_releases_session() {
    let connector = FakeConnector::new(Script::QueryHangs);
    let config = test_config().query_timeout(Duration::from_secs(2));

    let result = probe::run_with(&connector, &config).await;

    assert_eq!(result.outcome(), Outcome::QueryError);
    assert_eq!(result.hint(), Some(Hint::QueryTimeout));
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn panicking_query_still_releases_session() {
    let connector = Arc::new(FakeConnector::new(Script::QueryPanics));
    let task_connector = Arc::clone(&connector);

    let joined = tokio::spawn(async move {
        probe::run_with(task_connector.as_ref(), &test_config()).await
    })
    .await;

    assert!(joined.unwrap_err().is_panic());
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.closes(), 1);
}

#[test]
fn sub_second_timeouts_keep_their_precision() {
    let failure = ProbeFailure::timed_out("query", Duration::from_millis(250));
    assert_eq!(failure.message, "query timed out after 250ms");
    assert_eq!(failure.code.as_deref(), Some("ETIMEDOUT"));
}

#[test]
fn server_statement_timeout_gets_no_network_hint() {
    let failure = ProbeFailure::new(Some("57014"), "canceling statement due to statement timeout");
    assert_eq!(failure.hint(), None);
}

#[tokio::test]
async fn close_failure_does_not_change_outcome() {
    let connector = FakeConnector::new(Script::CloseFails);

    let result = probe::run_with(&connector, &test_config()).await;

    assert_eq!(result.outcome(), Outcome::Success);
    assert_eq!(connector.closes(), 1);
}

#[tokio::test]
async fn each_run_releases_exactly_what_it_acquired() {
    let connector = FakeConnector::new(Script::Healthy);
    let config = test_config();

    for _ in 0..3 {
        probe::run_with(&connector, &config).await;
    }

    assert_eq!(connector.connects(), 3);
    assert_eq!(connector.closes(), 3);
}

#[test]
fn exit_codes_are_non_zero_for_failures() {
    assert_eq!(Outcome::Success.exit_code(), 0);
    assert_ne!(Outcome::ConfigurationError.exit_code(), 0);
    assert_ne!(Outcome::ConnectionError.exit_code(), 0);
    assert_ne!(Outcome::QueryError.exit_code(), 0);
}
