//! Postgres connection and introspection via SQLx.
//!
//! The probe wants exactly one session, so this opens a bare
//! `PgConnection` instead of a pool.

use crate::config::secrets::ExposeSecret;
use crate::config::{APPLICATION_NAME, ProbeConfig, TlsMode};
use crate::error::Result;
use crate::probe::hint::code;
use crate::probe::{Connector, ProbeFailure, ServerInfo, Session};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Row};
use std::io;

const INTROSPECTION_QUERY: &str = "SELECT version() AS version, \
     current_database()::text AS database, \
     current_user::text AS username, \
     inet_server_addr()::text AS server_addr, \
     inet_client_addr()::text AS client_addr";

/// Opens a single SQLx connection per probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

/// An open Postgres session.
pub struct PgSession {
    conn: PgConnection,
}

impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(&self, config: &ProbeConfig) -> std::result::Result<PgSession, ProbeFailure> {
        let options = connect_options(config);
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| failure_from(&e))?;
        Ok(PgSession { conn })
    }
}

impl Session for PgSession {
    async fn introspect(&mut self) -> std::result::Result<ServerInfo, ProbeFailure> {
        fetch_server_info(&mut self.conn)
            .await
            .map_err(|e| match e {
                crate::error::Error::Database(e) => failure_from(&e),
                other => ProbeFailure::new(None, other.to_string()),
            })
    }

    async fn close(self) -> std::result::Result<(), ProbeFailure> {
        self.conn.close().await.map_err(|e| failure_from(&e))
    }
}

/// Build SQLx connect options from the probe config.
///
/// PG* environment variables and `.pgpass` are ignored so that what the
/// report shows is exactly what gets used.
pub fn connect_options(config: &ProbeConfig) -> PgConnectOptions {
    PgConnectOptions::new_without_pgpass()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username)
        .password(config.password.expose_secret())
        .ssl_mode(ssl_mode(config.tls))
        .application_name(APPLICATION_NAME)
}

pub fn ssl_mode(tls: TlsMode) -> PgSslMode {
    match tls {
        TlsMode::Off => PgSslMode::Disable,
        TlsMode::RequiredInsecure => PgSslMode::Require,
        TlsMode::RequiredVerified => PgSslMode::VerifyFull,
    }
}

async fn fetch_server_info(conn: &mut PgConnection) -> Result<ServerInfo> {
    let row = sqlx::query(INTROSPECTION_QUERY).fetch_one(&mut *conn).await?;
    Ok(ServerInfo {
        version: row.try_get("version")?,
        database: row.try_get("database")?,
        user: row.try_get("username")?,
        server_addr: row.try_get("server_addr")?,
        client_addr: row.try_get("client_addr")?,
    })
}

/// Translate a driver error into a provider code, message, and full detail.
pub fn failure_from(err: &sqlx::Error) -> ProbeFailure {
    let failure = match err {
        sqlx::Error::Database(db) => {
            ProbeFailure::new(db.code().as_deref(), db.message().to_string())
        }
        sqlx::Error::Io(io) => ProbeFailure::new(io_code(io), io.to_string()),
        sqlx::Error::Tls(e) => ProbeFailure::new(None, format!("TLS negotiation failed: {e}")),
        sqlx::Error::PoolTimedOut => ProbeFailure::new(Some(code::TIMED_OUT), err.to_string()),
        other => ProbeFailure::new(None, other.to_string()),
    };
    failure.with_detail(format!("{err:?}"))
}

fn io_code(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some(code::REFUSED),
        io::ErrorKind::TimedOut => Some(code::TIMED_OUT),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Some(code::RESET),
        _ if is_resolver_error(err) => Some(code::DNS),
        _ => None,
    }
}

// Resolver failures surface as uncategorized io errors; only the text
// identifies them.
fn is_resolver_error(err: &io::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("failed to lookup address")
        || msg.contains("name or service not known")
        || msg.contains("nodename nor servname")
        || msg.contains("no such host is known")
        || msg.contains("temporary failure in name resolution")
}
