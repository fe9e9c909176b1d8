//! Rendering of probe configuration and results for the operator.
//!
//! The text report is what a person reads in a terminal or a container log;
//! the JSON document carries the same information for scripts.

use crate::config::ProbeConfig;
use crate::config::secrets;
use crate::probe::{Outcome, ProbeResult};
use serde::Serialize;
use std::fmt;

/// The configuration as it is safe to show: the password is reduced to a flag.
#[derive(Debug, Serialize)]
pub struct ConfigSummary<'a> {
    pub host: &'a str,
    pub port: u16,
    pub database: &'a str,
    pub username: &'a str,
    pub password_set: bool,
    pub tls: crate::config::TlsMode,
    pub environment: &'a str,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

impl<'a> ConfigSummary<'a> {
    pub fn new(config: &'a ProbeConfig) -> Self {
        Self {
            host: &config.host,
            port: config.port,
            database: &config.database,
            username: &config.username,
            password_set: config.has_password(),
            tls: config.tls,
            environment: &config.environment,
            connect_timeout_secs: config.connect_timeout.as_secs(),
            query_timeout_secs: config.query_timeout.as_secs(),
        }
    }
}

impl fmt::Display for ConfigSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password_set {
            secrets::SET
        } else {
            secrets::NOT_SET
        };
        writeln!(f, "📊 Configuration:")?;
        writeln!(f, "   DB_HOST:      {}", secrets::or_not_set(self.host))?;
        writeln!(f, "   DB_PORT:      {}", self.port)?;
        writeln!(f, "   DB_NAME:      {}", secrets::or_not_set(self.database))?;
        writeln!(f, "   DB_USER:      {}", secrets::or_not_set(self.username))?;
        writeln!(f, "   DB_PASSWORD:  {password}")?;
        writeln!(f, "   TLS:          {}", self.tls)?;
        writeln!(f, "   Environment:  {}", self.environment)?;
        writeln!(
            f,
            "   Timeouts:     connect {}s, query {}s",
            self.connect_timeout_secs, self.query_timeout_secs
        )
    }
}

/// Full human-readable report: configuration summary followed by the result.
pub struct Report<'a> {
    config: &'a ProbeConfig,
    result: &'a ProbeResult,
}

impl<'a> Report<'a> {
    pub fn new(config: &'a ProbeConfig, result: &'a ProbeResult) -> Self {
        Self { config, result }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;

        writeln!(f, "🔍 PostgreSQL connectivity probe")?;
        writeln!(f, "================================")?;
        writeln!(f)?;
        write!(f, "{}", ConfigSummary::new(self.config))?;
        writeln!(f)?;

        match result.outcome() {
            Outcome::Success => {
                writeln!(f, "✅ Connection successful! ({} ms)", result.elapsed_ms())?;
                if let Some(server) = result.server() {
                    writeln!(f)?;
                    writeln!(f, "📋 Database Information:")?;
                    writeln!(f, "   Version:    {}", server.version)?;
                    writeln!(f, "   Database:   {}", server.database)?;
                    writeln!(f, "   User:       {}", server.user)?;
                    if let Some(ref addr) = server.server_addr {
                        writeln!(f, "   Server IP:  {addr}")?;
                    }
                    if let Some(ref addr) = server.client_addr {
                        writeln!(f, "   Client IP:  {addr}")?;
                    }
                }
                return Ok(());
            }
            Outcome::ConfigurationError => {
                writeln!(
                    f,
                    "❌ Missing required environment variables: {}",
                    result.missing_fields().join(", ")
                )?;
                writeln!(f, "💡 Set them in the environment or in a .env file.")?;
                return Ok(());
            }
            Outcome::ConnectionError => writeln!(f, "❌ Database connection failed!")?,
            Outcome::QueryError => {
                writeln!(f, "❌ Connected, but the introspection query failed!")?
            }
        }

        if let Some(hint) = result.hint() {
            writeln!(f)?;
            writeln!(f, "🔎 {}:", hint.title())?;
            writeln!(f, "   {}", hint.advice())?;
        }

        if let Some(error) = result.error() {
            writeln!(f)?;
            writeln!(f, "📝 Error Details:")?;
            writeln!(f, "   Code:     {}", error.code.as_deref().unwrap_or("-"))?;
            writeln!(f, "   Message:  {}", error.message)?;
            if self.config.debug
                && let Some(ref detail) = error.detail
            {
                writeln!(f)?;
                writeln!(f, "🐛 Debug Info (full error):")?;
                writeln!(f, "   {detail}")?;
            }
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    config: ConfigSummary<'a>,
    result: &'a ProbeResult,
}

/// Render the configuration summary and result as one pretty JSON document.
///
/// Full error detail is included only in debug mode.
pub fn to_json(config: &ProbeConfig, result: &ProbeResult) -> serde_json::Result<String> {
    let mut doc = serde_json::to_value(JsonReport {
        config: ConfigSummary::new(config),
        result,
    })?;
    if !config.debug
        && let Some(error) = doc.pointer_mut("/result/error").and_then(|e| e.as_object_mut())
    {
        error.remove("detail");
    }
    serde_json::to_string_pretty(&doc)
}
