//! Typed probe configuration from environment variables.
//!
//! Loads once at startup. Missing required values are *not* a load error:
//! the probe reports them as a configuration outcome so the operator sees
//! the whole picture. Malformed values (a non-numeric port, an unknown TLS
//! mode) fail fast.
//!
//! The password is wrapped in secrecy::SecretString to prevent log leaks.

pub mod secrets;

use crate::error::{Error, Result};
use secrets::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const APPLICATION_NAME: &str = "pgprobe";

/// TLS policy for the probe connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Plaintext connection.
    Off,
    /// Encrypt, but accept any server certificate.
    RequiredInsecure,
    /// Encrypt and verify the certificate chain and host name.
    RequiredVerified,
}

impl TlsMode {
    /// Policy used when `DB_SSL` is unset: managed cloud endpoints and
    /// production environments get encryption, everything else plaintext.
    pub fn default_for(host: &str, environment: &str) -> Self {
        if environment.eq_ignore_ascii_case("production") || is_rds_host(host) {
            TlsMode::RequiredInsecure
        } else {
            TlsMode::Off
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TlsMode::Off => "off",
            TlsMode::RequiredInsecure => "required (certificate not verified)",
            TlsMode::RequiredVerified => "required (certificate verified)",
        };
        f.write_str(s)
    }
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "false" | "0" | "off" | "disable" | "no" => Ok(TlsMode::Off),
            "true" | "1" | "on" | "require" | "required" | "yes" => {
                Ok(TlsMode::RequiredInsecure)
            }
            "verify" | "verify-full" | "verified" => Ok(TlsMode::RequiredVerified),
            other => Err(format!("unknown TLS mode {other:?}")),
        }
    }
}

fn is_rds_host(host: &str) -> bool {
    host.to_ascii_lowercase().contains("rds.amazonaws.com")
}

/// Everything the probe needs to attempt one connection.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsMode,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    /// Deployment environment name (`APP_ENV`, falling back to `NODE_ENV`).
    pub environment: String,
    /// Print full provider error detail in the report.
    pub debug: bool,
    pub log_level: String,
    pub otel_endpoint: Option<String>,
}

impl ProbeConfig {
    /// Build a config with defaults for everything but the four required values.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let host = host.into();
        Self {
            tls: TlsMode::default_for(&host, DEFAULT_ENVIRONMENT),
            host,
            port: DEFAULT_PORT,
            database: database.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            debug: false,
            log_level: "warn".to_string(),
            otel_endpoint: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("DB_HOST").unwrap_or_default();
        let environment = var("APP_ENV")
            .or_else(|| var("NODE_ENV"))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let port = match var("DB_PORT") {
            Some(raw) => parse_port(&raw)?,
            None => DEFAULT_PORT,
        };

        let tls = match var("DB_SSL") {
            Some(raw) => raw.parse::<TlsMode>().map_err(|reason| Error::InvalidVar {
                name: "DB_SSL",
                value: raw,
                reason,
            })?,
            None => TlsMode::default_for(&host, &environment),
        };

        let connect_timeout = match var("DB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => parse_secs("DB_CONNECT_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_CONNECT_TIMEOUT,
        };
        let query_timeout = match var("DB_QUERY_TIMEOUT_SECS") {
            Some(raw) => parse_secs("DB_QUERY_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_QUERY_TIMEOUT,
        };

        Ok(Self {
            host,
            port,
            database: var("DB_NAME").unwrap_or_default(),
            username: var("DB_USER").unwrap_or_default(),
            password: SecretString::from(var("DB_PASSWORD").unwrap_or_default()),
            tls,
            connect_timeout,
            query_timeout,
            environment,
            debug: var("DEBUG").is_some_and(|v| is_truthy(&v)),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
            otel_endpoint: var("OTEL_ENDPOINT"),
        })
    }

    /// Names of the required variables that are empty, in reporting order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("DB_HOST");
        }
        if self.database.trim().is_empty() {
            missing.push("DB_NAME");
        }
        if self.username.trim().is_empty() {
            missing.push("DB_USER");
        }
        if self.password.expose_secret().trim().is_empty() {
            missing.push("DB_PASSWORD");
        }
        missing
    }

    pub fn has_password(&self) -> bool {
        !self.password.expose_secret().trim().is_empty()
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(Error::InvalidVar {
            name: "DB_PORT",
            value: raw.to_string(),
            reason: "port must be non-zero".to_string(),
        }),
        Ok(port) => Ok(port),
        Err(e) => Err(Error::InvalidVar {
            name: "DB_PORT",
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::InvalidVar {
            name,
            value: raw.to_string(),
            reason: "timeout must be at least one second".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(Error::InvalidVar {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
