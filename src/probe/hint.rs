//! Map provider error signatures to operator hints.
//!
//! Purely diagnostic: a hint never changes the outcome, it only tells the
//! operator where to look. Unknown errors get no hint.

use serde::Serialize;
use std::fmt;

/// Transport-level codes, named the way socket errors are usually reported.
pub mod code {
    pub const DNS: &str = "ENOTFOUND";
    pub const REFUSED: &str = "ECONNREFUSED";
    pub const TIMED_OUT: &str = "ETIMEDOUT";
    pub const RESET: &str = "ECONNRESET";

    /// SQLSTATE `invalid_password`.
    pub const INVALID_PASSWORD: &str = "28P01";
    /// SQLSTATE `invalid_authorization_specification`; pg_hba rejections use it.
    pub const INVALID_AUTHORIZATION: &str = "28000";
}

/// A known failure class with a fixed piece of advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hint {
    DnsResolution,
    ConnectionRefused,
    Timeout,
    /// Connected, but the introspection query did not finish in time.
    QueryTimeout,
    Authentication,
    HostBasedAccess,
}

impl Hint {
    /// Classify an error by its provider code and message.
    ///
    /// Codes are checked first; message fragments catch drivers and
    /// platforms that report the same failure without a stable code.
    pub fn classify(code: Option<&str>, message: &str) -> Option<Hint> {
        let msg = message.to_ascii_lowercase();

        // pg_hba rejections share SQLSTATE 28000 with other failures, and
        // some servers report them as authentication failures, so the
        // message wins here.
        if msg.contains("pg_hba.conf") {
            return Some(Hint::HostBasedAccess);
        }

        match code {
            Some(code::DNS) => return Some(Hint::DnsResolution),
            Some(code::REFUSED) => return Some(Hint::ConnectionRefused),
            Some(code::TIMED_OUT) => return Some(Hint::Timeout),
            Some(code::INVALID_PASSWORD) => return Some(Hint::Authentication),
            _ => {}
        }

        // A SQLSTATE is authoritative: the server answered, so message
        // fragments like "statement timeout" say nothing about the network.
        if code.is_some_and(|c| !c.starts_with('E')) {
            return (code == Some(code::INVALID_AUTHORIZATION)
                && msg.contains("authentication failed"))
            .then_some(Hint::Authentication);
        }

        if DNS_FRAGMENTS.iter().any(|f| msg.contains(f)) {
            Some(Hint::DnsResolution)
        } else if msg.contains("connection refused") {
            Some(Hint::ConnectionRefused)
        } else if msg.contains("timed out") || msg.contains("timeout") {
            Some(Hint::Timeout)
        } else if msg.contains("authentication failed") {
            Some(Hint::Authentication)
        } else {
            None
        }
    }

    /// Narrow a hint for a failure that happened after the session opened.
    pub fn after_connect(self) -> Hint {
        match self {
            Hint::Timeout => Hint::QueryTimeout,
            other => other,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Hint::DnsResolution => "DNS Resolution Error",
            Hint::ConnectionRefused => "Connection Refused",
            Hint::Timeout => "Connection Timeout",
            Hint::QueryTimeout => "Query Timeout",
            Hint::Authentication => "Authentication Error",
            Hint::HostBasedAccess => "Host-Based Authentication Error",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Hint::DnsResolution => {
                "The database host could not be found. Check the DB_HOST value."
            }
            Hint::ConnectionRefused => {
                "The database server refused the connection. Check that the database \
                 is running and accessible on the configured port."
            }
            Hint::Timeout => {
                "The connection attempt timed out. Check that the instance is reachable \
                 from this network and that security groups allow inbound traffic on \
                 the database port."
            }
            Hint::QueryTimeout => {
                "The connection was established, but the introspection query did not \
                 finish in time. The server may be overloaded or the session blocked; \
                 check server load or raise DB_QUERY_TIMEOUT_SECS."
            }
            Hint::Authentication => {
                "Username or password is incorrect. Check the DB_USER and DB_PASSWORD values."
            }
            Hint::HostBasedAccess => {
                "The server rejected this client in pg_hba.conf. Check the server's \
                 host-based access rules, parameter groups, and whether TLS is required."
            }
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.advice())
    }
}

const DNS_FRAGMENTS: &[&str] = &[
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host is known",
    "temporary failure in name resolution",
    "getaddrinfo",
];
