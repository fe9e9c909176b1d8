//! Secret handling utilities.
//!
//! Re-exports secrecy types and provides the markers used when the
//! configuration summary is printed.

pub use secrecy::{ExposeSecret, SecretString};

/// Marker printed for a secret that has a value. The value itself never is.
pub const SET: &str = "✅ SET";
/// Marker printed for a required value that is missing.
pub const NOT_SET: &str = "❌ NOT SET";

/// Show a plain value, or the not-set marker when it is empty.
pub fn or_not_set(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_SET
    } else {
        value
    }
}
