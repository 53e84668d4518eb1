//! Core record types for idquery.
//!
//! This module defines the structured user record produced by the line
//! decoder and consumed by the store and lookup layers.

use serde::{Deserialize, Serialize};

/// Placeholder used for absent or null email and IP fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Field values that mean "no email was recorded".
const NULL_EMAIL_MARKERS: &[&str] = &["", "null", "NULL"];

/// Field values that mean "no IP was recorded".
const NULL_IP_MARKERS: &[&str] = &["null", "NULL"];

/// One decoded user record.
///
/// Records are immutable once built; a refresh replaces the whole mapping
/// rather than editing records in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRecord {
    /// Primary key of the record.
    pub user_id: String,

    /// Decoded email address, [`NOT_AVAILABLE`], or the raw encoded text
    /// when decoding failed.
    pub email: String,

    /// IP address text exactly as it appeared, or [`NOT_AVAILABLE`].
    pub ip: String,

    /// The email field as it appeared in the source line (usually base64).
    pub encoded: String,
}

impl UserRecord {
    /// Create a new record from already-resolved field values.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        ip: impl Into<String>,
        encoded: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            ip: ip.into(),
            encoded: encoded.into(),
        }
    }

    /// Check whether the email field holds a real value.
    #[must_use]
    pub fn has_email(&self) -> bool {
        self.email != NOT_AVAILABLE
    }

    /// Check whether the IP field holds a real value.
    #[must_use]
    pub fn has_ip(&self) -> bool {
        self.ip != NOT_AVAILABLE
    }

    /// Check whether the email could not be decoded and was kept verbatim.
    ///
    /// An empty `encoded` field never counts as a fallback.
    #[must_use]
    pub fn email_is_raw(&self) -> bool {
        self.has_email() && !self.encoded.is_empty() && self.email == self.encoded
    }
}

/// Check whether an email field value marks a missing email.
#[must_use]
pub fn is_null_email(value: &str) -> bool {
    NULL_EMAIL_MARKERS.contains(&value)
}

/// Normalize an IP field value, mapping null markers to [`NOT_AVAILABLE`].
#[must_use]
pub fn normalize_ip(value: &str) -> String {
    if NULL_IP_MARKERS.contains(&value) {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}
