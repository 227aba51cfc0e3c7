//! Error types for the MDVR bridge.
//!
//! All fallible operations in this crate return [`Result`], whose error type
//! [`BridgeError`] implements [`std::error::Error`] via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Local errors** ([`BridgeError::ValidationError`], [`BridgeError::RangeTooLarge`],
//!   [`BridgeError::UnknownEndpoint`], [`BridgeError::ConfigError`]): raised before any
//!   network I/O, never retried
//! - **Network errors** ([`BridgeError::TransportError`], [`BridgeError::HttpError`]):
//!   retried internally, surfaced only after the retry budget is spent
//! - **Vendor errors** ([`BridgeError::VendorError`], [`BridgeError::AuthenticationFailed`]):
//!   the vendor answered and rejected the request
//!
//! "No data" is not an error: adapter parsers return `None` or empty
//! collections for it.
//!
//! # Examples
//!
//! ```
//! use mdvr_bridge::error::{BridgeError, Result};
//!
//! fn require_device(device_id: &str) -> Result<&str> {
//!     if device_id.is_empty() {
//!         return Err(BridgeError::ValidationError("deviceId must not be empty".to_owned()));
//!     }
//!     Ok(device_id)
//! }
//!
//! assert!(require_device("").is_err());
//! ```

use thiserror::Error;

use crate::client::VendorCodeClass;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while talking to the vendor API.
///
/// # Error Recovery
///
/// - **Local errors**: fix the input or configuration; retrying is pointless
/// - **Transport errors**: the internal retry budget is already spent; retry later
/// - **Vendor errors**: inspect [`BridgeError::vendor_code`] and decide upstream
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Request fields failed local validation.
    ///
    /// Raised when a required field is missing or null, or a domain value is
    /// out of range (channel number, stream type, empty device id).
    ///
    /// # Recovery
    ///
    /// Fix the input. No request was sent.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// A time window exceeds what the vendor endpoint accepts.
    ///
    /// Detailed track queries accept at most 3 days, track date queries at
    /// most 31 days.
    ///
    /// # Recovery
    ///
    /// Split the range into windows no larger than `max`.
    #[error("requested range of {requested} exceeds the maximum of {max}")]
    RangeTooLarge {
        /// Requested span, human readable.
        requested: String,
        /// Maximum accepted span, human readable.
        max: String,
    },

    /// No endpoint with this name exists in the registry.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Endpoint configuration could not be loaded.
    ///
    /// Raised for unreadable files, malformed TOML and any validation failure
    /// while building the registry. A failed load never yields a partial
    /// registry.
    ///
    /// # Recovery
    ///
    /// Correct the configuration file and restart.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The request could not be delivered after all configured attempts.
    ///
    /// Carries the correlation id so the attempt log lines can be found.
    ///
    /// # Recovery
    ///
    /// Check vendor reachability. The call may be retried later.
    #[error("transport failed for call {correlation_id} after {attempts} attempt(s): {message}")]
    TransportError {
        /// Correlation id of the failed call.
        correlation_id: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure observed.
        message: String,
    },

    /// Login failed or the token could not be refreshed.
    ///
    /// # Recovery
    ///
    /// Verify the profile credentials. The triggering call was not sent.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The vendor answered with a non-success code.
    ///
    /// The code is preserved for upstream interpretation. Known classes are
    /// available through [`BridgeError::vendor_class`].
    #[error("vendor error {code}: {message}")]
    VendorError {
        /// Vendor `code` field.
        code: i64,
        /// Vendor `message` field.
        message: String,
    },

    /// The vendor answered with something that is not a valid envelope.
    #[error("invalid vendor response: {0}")]
    InvalidResponse(String),

    /// The local rate limit has no free slot.
    ///
    /// Only returned by non-blocking acquisition.
    ///
    /// # Recovery
    ///
    /// Wait for the window to move or use the blocking acquire.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The vendor gateway answered with a non-2xx HTTP status.
    ///
    /// The vendor itself always answers 200, so this comes from a proxy or
    /// an overloaded gateway. 5xx and 429 are retried.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// HTTP client failure.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BridgeError {
    /// Returns the vendor code carried by a [`BridgeError::VendorError`].
    #[must_use]
    pub fn vendor_code(&self) -> Option<i64> {
        match self {
            Self::VendorError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the class of the vendor code, if any.
    #[must_use]
    pub fn vendor_class(&self) -> Option<VendorCodeClass> {
        self.vendor_code().map(VendorCodeClass::of)
    }

    pub(crate) fn range_too_large(requested: chrono::TimeDelta, max: chrono::TimeDelta) -> Self {
        Self::RangeTooLarge { requested: format_span(requested), max: format_span(max) }
    }
}

fn format_span(span: chrono::TimeDelta) -> String {
    let secs = span.num_seconds();
    if secs % 86_400 == 0 {
        format!("{} day(s)", secs / 86_400)
    } else {
        format!("{secs}s")
    }
}
