//! Transport abstraction.
//!
//! The client core never touches HTTP directly: it hands a [`VendorRequest`]
//! to a [`Transport`] and gets back the status code and raw body. The
//! production implementation is [`HttpTransport`]; tests plug in scripted
//! transports.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use mdvr_bridge::{
//!     registry::{HttpMethod, RequestFields},
//!     transport::{HttpTransport, Transport, VendorRequest},
//! };
//! use url::Url;
//!
//! # async fn example() -> mdvr_bridge::Result<()> {
//! let transport = HttpTransport::new()?;
//! let url = Url::parse("https://vendor.example.com/api/v1/device/getDeviceStatusList").unwrap();
//! let mut body = RequestFields::new();
//! body.insert("deviceIds".to_owned(), serde_json::json!(["DEV001"]));
//!
//! let response = transport
//!     .send(VendorRequest {
//!         method: HttpMethod::Post,
//!         url: &url,
//!         body: &body,
//!         token: Some("token-from-login"),
//!         timeout: Duration::from_secs(10),
//!         correlation_id: "3f9a1c2e",
//!     })
//!     .await?;
//! println!("Status: {}", response.status);
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;
use std::time::Duration;

use url::Url;

use crate::{
    error::Result,
    registry::{HttpMethod, RequestFields},
};

pub mod config;
pub mod http;

pub use config::{DEFAULT_USER_AGENT, HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Header carrying the vendor session token.
pub const TOKEN_HEADER: &str = "X-Token";

/// One outbound vendor request.
#[derive(Debug, Clone, Copy)]
pub struct VendorRequest<'a> {
    /// HTTP method.
    pub method: HttpMethod,
    /// Full endpoint URL.
    pub url: &'a Url,
    /// Validated request fields.
    pub body: &'a RequestFields,
    /// Session token, absent for login.
    pub token: Option<&'a str>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Correlation id of the logical call.
    pub correlation_id: &'a str,
}

/// Raw answer of the vendor gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers vendor requests.
///
/// Implementations return `Ok` for every HTTP answer regardless of status;
/// `Err` is reserved for requests that got no answer at all (timeouts,
/// refused connections, TLS failures).
pub trait Transport: Send + Sync {
    /// Sends one request.
    ///
    /// # Errors
    ///
    /// Returns error if the request could not be delivered or the response
    /// body could not be read.
    fn send<'a>(
        &'a self,
        request: VendorRequest<'a>,
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_response_success_range() {
        let ok = TransportResponse { status: 200, body: b"{}".to_vec() };
        let gateway = TransportResponse { status: 502, body: b"Bad Gateway".to_vec() };
        let redirect = TransportResponse { status: 302, body: vec![] };

        assert!(ok.is_success());
        assert!(!gateway.is_success());
        assert!(!redirect.is_success());
    }

    #[test]
    fn test_vendor_request_debug() {
        let url = Url::parse("https://vendor.example.com/api/v1/user/login").unwrap();
        let body = RequestFields::new();
        let request = VendorRequest {
            method: HttpMethod::Post,
            url: &url,
            body: &body,
            token: None,
            timeout: Duration::from_secs(15),
            correlation_id: "0a1b2c3d",
        };

        let debug_str = format!("{request:?}");
        assert!(debug_str.contains("VendorRequest"));
        assert!(debug_str.contains("/api/v1/user/login"));
        assert!(debug_str.contains("0a1b2c3d"));
    }
}
