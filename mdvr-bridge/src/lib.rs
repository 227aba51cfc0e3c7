//! MDVR Bridge: config-driven client for dashcam/MDVR vendor APIs
//!
//! Fleet platforms talk to mobile digital video recorders through a vendor
//! HTTP API: every call is a JSON POST carrying a session token, and every
//! answer is a `{code, message, ts, data}` envelope. This crate wraps that
//! API behind a small, typed surface.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ adapters: gps, device, media, task, statistics,          │
//! │           forwarding  (build_* → fields, parse_* → DTOs) │
//! └────────────┬──────────────────────────────▲──────────────┘
//!              │ RequestFields                │ VendorResponse
//! ┌────────────▼──────────────────────────────┴──────────────┐
//! │ client::VendorClient::call(endpoint, fields)             │
//! │   registry ─ rate limiter ─ token manager ─ retry        │
//! └────────────┬─────────────────────────────────────────────┘
//!              │ HTTPS + X-Token
//! ┌────────────▼────────┐
//! │  Vendor MDVR API    │
//! └─────────────────────┘
//! ```
//!
//! Endpoints are not hard-coded: [`EndpointRegistry`] loads paths, required
//! fields, defaults, timeouts, retry budgets and response units from a TOML
//! document. Adapters never perform I/O. They turn typed inputs into request
//! fields and turn envelopes into DTOs from [`models`], so the same adapter
//! works against any transport.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mdvr_bridge::{
//!     EndpointRegistry, VendorClient,
//!     adapters::{ApiVersion, GpsAdapter},
//! };
//!
//! # async fn example() -> mdvr_bridge::Result<()> {
//! let registry = Arc::new(EndpointRegistry::from_env()?);
//! let client = VendorClient::new(Arc::clone(&registry))?;
//! let gps = GpsAdapter::new(registry);
//!
//! let version = ApiVersion::V2;
//! let fields = gps.build_latest_gps_request(version, "DEV001", chrono::Utc::now())?;
//! let response = client.call(version.latest_endpoint(), fields).await?;
//!
//! if let Some(fix) = gps.parse_latest_gps_response(version, "DEV001", &response)? {
//!     println!("{} at {:?}", fix.device_id, fix.timestamp_ms);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`registry`]: endpoint registry and profile configuration
//! - [`client`]: the `call` pipeline, envelope decoding, vendor code classes
//! - [`adapters`]: request builders and response parsers per domain
//! - [`models`]: normalized DTOs returned by the adapters
//! - [`security`]: sliding-window rate limiter and session token cache
//! - [`reliability`]: exponential backoff for transport failures
//! - [`transport`]: HTTP transport abstraction
//! - [`error`]: error types
//!
//! # Configuration
//!
//! [`EndpointRegistry::from_env`] reads the file named by `MDVR_API_CONFIG`
//! (default `config/vendor_api.toml`) and selects the profile named by
//! `MDVR_API_PROFILE`. Credentials are read from the environment variables
//! the profile names and are zeroized when dropped.
//!
//! # Error Handling
//!
//! All operations return [`Result<T, BridgeError>`](error::Result). Vendor
//! failures keep their numeric code:
//!
//! ```rust,no_run
//! use mdvr_bridge::{BridgeError, VendorClient, client::VendorCodeClass, registry::RequestFields};
//!
//! # async fn example(client: &VendorClient) {
//! match client.call("device_states", RequestFields::new()).await {
//!     Ok(response) => println!("{}", response.data()),
//!     Err(BridgeError::ValidationError(msg)) => eprintln!("bad request: {msg}"),
//!     Err(BridgeError::VendorError { code, message }) => {
//!         if VendorCodeClass::of(code) == VendorCodeClass::NotFoundOrInvalid {
//!             eprintln!("unknown device: {message}");
//!         }
//!     }
//!     Err(e) => eprintln!("call failed: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and httpmock"
)]

pub mod adapters;
pub mod client;
pub mod error;
pub mod models;
pub mod registry;
pub mod reliability;
pub mod security;
pub mod transport;

pub use client::VendorClient;
pub use error::{BridgeError, Result};
pub use registry::EndpointRegistry;
