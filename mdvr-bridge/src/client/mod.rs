//! Vendor client core.
//!
//! [`VendorClient::call`] is the single entry point for every vendor
//! operation. It resolves the endpoint, validates the fields, attaches the
//! session token, passes each attempt through the rate limiter and retries
//! transport failures with exponential backoff.
//!
//! Vendor status codes are handled after the envelope is decoded:
//!
//! - 401 and 1008 drop the token, log in again and repeat the call once
//! - 1007 backs off and repeats the call within the retry budget
//! - everything else unsuccessful becomes [`BridgeError::VendorError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mdvr_bridge::{EndpointRegistry, VendorClient, registry::RequestFields};
//! use serde_json::json;
//!
//! # async fn example() -> mdvr_bridge::Result<()> {
//! let registry = Arc::new(EndpointRegistry::from_env()?);
//! let client = VendorClient::new(registry)?;
//!
//! let mut fields = RequestFields::new();
//! fields.insert("deviceIds".to_owned(), json!(["DEV001"]));
//! let response = client.call("device_states", fields).await?;
//! println!("{}", response.data());
//! # Ok(())
//! # }
//! ```

mod envelope;

use std::sync::Arc;

use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};

pub use envelope::{CorrelationId, VendorCodeClass, VendorResponse, extract_path};

use crate::{
    error::{BridgeError, Result},
    registry::{EndpointRegistry, EndpointSpec, RequestFields},
    reliability::{RetryExhausted, RetryPolicy, is_retryable, retry_with_backoff},
    security::{RateLimiter, Token, TokenManager},
    transport::{HttpTransport, Transport, VendorRequest},
};

/// Endpoint name of the vendor logout call.
pub const LOGOUT_ENDPOINT: &str = "user_logout";

/// Client for one vendor profile.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct VendorClient<T = HttpTransport> {
    registry: Arc<EndpointRegistry>,
    transport: T,
    rate_limiter: RateLimiter,
    tokens: TokenManager,
}

impl VendorClient<HttpTransport> {
    /// Creates a client using HTTP settings from the active profile.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(registry: Arc<EndpointRegistry>) -> Result<Self> {
        let transport = HttpTransport::with_config(&registry.profile().http)?;
        Ok(Self::with_transport(registry, transport))
    }
}

impl<T: Transport> VendorClient<T> {
    /// Creates a client on a custom transport.
    #[must_use]
    pub fn with_transport(registry: Arc<EndpointRegistry>, transport: T) -> Self {
        let profile = registry.profile();
        let rate_limiter = RateLimiter::new(profile.rate_limit_per_minute);
        let tokens = TokenManager::new(profile.token_ttl);
        Self { registry, transport, rate_limiter, tokens }
    }

    /// The registry this client resolves endpoints in.
    #[must_use]
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// The token cache.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Calls a vendor endpoint.
    ///
    /// Returns the decoded response only if the endpoint's success predicate
    /// holds.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::UnknownEndpoint`] for an unregistered name
    /// - [`BridgeError::ValidationError`] for missing required fields, raised
    ///   before any network traffic
    /// - [`BridgeError::AuthenticationFailed`] if no token can be obtained
    /// - [`BridgeError::TransportError`] once transport retries are spent
    /// - [`BridgeError::InvalidResponse`] for a body that is not an envelope
    /// - [`BridgeError::VendorError`] for any other unsuccessful vendor code
    ///
    /// # Recovery
    ///
    /// `VendorError` carries the vendor code; branch on
    /// [`BridgeError::vendor_class`] to tell missing resources from rule
    /// violations. `TransportError` is safe to retry later for read-only
    /// endpoints.
    pub async fn call(&self, endpoint: &str, fields: RequestFields) -> Result<VendorResponse> {
        let spec = self.registry.resolve(endpoint)?;
        let body = spec.prepare_body(fields)?;
        let correlation_id = CorrelationId::new();
        let span = info_span!("vendor_call", endpoint = %spec.name, correlation_id = %correlation_id);

        self.call_resolved(spec, &body, &correlation_id).instrument(span).await
    }

    async fn call_resolved(
        &self,
        spec: &EndpointSpec,
        body: &RequestFields,
        correlation_id: &CorrelationId,
    ) -> Result<VendorResponse> {
        let policy = self.registry.retry_policy_for(spec);
        let mut reauthenticated = false;
        let mut throttled = 0;

        loop {
            let token = if spec.requires_auth { Some(self.authenticate().await?) } else { None };
            let response =
                self.send(spec, body, token.as_ref().map(Token::value), correlation_id, &policy).await?;

            if response.is_success(spec) {
                debug!(code = response.code, "vendor call succeeded");
                return Ok(response);
            }

            match response.class() {
                VendorCodeClass::Unauthorized if !reauthenticated && spec.requires_auth => {
                    warn!(code = response.code, "vendor rejected session token, logging in again");
                    if let Some(token) = &token {
                        self.tokens.invalidate_if(token).await;
                    }
                    reauthenticated = true;
                }
                VendorCodeClass::RateLimited if throttled < policy.max_retries => {
                    let delay = policy.delay_for_attempt(throttled);
                    throttled += 1;
                    warn!(
                        code = response.code,
                        delay_ms = delay.as_millis(),
                        "vendor rate limit hit, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                class => {
                    warn!(code = response.code, ?class, message = %response.message, "vendor rejected call");
                    return Err(response.to_error());
                }
            }
        }
    }

    /// Sends one logical request with transport retries and decodes it.
    async fn send(
        &self,
        spec: &EndpointSpec,
        body: &RequestFields,
        token: Option<&str>,
        correlation_id: &CorrelationId,
        policy: &RetryPolicy,
    ) -> Result<VendorResponse> {
        let url = self.registry.url_for(spec)?;
        let request = VendorRequest {
            method: spec.method,
            url: &url,
            body,
            token,
            timeout: self.registry.timeout_for(spec),
            correlation_id: correlation_id.as_str(),
        };
        let transport = &self.transport;
        let limiter = &self.rate_limiter;

        let result = retry_with_backoff(policy, is_retryable, move || async move {
            limiter.acquire().await;
            let response = transport.send(request).await?;
            if response.is_success() {
                Ok(response.body)
            } else {
                Err(BridgeError::HttpStatus(response.status))
            }
        })
        .await;

        match result {
            Ok(bytes) => VendorResponse::from_slice(spec, correlation_id.clone(), &bytes),
            Err(RetryExhausted { error: error @ BridgeError::InvalidResponse(_), .. }) => Err(error),
            Err(RetryExhausted { error, attempts }) => Err(BridgeError::TransportError {
                correlation_id: correlation_id.to_string(),
                attempts,
                message: error.to_string(),
            }),
        }
    }

    /// Returns a valid session token, logging in if none is cached.
    ///
    /// Concurrent callers share a single login.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AuthenticationFailed`] if the login call fails.
    pub async fn authenticate(&self) -> Result<Token> {
        self.tokens.get_token(|| self.login()).await
    }

    /// Performs the login call and extracts the token string.
    async fn login(&self) -> Result<String> {
        let spec = self.registry.login_endpoint()?;
        let credentials = &self.registry.profile().credentials;
        let account = credentials.username.resolve()?;
        let password = credentials.password.resolve()?;

        let mut fields = RequestFields::new();
        fields.insert("account".to_owned(), Value::String(account.to_string()));
        fields.insert("password".to_owned(), Value::String(password.to_string()));
        let body = spec.prepare_body(fields)?;

        let correlation_id = CorrelationId::new();
        let policy = self.registry.retry_policy_for(spec);
        let span = info_span!("vendor_login", endpoint = %spec.name, correlation_id = %correlation_id);

        async {
            let response = self.send(spec, &body, None, &correlation_id, &policy).await?;
            if !response.is_success(spec) {
                return Err(BridgeError::AuthenticationFailed(format!(
                    "vendor code {}: {}",
                    response.code, response.message
                )));
            }

            let token = response.payload(spec).and_then(Value::as_str).ok_or_else(|| {
                BridgeError::AuthenticationFailed(format!(
                    "login response has no token at '{}'",
                    spec.response.data_path
                ))
            })?;
            info!("vendor login succeeded");
            Ok(token.to_owned())
        }
        .instrument(span)
        .await
    }

    /// Ends the vendor session and drops the cached token.
    ///
    /// Does nothing if no session is open. The token is dropped even if the
    /// vendor call fails.
    ///
    /// # Errors
    ///
    /// Returns the error of the logout call.
    pub async fn logout(&self) -> Result<()> {
        if self.tokens.current().await.is_none() {
            debug!("no open vendor session, skipping logout");
            return Ok(());
        }

        let result = self.call(LOGOUT_ENDPOINT, RequestFields::new()).await;
        self.tokens.invalidate().await;
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use serde_json::json;

    use super::*;
    use crate::transport::TransportResponse;

    const CONFIG: &str = r#"
        [profiles.test]
        base_url = "https://vendor.example.com"
        username = "fleet"
        password = "secret"
        retries = 2
        retry_delay_secs = 0.01
        rate_limit_per_minute = 0

        [endpoints.user_login]
        path = "/api/v1/user/login"
        requires_auth = false
        required = ["account", "password"]
        response = { data_path = "data.token" }

        [endpoints.user_logout]
        path = "/api/v1/user/logout"

        [endpoints.device_states]
        path = "/api/v1/device/getDeviceStatusList"
        required = ["deviceIds"]
    "#;

    #[derive(Debug, Clone)]
    struct Sent {
        path: String,
        token: Option<String>,
        body: Value,
    }

    /// Replays canned answers in order and records what was sent.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        answers: Mutex<VecDeque<Result<TransportResponse>>>,
        sent: Mutex<Vec<Sent>>,
    }

    impl ScriptedTransport {
        fn answer(self, status: u16, body: Value) -> Self {
            self.answers
                .lock()
                .unwrap()
                .push_back(Ok(TransportResponse { status, body: body.to_string().into_bytes() }));
            self
        }

        fn fail(self, error: BridgeError) -> Self {
            self.answers.lock().unwrap().push_back(Err(error));
            self
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send<'a>(&'a self, request: VendorRequest<'a>) -> Result<TransportResponse> {
            self.sent.lock().unwrap().push(Sent {
                path: request.url.path().to_owned(),
                token: request.token.map(str::to_owned),
                body: Value::Object(request.body.clone()),
            });
            self.answers.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(BridgeError::InvalidResponse("script exhausted".to_owned()))
            })
        }

        fn protocol_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn client(transport: ScriptedTransport) -> VendorClient<ScriptedTransport> {
        let registry = Arc::new(EndpointRegistry::load(CONFIG).unwrap());
        VendorClient::with_transport(registry, transport)
    }

    fn login_ok(token: &str) -> Value {
        json!({"code": 200, "message": "success", "data": {"token": token}})
    }

    fn states_fields() -> RequestFields {
        let mut fields = RequestFields::new();
        fields.insert("deviceIds".to_owned(), json!(["DEV001"]));
        fields
    }

    #[tokio::test]
    async fn test_call_logs_in_then_sends_token() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok-1"))
            .answer(200, json!({"code": 200, "data": [{"deviceId": "DEV001", "state": 1}]}));
        let client = client(transport);

        let response = client.call("device_states", states_fields()).await.unwrap();
        assert_eq!(response.data()[0]["state"], json!(1));

        let sent = client.transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].path, "/api/v1/user/login");
        assert_eq!(sent[0].token, None);
        assert_eq!(sent[0].body, json!({"account": "fleet", "password": "secret"}));
        assert_eq!(sent[1].token.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_missing_required_field_never_hits_network() {
        let client = client(ScriptedTransport::default());

        let err = client.call("device_states", RequestFields::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::ValidationError(ref m) if m.contains("deviceIds")));
        assert!(client.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let client = client(ScriptedTransport::default());
        let err = client.call("gps_teleport", RequestFields::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnknownEndpoint(ref n) if n == "gps_teleport"));
    }

    #[tokio::test]
    async fn test_token_rejection_relogs_once() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("old"))
            .answer(200, json!({"code": 1008, "message": "token expired"}))
            .answer(200, login_ok("new"))
            .answer(200, json!({"code": 200, "data": []}));
        let client = client(transport);

        client.call("device_states", states_fields()).await.unwrap();

        let sent = client.transport.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3].token.as_deref(), Some("new"));
        assert_eq!(client.tokens().login_count(), 2);
    }

    #[tokio::test]
    async fn test_second_token_rejection_surfaces() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("a"))
            .answer(200, json!({"code": 401, "message": "unauthorized"}))
            .answer(200, login_ok("b"))
            .answer(200, json!({"code": 401, "message": "unauthorized"}));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        assert_eq!(err.vendor_code(), Some(401));
        assert_eq!(client.transport.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_vendor_error_passes_through_without_retry() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(200, json!({"code": 1102, "message": "device offline"}));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        assert!(matches!(err, BridgeError::VendorError { code: 1102, ref message } if message == "device offline"));
        assert_eq!(client.transport.sent().len(), 2);
        assert!(client.tokens().current().await.is_some());
    }

    #[tokio::test]
    async fn test_server_errors_retried_then_succeed() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(503, json!("unavailable"))
            .answer(200, json!({"code": 200, "data": []}));
        let client = client(transport);

        client.call("device_states", states_fields()).await.unwrap();
        assert_eq!(client.transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_after_retries() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(502, json!(null))
            .answer(502, json!(null))
            .answer(502, json!(null));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        match err {
            BridgeError::TransportError { correlation_id, attempts, message } => {
                assert_eq!(correlation_id.len(), 8);
                assert_eq!(attempts, 3);
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_status_not_retried() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(404, json!(null));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        assert!(matches!(err, BridgeError::TransportError { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_vendor_rate_limit_backs_off() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(200, json!({"code": 1007, "message": "too many requests"}))
            .answer(200, json!({"code": 200, "data": []}));
        let client = client(transport);

        client.call("device_states", states_fields()).await.unwrap();
        assert_eq!(client.transport.sent().len(), 3);
        assert_eq!(client.tokens().login_count(), 1);
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let transport = ScriptedTransport::default().answer(200, login_ok("tok"));
        transport
            .answers
            .lock()
            .unwrap()
            .push_back(Ok(TransportResponse { status: 200, body: b"<html>oops</html>".to_vec() }));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_failed_login_is_authentication_failed() {
        let transport = ScriptedTransport::default()
            .answer(200, json!({"code": 1001, "message": "wrong password"}));
        let client = client(transport);

        let err = client.call("device_states", states_fields()).await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationFailed(ref m) if m.contains("wrong password")));
    }

    #[tokio::test]
    async fn test_login_without_token_is_authentication_failed() {
        let transport = ScriptedTransport::default().answer(200, json!({"code": 200, "data": {}}));
        let client = client(transport);

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationFailed(ref m) if m.contains("data.token")));
    }

    #[tokio::test]
    async fn test_login_transport_failure_is_authentication_failed() {
        let transport = ScriptedTransport::default()
            .fail(BridgeError::HttpStatus(503))
            .fail(BridgeError::HttpStatus(503))
            .fail(BridgeError::HttpStatus(503));
        let client = client(transport);

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_logout_drops_token() {
        let transport = ScriptedTransport::default()
            .answer(200, login_ok("tok"))
            .answer(200, json!({"code": 200}));
        let client = client(transport);

        client.authenticate().await.unwrap();
        client.logout().await.unwrap();

        assert!(client.tokens().current().await.is_none());
        let sent = client.transport.sent();
        assert_eq!(sent[1].path, "/api/v1/user/logout");
        assert_eq!(sent[1].token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_noop() {
        let client = client(ScriptedTransport::default());
        client.logout().await.unwrap();
        assert!(client.transport.sent().is_empty());
    }
}
