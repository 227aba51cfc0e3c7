//! HTTP transport implementation.
//!
//! Sends vendor requests with reqwest. POST and PUT carry the fields as a
//! JSON body; GET and DELETE send them as query parameters.

use std::sync::LazyLock;

use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use tracing::{debug, instrument};

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{BridgeError, Result},
    registry::HttpMethod,
    transport::{TOKEN_HEADER, Transport, TransportResponse, VendorRequest},
};

/// Default HTTP client with connection pooling enabled.
///
/// Shared by every [`HttpTransport::new`] instance so they share one pool.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> =
    LazyLock::new(|| build_client(&HttpConfig::default()).unwrap_or_else(|_| Client::new()));

fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.as_str());

    builder = match config.http_version {
        HttpVersion::Http1 => builder.http1_only(),
        HttpVersion::Http2 => builder.http2_prior_knowledge(),
        HttpVersion::Auto => builder,
    };

    builder.build().map_err(BridgeError::HttpError)
}

/// Rejects header values that could split the request.
fn validate_header_value(name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(BridgeError::InvalidResponse(format!(
            "{name} value contains control characters"
        )));
    }
    Ok(())
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// # Examples
///
/// ```
/// use mdvr_bridge::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config = HttpConfig { http_version: HttpVersion::Http1, ..HttpConfig::default() };
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a transport on the shared default client.
    ///
    /// # Errors
    ///
    /// This method is infallible but returns `Result` for API consistency.
    pub fn new() -> Result<Self> {
        Ok(Self { client: DEFAULT_HTTP_CLIENT.clone(), http_version: HttpVersion::Auto })
    }

    /// Creates a transport with its own client.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the client cannot be
    /// built.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { client: build_client(config)?, http_version: config.http_version })
    }

    fn build(&self, request: &VendorRequest<'_>) -> Result<RequestBuilder> {
        let url = request.url.clone();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url).query(&query_pairs(request)),
            HttpMethod::Delete => self.client.delete(url).query(&query_pairs(request)),
            HttpMethod::Post => self.client.post(url).json(request.body),
            HttpMethod::Put => self.client.put(url).json(request.body),
        };

        if request.method.has_json_body() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        if let Some(token) = request.token {
            validate_header_value(TOKEN_HEADER, token)?;
            builder = builder.header(TOKEN_HEADER, token);
        }

        Ok(builder.timeout(request.timeout))
    }
}

/// Flattens fields to query pairs. Arrays repeat the key.
fn query_pairs(request: &VendorRequest<'_>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(request.body.len());
    for (name, value) in request.body {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::String(s) => pairs.push((name.clone(), s.clone())),
            serde_json::Value::Array(items) => {
                for item in items {
                    let text = match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    pairs.push((name.clone(), text));
                }
            }
            other => pairs.push((name.clone(), other.to_string())),
        }
    }
    pairs
}

impl Transport for HttpTransport {
    #[instrument(
        skip(self, request),
        fields(
            method = %request.method,
            path = request.url.path(),
            correlation_id = request.correlation_id,
            authenticated = request.token.is_some()
        )
    )]
    async fn send<'a>(&'a self, request: VendorRequest<'a>) -> Result<TransportResponse> {
        let response = self.build(&request)?.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(status, bytes = body.len(), "vendor responded");

        Ok(TransportResponse { status, body })
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::registry::RequestFields;

    fn fields(value: serde_json::Value) -> RequestFields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => RequestFields::new(),
        }
    }

    fn request<'a>(
        method: HttpMethod,
        url: &'a Url,
        body: &'a RequestFields,
        token: Option<&'a str>,
    ) -> VendorRequest<'a> {
        VendorRequest {
            method,
            url,
            body,
            token,
            timeout: Duration::from_secs(5),
            correlation_id: "deadbeef",
        }
    }

    #[test]
    fn test_http_transport_new() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.protocol_name(), "http");
    }

    #[test]
    fn test_http_transport_rejects_invalid_config() {
        let config = HttpConfig { connect_timeout_secs: 0, ..HttpConfig::default() };
        assert!(HttpTransport::with_config(&config).is_err());
    }

    #[test]
    fn test_query_pairs_flatten_arrays() {
        let url = Url::parse("http://localhost/api").unwrap();
        let body = fields(json!({"deviceIds": ["A", "B"], "page": 1, "skip": null}));
        let pairs = query_pairs(&request(HttpMethod::Get, &url, &body, None));

        assert!(pairs.contains(&("deviceIds".to_owned(), "A".to_owned())));
        assert!(pairs.contains(&("deviceIds".to_owned(), "B".to_owned())));
        assert!(pairs.contains(&("page".to_owned(), "1".to_owned())));
        assert_eq!(pairs.len(), 3);
    }

    #[tokio::test]
    async fn test_post_sends_json_and_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/device/getDeviceStatusList")
                .header("content-type", "application/json")
                .header("X-Token", "tok-123")
                .json_body(json!({"deviceIds": ["DEV001"]}));
            then.status(200).json_body(json!({"code": 200, "message": "ok", "data": {}}));
        });

        let url = Url::parse(&server.url("/api/v1/device/getDeviceStatusList")).unwrap();
        let body = fields(json!({"deviceIds": ["DEV001"]}));
        let transport = HttpTransport::new().unwrap();

        let response =
            transport.send(request(HttpMethod::Post, &url, &body, Some("tok-123"))).await.unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/user/login");
            then.status(502).body("Bad Gateway");
        });

        let url = Url::parse(&server.url("/api/v1/user/login")).unwrap();
        let body = RequestFields::new();
        let transport = HttpTransport::new().unwrap();

        let response = transport.send(request(HttpMethod::Post, &url, &body, None)).await.unwrap();
        assert_eq!(response.status, 502);
        assert_eq!(response.body, b"Bad Gateway");
    }

    #[tokio::test]
    async fn test_get_sends_query_parameters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v1/org/getTree").query_param("companyId", "42");
            then.status(200).json_body(json!({"code": 200}));
        });

        let url = Url::parse(&server.url("/api/v1/org/getTree")).unwrap();
        let body = fields(json!({"companyId": 42}));
        let transport = HttpTransport::new().unwrap();

        transport.send(request(HttpMethod::Get, &url, &body, Some("t"))).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_token_with_crlf_rejected() {
        let url = Url::parse("http://127.0.0.1:9/api").unwrap();
        let body = RequestFields::new();
        let transport = HttpTransport::new().unwrap();

        let err = transport
            .send(request(HttpMethod::Post, &url, &body, Some("tok\r\nX-Evil: 1")))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        // Port 9 (discard) is closed on test machines.
        let url = Url::parse("http://127.0.0.1:9/api").unwrap();
        let body = RequestFields::new();
        let transport = HttpTransport::new().unwrap();

        let err = transport.send(request(HttpMethod::Post, &url, &body, None)).await.unwrap_err();
        assert!(matches!(err, BridgeError::HttpError(_)));
        assert!(crate::reliability::is_retryable(&err));
    }
}
