//! Raw configuration model and load-time validation.
//!
//! The TOML document is deserialized into the structs below, then checked
//! and converted into typed [`EndpointSpec`]s and a [`Profile`]. Nothing in
//! this module talks to the network.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Duration,
};

use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use super::endpoint::{
    EndpointSpec, HttpMethod, RequestFields, ResponseSpec, SuccessPredicate, UnitSpec,
};
use crate::{
    error::{BridgeError, Result},
    transport::HttpConfig,
};

/// Root of a registry configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryDocument {
    /// Profile used when none is requested explicitly.
    #[serde(default)]
    pub active_profile: Option<String>,

    /// Connection profiles by name.
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Endpoint definitions by name, shared by all profiles.
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Per-profile connection settings and defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Vendor base URL.
    pub base_url: String,

    /// Inline login account.
    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable holding the login account.
    #[serde(default)]
    pub username_env: Option<String>,

    /// Inline password. Prefer `password_env`.
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Default request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Default retry count.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Default initial retry delay in seconds.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,

    /// Upper bound for a single backoff delay in seconds.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: f64,

    /// Outbound requests per minute, 0 disables limiting.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Assumed token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Name of the login endpoint.
    #[serde(default = "default_login_endpoint")]
    pub login_endpoint: String,

    /// HTTP connection settings.
    #[serde(default)]
    pub http: HttpConfig,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> f64 {
    1.0
}

const fn default_max_retry_delay_secs() -> f64 {
    30.0
}

const fn default_rate_limit_per_minute() -> u32 {
    60
}

// Vendor tokens last 24h; refresh an hour early.
const fn default_token_ttl_secs() -> u64 {
    23 * 3600
}

fn default_login_endpoint() -> String {
    "user_login".to_owned()
}

/// Raw endpoint entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Path below the base URL.
    pub path: String,

    /// HTTP method, POST when omitted.
    #[serde(default)]
    pub method: HttpMethod,

    /// Timeout override in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Retry count override.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Retry delay override in seconds.
    #[serde(default)]
    pub retry_delay_secs: Option<f64>,

    /// Required request fields.
    #[serde(default)]
    pub required: Vec<String>,

    /// Optional request fields with defaults.
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,

    /// Response shape.
    #[serde(default)]
    pub response: ResponseConfig,

    /// Whether the token header is attached.
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,

    /// Units of response fields.
    #[serde(default)]
    pub units: UnitSpec,
}

const fn default_requires_auth() -> bool {
    true
}

/// Raw response shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    /// Dot path of the payload.
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Envelope field holding the status code.
    #[serde(default = "default_success_field")]
    pub success_field: String,

    /// Codes meaning success.
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<i64>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            success_field: default_success_field(),
            success_codes: default_success_codes(),
        }
    }
}

fn default_data_path() -> String {
    "data".to_owned()
}

fn default_success_field() -> String {
    "code".to_owned()
}

fn default_success_codes() -> Vec<i64> {
    vec![200]
}

/// Where a credential comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Value written in the configuration file.
    Inline(Zeroizing<String>),
    /// Name of an environment variable read at login time.
    Env(String),
}

impl CredentialSource {
    /// Reads the credential value.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AuthenticationFailed`] if the environment
    /// variable is unset or empty.
    pub fn resolve(&self) -> Result<Zeroizing<String>> {
        match self {
            Self::Inline(value) => Ok(value.clone()),
            Self::Env(name) => match std::env::var(name) {
                Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value)),
                _ => Err(BridgeError::AuthenticationFailed(format!(
                    "environment variable {name} is not set"
                ))),
            },
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
            Self::Env(name) => f.debug_tuple("Env").field(name).finish(),
        }
    }
}

/// Login credentials of a profile.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login account.
    pub username: CredentialSource,
    /// Login password.
    pub password: CredentialSource,
}

/// Validated profile settings.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Profile name.
    pub name: String,
    /// Vendor base URL.
    pub base_url: Url,
    /// Login credentials.
    pub credentials: Credentials,
    /// Default request timeout.
    pub timeout: Duration,
    /// Default retry count.
    pub retries: u32,
    /// Default initial retry delay.
    pub retry_delay: Duration,
    /// Upper bound for one backoff delay.
    pub max_retry_delay: Duration,
    /// Outbound requests per minute, 0 disables limiting.
    pub rate_limit_per_minute: u32,
    /// Assumed token lifetime.
    pub token_ttl: Duration,
    /// Name of the login endpoint.
    pub login_endpoint: String,
    /// HTTP connection settings.
    pub http: HttpConfig,
}

impl ProfileConfig {
    /// Validates the raw profile and converts it.
    pub(crate) fn into_profile(self, name: &str) -> Result<Profile> {
        let base_url = parse_base_url(name, &self.base_url)?;
        let credentials = Credentials {
            username: credential_source(name, "username", self.username, self.username_env)?,
            password: credential_source(name, "password", self.password, self.password_env)?,
        };

        if self.timeout_secs == 0 {
            return Err(BridgeError::ConfigError(format!(
                "profile '{name}': timeout_secs must be greater than 0"
            )));
        }
        self.http.validate().map_err(|e| BridgeError::ConfigError(format!("profile '{name}': {e}")))?;
        if self.token_ttl_secs == 0 {
            return Err(BridgeError::ConfigError(format!(
                "profile '{name}': token_ttl_secs must be greater than 0"
            )));
        }

        Ok(Profile {
            name: name.to_owned(),
            base_url,
            credentials,
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
            retry_delay: seconds(&format!("profile '{name}' retry_delay_secs"), self.retry_delay_secs)?,
            max_retry_delay: seconds(
                &format!("profile '{name}' max_retry_delay_secs"),
                self.max_retry_delay_secs,
            )?,
            rate_limit_per_minute: self.rate_limit_per_minute,
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            login_endpoint: self.login_endpoint,
            http: self.http,
        })
    }
}

impl EndpointConfig {
    /// Validates the raw entry and converts it.
    pub(crate) fn into_spec(self, name: &str) -> Result<EndpointSpec> {
        validate_field_name("endpoint name", name)?;
        validate_endpoint_path(name, &self.path)?;

        let mut required_fields = BTreeSet::new();
        for field in self.required {
            validate_field_name(&format!("endpoint '{name}' required field"), &field)?;
            if !required_fields.insert(field.clone()) {
                return Err(BridgeError::ConfigError(format!(
                    "endpoint '{name}' lists required field '{field}' twice"
                )));
            }
        }

        let mut defaults = RequestFields::new();
        for (field, value) in self.defaults {
            validate_field_name(&format!("endpoint '{name}' default"), &field)?;
            if required_fields.contains(&field) {
                return Err(BridgeError::ConfigError(format!(
                    "endpoint '{name}': field '{field}' is both required and defaulted"
                )));
            }
            defaults.insert(field, value);
        }

        validate_data_path(name, &self.response.data_path)?;
        validate_field_name(&format!("endpoint '{name}' success field"), &self.response.success_field)?;
        if self.response.success_codes.is_empty() {
            return Err(BridgeError::ConfigError(format!(
                "endpoint '{name}': success_codes must not be empty"
            )));
        }

        if self.timeout_secs == Some(0) {
            return Err(BridgeError::ConfigError(format!(
                "endpoint '{name}': timeout_secs must be greater than 0"
            )));
        }
        let retry_delay = self
            .retry_delay_secs
            .map(|secs| seconds(&format!("endpoint '{name}' retry_delay_secs"), secs))
            .transpose()?;

        Ok(EndpointSpec {
            name: name.to_owned(),
            path: self.path,
            method: self.method,
            timeout: self.timeout_secs.map(Duration::from_secs),
            retries: self.retries,
            retry_delay,
            required_fields,
            defaults,
            response: ResponseSpec {
                data_path: self.response.data_path,
                success: SuccessPredicate {
                    field: self.response.success_field,
                    codes: self.response.success_codes,
                },
            },
            requires_auth: self.requires_auth,
            units: self.units,
        })
    }
}

fn parse_base_url(profile: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        BridgeError::ConfigError(format!("profile '{profile}': invalid base_url '{raw}': {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(BridgeError::ConfigError(format!(
            "profile '{profile}': base_url must use http or https, got: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(BridgeError::ConfigError(format!("profile '{profile}': base_url has no host")));
    }

    Ok(url)
}

fn credential_source(
    profile: &str,
    what: &str,
    inline: Option<String>,
    env: Option<String>,
) -> Result<CredentialSource> {
    match (inline, env) {
        (Some(_), Some(_)) => Err(BridgeError::ConfigError(format!(
            "profile '{profile}': set either {what} or {what}_env, not both"
        ))),
        (Some(value), None) => Ok(CredentialSource::Inline(Zeroizing::new(value))),
        (None, Some(name)) => {
            validate_env_var_name(&name)?;
            Ok(CredentialSource::Env(name))
        }
        (None, None) => Err(BridgeError::ConfigError(format!(
            "profile '{profile}': missing {what} (set {what} or {what}_env)"
        ))),
    }
}

fn seconds(context: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| BridgeError::ConfigError(format!("{context} must be a non-negative number")))
}

/// Validates an endpoint path.
pub(crate) fn validate_endpoint_path(name: &str, path: &str) -> Result<()> {
    if path.contains("..") {
        return Err(BridgeError::ConfigError(format!(
            "endpoint '{name}' contains path traversal sequence '..': {path}"
        )));
    }

    if path.contains("//") {
        return Err(BridgeError::ConfigError(format!(
            "endpoint '{name}' contains double slash '//': {path}"
        )));
    }

    if path.contains('\\') {
        return Err(BridgeError::ConfigError(format!(
            "endpoint '{name}' contains a backslash: {path}"
        )));
    }

    if !path.starts_with('/') {
        return Err(BridgeError::ConfigError(format!(
            "endpoint '{name}' must start with '/': {path}"
        )));
    }

    Ok(())
}

/// Validates a vendor field or endpoint name.
///
/// Names are plain ASCII identifiers: letters, digits and underscores, not
/// starting with a digit.
pub(crate) fn validate_field_name(context: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(BridgeError::ConfigError(format!("{context} cannot be empty")));
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(BridgeError::ConfigError(format!(
            "{context} must start with a letter or underscore: {name}"
        )));
    }

    if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
        return Err(BridgeError::ConfigError(format!(
            "{context} contains invalid character '{}': {}",
            ch.escape_default(),
            name.escape_default()
        )));
    }

    Ok(())
}

fn validate_data_path(name: &str, path: &str) -> Result<()> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(BridgeError::ConfigError(format!(
            "endpoint '{name}' has an invalid data_path: '{path}'"
        )));
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_var_name(name: &str) -> Result<()> {
    validate_field_name("environment variable name", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(toml_str: &str) -> EndpointConfig {
        toml::from_str(toml_str).unwrap()
    }

    fn profile(toml_str: &str) -> ProfileConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_profile_defaults() {
        let profile = profile(
            r#"
            base_url = "http://vendor.example.com:9337"
            username = "fleet"
            password_env = "MDVR_API_PASSWORD"
        "#,
        )
        .into_profile("default")
        .unwrap();

        assert_eq!(profile.timeout, Duration::from_secs(30));
        assert_eq!(profile.retries, 3);
        assert_eq!(profile.retry_delay, Duration::from_secs(1));
        assert_eq!(profile.rate_limit_per_minute, 60);
        assert_eq!(profile.token_ttl, Duration::from_secs(82_800));
        assert_eq!(profile.login_endpoint, "user_login");
        assert_eq!(profile.http, HttpConfig::default());
        assert!(matches!(profile.credentials.password, CredentialSource::Env(ref n) if n == "MDVR_API_PASSWORD"));
    }

    #[test]
    fn test_profile_rejects_ftp_base_url() {
        let err = profile(
            r#"
            base_url = "ftp://vendor.example.com"
            username = "u"
            password = "p"
        "#,
        )
        .into_profile("default")
        .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_profile_requires_credentials() {
        let err = profile(r#"base_url = "https://vendor.example.com""#)
            .into_profile("default")
            .unwrap_err();
        assert!(err.to_string().contains("missing username"));
    }

    #[test]
    fn test_profile_rejects_both_credential_sources() {
        let err = profile(
            r#"
            base_url = "https://vendor.example.com"
            username = "u"
            username_env = "USER_ENV"
            password = "p"
        "#,
        )
        .into_profile("default")
        .unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn test_profile_rejects_negative_delay() {
        let err = profile(
            r#"
            base_url = "https://vendor.example.com"
            username = "u"
            password = "p"
            retry_delay_secs = -1.0
        "#,
        )
        .into_profile("default")
        .unwrap_err();
        assert!(err.to_string().contains("retry_delay_secs"));
    }

    #[test]
    fn test_inline_password_is_redacted_in_debug() {
        let source = CredentialSource::Inline(Zeroizing::new("hunter2".to_owned()));
        let debug = format!("{source:?}");
        assert!(!debug.contains("hunter2"));
        assert_eq!(source.resolve().unwrap().as_str(), "hunter2");
    }

    #[test]
    fn test_missing_env_credential_fails_authentication() {
        let source = CredentialSource::Env("MDVR_TEST_SURELY_UNSET_VARIABLE".to_owned());
        assert!(matches!(source.resolve(), Err(BridgeError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_endpoint_into_spec() {
        let spec = endpoint(
            r#"
            path = "/api/v1/gps/queryDetailedTrack"
            timeout_secs = 60
            retries = 1
            required = ["deviceId", "startTime", "endTime"]
            units = { coordinates = "scaled", speed = "tenth_kmh" }

            [response]
            data_path = "data.points"
        "#,
        )
        .into_spec("gps_query_detailed_track_v1")
        .unwrap();

        assert_eq!(spec.method, HttpMethod::Post);
        assert_eq!(spec.timeout, Some(Duration::from_secs(60)));
        assert_eq!(spec.retries, Some(1));
        assert_eq!(spec.retry_delay, None);
        assert_eq!(spec.required_fields.len(), 3);
        assert_eq!(spec.response.data_path, "data.points");
        assert_eq!(spec.response.success, SuccessPredicate::default());
        assert!(spec.requires_auth);
    }

    #[test]
    fn test_endpoint_defaults_parse_as_json() {
        let spec = endpoint(
            r#"
            path = "/api/v1/device/getUserDeviceList"
            defaults = { page = 1, pageSize = 10 }
        "#,
        )
        .into_spec("device_list")
        .unwrap();

        assert_eq!(spec.defaults["page"], serde_json::json!(1));
        assert_eq!(spec.defaults["pageSize"], serde_json::json!(10));
    }

    #[test]
    fn test_endpoint_required_and_default_conflict() {
        let err = endpoint(
            r#"
            path = "/api/v1/device/getUserDeviceList"
            required = ["page"]
            defaults = { page = 1 }
        "#,
        )
        .into_spec("device_list")
        .unwrap_err();
        assert!(err.to_string().contains("both required and defaulted"));
    }

    #[test]
    fn test_validate_path_traversal_endpoint_rejected() {
        assert!(validate_endpoint_path("x", "/api/../admin").is_err());
        assert!(validate_endpoint_path("x", "/api//v1").is_err());
        assert!(validate_endpoint_path("x", "api/v1").is_err());
        assert!(validate_endpoint_path("x", "\\api\\v1").is_err());
        assert!(validate_endpoint_path("x", "/api/v1/gps/getLatestGpsV2").is_ok());
    }

    #[test]
    fn test_validate_field_names() {
        assert!(validate_field_name("field", "deviceId").is_ok());
        assert!(validate_field_name("field", "_private").is_ok());
        assert!(validate_field_name("field", "").is_err());
        assert!(validate_field_name("field", "1st").is_err());
        assert!(validate_field_name("field", "device id").is_err());
        assert!(validate_field_name("field", "a\0b").is_err());
    }

    #[test]
    fn test_empty_data_path_segment_rejected() {
        let err = endpoint(
            r#"
            path = "/api/v1/media/preview"
            response = { data_path = "data..videos" }
        "#,
        )
        .into_spec("media_preview")
        .unwrap_err();
        assert!(err.to_string().contains("data_path"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<EndpointConfig, _> =
            toml::from_str(r#"path = "/x"
            retires = 3"#);
        assert!(result.is_err());
    }
}
