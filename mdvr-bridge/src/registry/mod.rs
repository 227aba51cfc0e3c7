//! Endpoint registry.
//!
//! The registry is loaded once from a TOML document describing connection
//! profiles and vendor endpoints. Adding a vendor operation is a
//! configuration change: a new `[endpoints.<name>]` table.
//!
//! # Example
//!
//! ```rust
//! use mdvr_bridge::registry::EndpointRegistry;
//!
//! let registry = EndpointRegistry::load(
//!     r#"
//!     active_profile = "staging"
//!
//!     [profiles.staging]
//!     base_url = "https://vendor.example.com"
//!     username = "fleet"
//!     password_env = "MDVR_API_PASSWORD"
//!
//!     [endpoints.user_login]
//!     path = "/api/v1/user/login"
//!     required = ["account", "password"]
//!     requires_auth = false
//!     response = { data_path = "data.token" }
//!
//!     [endpoints.device_states]
//!     path = "/api/v1/device/getDeviceStatusList"
//!     required = ["deviceIds"]
//!     response = { data_path = "data.list" }
//!     "#,
//! )?;
//!
//! let spec = registry.resolve("device_states")?;
//! assert_eq!(spec.path, "/api/v1/device/getDeviceStatusList");
//! assert!(registry.resolve("no_such_endpoint").is_err());
//! # Ok::<(), mdvr_bridge::BridgeError>(())
//! ```

mod config;
mod endpoint;

use std::{collections::HashMap, path::Path, time::Duration};

pub use config::{
    CredentialSource, Credentials, EndpointConfig, Profile, ProfileConfig, RegistryDocument,
    ResponseConfig,
};
pub use endpoint::{
    CoordinateEncoding, EndpointSpec, HttpMethod, RequestFields, ResponseSpec, SpeedUnit,
    SuccessPredicate, UnitSpec,
};
use tracing::info;
use url::Url;

use crate::{
    error::{BridgeError, Result},
    reliability::RetryPolicy,
};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "MDVR_API_CONFIG";

/// Environment variable overriding the active profile.
pub const PROFILE_ENV: &str = "MDVR_API_PROFILE";

/// Configuration file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/vendor_api.toml";

/// Immutable set of endpoint specs plus the active profile.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    profile: Profile,
    endpoints: HashMap<String, EndpointSpec>,
}

impl EndpointRegistry {
    /// Loads a registry using the document's `active_profile`.
    ///
    /// A document with a single profile may omit `active_profile`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] if the document is malformed or
    /// any entry fails validation.
    pub fn load(source: &str) -> Result<Self> {
        Self::load_profile(source, None)
    }

    /// Loads a registry, selecting `profile` instead of `active_profile`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] if the document is malformed, the
    /// profile does not exist, or any entry fails validation.
    pub fn load_profile(source: &str, profile: Option<&str>) -> Result<Self> {
        let document: RegistryDocument = toml::from_str(source)
            .map_err(|e| BridgeError::ConfigError(format!("invalid TOML config: {e}")))?;
        Self::from_document(document, profile)
    }

    /// Loads a registry from a file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] if the file cannot be read or its
    /// content is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P, profile: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::load_profile(&content, profile)
    }

    /// Loads the registry named by [`CONFIG_PATH_ENV`] and [`PROFILE_ENV`].
    ///
    /// # Errors
    ///
    /// Same as [`EndpointRegistry::from_file`].
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let profile = std::env::var(PROFILE_ENV).ok().filter(|p| !p.is_empty());
        Self::from_file(path, profile.as_deref())
    }

    /// Validates a parsed document and builds the registry.
    ///
    /// Either every entry is valid and a registry is returned, or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] on the first invalid entry.
    pub fn from_document(mut document: RegistryDocument, profile: Option<&str>) -> Result<Self> {
        let profile_name = match (profile, document.active_profile.as_deref()) {
            (Some(name), _) | (None, Some(name)) => name.to_owned(),
            (None, None) if document.profiles.len() == 1 => {
                document.profiles.keys().next().cloned().unwrap_or_default()
            }
            (None, None) => {
                return Err(BridgeError::ConfigError(
                    "active_profile must be set when several profiles are defined".to_owned(),
                ));
            }
        };

        let raw_profile = document.profiles.remove(&profile_name).ok_or_else(|| {
            BridgeError::ConfigError(format!("profile '{profile_name}' is not defined"))
        })?;
        let profile = raw_profile.into_profile(&profile_name)?;

        let endpoints = document
            .endpoints
            .into_iter()
            .map(|(name, raw)| raw.into_spec(&name).map(|spec| (name, spec)))
            .collect::<Result<HashMap<_, _>>>()?;

        match endpoints.get(&profile.login_endpoint) {
            None => {
                return Err(BridgeError::ConfigError(format!(
                    "login endpoint '{}' is not defined",
                    profile.login_endpoint
                )));
            }
            Some(login) if login.requires_auth => {
                return Err(BridgeError::ConfigError(format!(
                    "login endpoint '{}' must set requires_auth = false",
                    profile.login_endpoint
                )));
            }
            Some(_) => {}
        }

        info!(profile = %profile.name, endpoints = endpoints.len(), "endpoint registry loaded");
        Ok(Self { profile, endpoints })
    }

    /// Looks up an endpoint by name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownEndpoint`] if no such endpoint exists.
    pub fn resolve(&self, name: &str) -> Result<&EndpointSpec> {
        self.endpoints.get(name).ok_or_else(|| BridgeError::UnknownEndpoint(name.to_owned()))
    }

    /// Returns the login endpoint.
    ///
    /// # Errors
    ///
    /// Never fails for a registry built by this module.
    pub fn login_endpoint(&self) -> Result<&EndpointSpec> {
        self.resolve(&self.profile.login_endpoint)
    }

    /// Returns the active profile.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Iterates over endpoint names in no particular order.
    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` if no endpoints are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Effective timeout of an endpoint.
    #[must_use]
    pub fn timeout_for(&self, spec: &EndpointSpec) -> Duration {
        spec.timeout.unwrap_or(self.profile.timeout)
    }

    /// Effective retry policy of an endpoint.
    #[must_use]
    pub fn retry_policy_for(&self, spec: &EndpointSpec) -> RetryPolicy {
        RetryPolicy {
            max_retries: spec.retries.unwrap_or(self.profile.retries),
            initial_delay: spec.retry_delay.unwrap_or(self.profile.retry_delay),
            max_delay: self.profile.max_retry_delay,
            backoff_multiplier: 2.0,
        }
    }

    /// Full URL of an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] if the path cannot be joined.
    pub fn url_for(&self, spec: &EndpointSpec) -> Result<Url> {
        let mut url = self.profile.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{base_path}{}", spec.path));
        if url.path().ends_with(&spec.path) {
            Ok(url)
        } else {
            Err(BridgeError::ConfigError(format!(
                "cannot join endpoint path '{}' to base URL",
                spec.path
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PROFILES: &str = r#"
        active_profile = "production"

        [profiles.production]
        base_url = "http://vendor.example.com:9337"
        username_env = "MDVR_API_USERNAME"
        password_env = "MDVR_API_PASSWORD"
        retries = 2
        retry_delay_secs = 0.5

        [profiles.staging]
        base_url = "https://staging.vendor.example.com/gateway/"
        username = "tester"
        password = "secret"
        timeout_secs = 5
        rate_limit_per_minute = 0

        [endpoints.user_login]
        path = "/api/v1/user/login"
        required = ["account", "password"]
        requires_auth = false
        retries = 1
        response = { data_path = "data.token" }

        [endpoints.gps_query_detailed_track_v1]
        path = "/api/v1/gps/queryDetailedTrack"
        timeout_secs = 60
        retry_delay_secs = 2.0
        required = ["deviceId", "startTime", "endTime"]
        response = { data_path = "data.points" }
    "#;

    #[test]
    fn test_load_active_profile() {
        let registry = EndpointRegistry::load(TWO_PROFILES).unwrap();
        assert_eq!(registry.profile().name, "production");
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_load_explicit_profile() {
        let registry = EndpointRegistry::load_profile(TWO_PROFILES, Some("staging")).unwrap();
        assert_eq!(registry.profile().name, "staging");
        assert_eq!(registry.profile().rate_limit_per_minute, 0);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let err = EndpointRegistry::load_profile(TWO_PROFILES, Some("qa")).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
        assert!(err.to_string().contains("'qa'"));
    }

    #[test]
    fn test_resolve_unknown_endpoint() {
        let registry = EndpointRegistry::load(TWO_PROFILES).unwrap();
        let err = registry.resolve("gps_teleport").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownEndpoint(ref name) if name == "gps_teleport"));
    }

    #[test]
    fn test_overrides_fall_back_to_profile() {
        let registry = EndpointRegistry::load(TWO_PROFILES).unwrap();
        let login = registry.resolve("user_login").unwrap();
        let track = registry.resolve("gps_query_detailed_track_v1").unwrap();

        assert_eq!(registry.timeout_for(login), Duration::from_secs(30));
        assert_eq!(registry.timeout_for(track), Duration::from_secs(60));

        let login_policy = registry.retry_policy_for(login);
        assert_eq!(login_policy.max_retries, 1);
        assert_eq!(login_policy.initial_delay, Duration::from_millis(500));

        let track_policy = registry.retry_policy_for(track);
        assert_eq!(track_policy.max_retries, 2);
        assert_eq!(track_policy.initial_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_endpoint_fails_whole_load() {
        let broken = TWO_PROFILES.replace("/api/v1/gps/queryDetailedTrack", "api/v1/gps");
        let err = EndpointRegistry::load(&broken).unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_missing_login_endpoint_rejected() {
        let source = r#"
            [profiles.only]
            base_url = "https://vendor.example.com"
            username = "u"
            password = "p"

            [endpoints.device_list]
            path = "/api/v1/device/getUserDeviceList"
        "#;
        let err = EndpointRegistry::load(source).unwrap_err();
        assert!(err.to_string().contains("login endpoint 'user_login'"));
    }

    #[test]
    fn test_login_endpoint_must_skip_auth() {
        let source = r#"
            [profiles.only]
            base_url = "https://vendor.example.com"
            username = "u"
            password = "p"

            [endpoints.user_login]
            path = "/api/v1/user/login"
        "#;
        let err = EndpointRegistry::load(source).unwrap_err();
        assert!(err.to_string().contains("requires_auth = false"));
    }

    #[test]
    fn test_ambiguous_profile_rejected() {
        let source = TWO_PROFILES.replace(r#"active_profile = "production""#, "");
        let err = EndpointRegistry::load(&source).unwrap_err();
        assert!(err.to_string().contains("active_profile"));
    }

    #[test]
    fn test_duplicate_endpoint_names_rejected() {
        let source = format!(
            "{TWO_PROFILES}\n[endpoints.user_login]\npath = \"/api/v1/user/login2\"\n"
        );
        let err = EndpointRegistry::load(&source).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let registry = EndpointRegistry::load_profile(TWO_PROFILES, Some("staging")).unwrap();
        let spec = registry.resolve("user_login").unwrap();
        let url = registry.url_for(spec).unwrap();
        assert_eq!(url.as_str(), "https://staging.vendor.example.com/gateway/api/v1/user/login");
    }

    #[test]
    fn test_from_file_missing() {
        let err = EndpointRegistry::from_file("/nonexistent/vendor_api.toml", None).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn test_shipped_config_loads() {
        let source = include_str!("../../config/vendor_api.toml");
        let registry = EndpointRegistry::load(source).unwrap();

        assert!(registry.len() >= 45);
        for name in [
            "user_login",
            "device_list",
            "device_states",
            "gps_search_v1",
            "gps_get_latest_v2",
            "gps_query_detailed_track_v1",
            "gps_query_detailed_track_v2",
            "gps_query_track_dates_v1",
            "gps_query_track_dates_v2",
            "media_preview",
            "media_playback",
            "task_get_results",
            "stat_realtime_get_vehicle_alarm",
            "forwarding_policy_create",
            "config_query",
        ] {
            assert!(registry.resolve(name).is_ok(), "missing endpoint {name}");
        }
        for name in registry.endpoint_names() {
            assert!(registry.url_for(registry.resolve(name).unwrap()).is_ok());
        }
    }
}
