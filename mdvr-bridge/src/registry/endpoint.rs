//! Typed endpoint specifications.
//!
//! An [`EndpointSpec`] is built once from its raw configuration entry and is
//! immutable afterwards. It knows how to validate a request body and how to
//! recognise a successful vendor answer.

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Request body handed to [`crate::client::VendorClient::call`].
///
/// Keys are vendor field names (`deviceId`, `startTime`, ...).
pub type RequestFields = Map<String, Value>;

/// HTTP method of a vendor endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET, body sent as query parameters.
    Get,
    /// POST with JSON body. Almost every vendor endpoint uses it.
    #[default]
    Post,
    /// PUT with JSON body.
    Put,
    /// DELETE, body sent as query parameters.
    Delete,
}

impl HttpMethod {
    /// Returns `true` if the request body travels as JSON.
    #[must_use]
    pub fn has_json_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Encoding of coordinates in an endpoint's response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateEncoding {
    /// Degrees multiplied by 1 000 000 and sent as integers.
    #[default]
    Scaled,
    /// Decimal degrees.
    Decimal,
}

/// Unit of speed values in an endpoint's response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    /// Kilometres per hour.
    #[default]
    Kmh,
    /// Tenths of kilometres per hour.
    TenthKmh,
}

/// Units declared for an endpoint's response fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    /// Coordinate encoding.
    #[serde(default)]
    pub coordinates: CoordinateEncoding,
    /// Speed unit.
    #[serde(default)]
    pub speed: SpeedUnit,
}

/// Decides whether a decoded vendor body is a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessPredicate {
    /// Envelope field holding the status code.
    pub field: String,
    /// Codes that mean success.
    pub codes: Vec<i64>,
}

impl Default for SuccessPredicate {
    fn default() -> Self {
        Self { field: "code".to_owned(), codes: vec![200] }
    }
}

impl SuccessPredicate {
    /// Reads the status code from a decoded body.
    ///
    /// Numeric strings are accepted; some gateways quote the code.
    #[must_use]
    pub fn code_of(&self, body: &Value) -> Option<i64> {
        match body.get(&self.field)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns `true` if `code` is one of the success codes.
    #[must_use]
    pub fn accepts(&self, code: i64) -> bool {
        self.codes.contains(&code)
    }
}

/// Response shape of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpec {
    /// Dot path of the payload, e.g. `data.list`.
    pub data_path: String,
    /// Success predicate.
    pub success: SuccessPredicate,
}

/// Declarative description of one vendor operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    /// Unique endpoint name.
    pub name: String,
    /// Path below the profile base URL.
    pub path: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Timeout override.
    pub timeout: Option<Duration>,
    /// Retry count override.
    pub retries: Option<u32>,
    /// Initial retry delay override.
    pub retry_delay: Option<Duration>,
    /// Fields every request must carry.
    pub required_fields: BTreeSet<String>,
    /// Optional fields and the value used when the caller omits them.
    pub defaults: RequestFields,
    /// Response shape.
    pub response: ResponseSpec,
    /// Whether the `X-Token` header is attached.
    pub requires_auth: bool,
    /// Units of response fields.
    pub units: UnitSpec,
}

impl EndpointSpec {
    /// Validates `fields` and merges in the optional defaults.
    ///
    /// Caller-supplied values win over defaults. Fields the endpoint does not
    /// mention are passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] if a required field is absent
    /// or `null`.
    pub fn prepare_body(&self, mut fields: RequestFields) -> Result<RequestFields> {
        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .filter(|name| fields.get(name.as_str()).is_none_or(Value::is_null))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(BridgeError::ValidationError(format!(
                "endpoint '{}' is missing required field(s): {}",
                self.name,
                missing.join(", ")
            )));
        }

        for (name, value) in &self.defaults {
            fields.entry(name.clone()).or_insert_with(|| value.clone());
        }

        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn device_list_spec() -> EndpointSpec {
        let mut defaults = RequestFields::new();
        defaults.insert("page".to_owned(), json!(1));
        defaults.insert("pageSize".to_owned(), json!(10));

        EndpointSpec {
            name: "device_list".to_owned(),
            path: "/api/v1/device/getUserDeviceList".to_owned(),
            method: HttpMethod::Post,
            timeout: None,
            retries: None,
            retry_delay: None,
            required_fields: BTreeSet::from(["companyId".to_owned()]),
            defaults,
            response: ResponseSpec {
                data_path: "data.list".to_owned(),
                success: SuccessPredicate::default(),
            },
            requires_auth: true,
            units: UnitSpec::default(),
        }
    }

    fn fields(value: Value) -> RequestFields {
        match value {
            Value::Object(map) => map,
            _ => RequestFields::new(),
        }
    }

    #[test]
    fn test_prepare_body_merges_defaults() {
        let spec = device_list_spec();
        let body = spec.prepare_body(fields(json!({"companyId": 7, "pageSize": 50}))).unwrap();

        assert_eq!(body["companyId"], json!(7));
        assert_eq!(body["page"], json!(1));
        assert_eq!(body["pageSize"], json!(50));
    }

    #[test]
    fn test_prepare_body_missing_required() {
        let spec = device_list_spec();
        let err = spec.prepare_body(fields(json!({"page": 2}))).unwrap_err();

        assert!(matches!(err, BridgeError::ValidationError(_)));
        assert!(err.to_string().contains("companyId"));
    }

    #[test]
    fn test_prepare_body_null_counts_as_missing() {
        let spec = device_list_spec();
        let err = spec.prepare_body(fields(json!({"companyId": null}))).unwrap_err();
        assert!(matches!(err, BridgeError::ValidationError(_)));
    }

    #[test]
    fn test_prepare_body_keeps_extra_fields() {
        let spec = device_list_spec();
        let body =
            spec.prepare_body(fields(json!({"companyId": 1, "plateNumbers": ["A1"]}))).unwrap();
        assert_eq!(body["plateNumbers"], json!(["A1"]));
    }

    #[test]
    fn test_success_predicate() {
        let predicate = SuccessPredicate::default();
        assert_eq!(predicate.code_of(&json!({"code": 200})), Some(200));
        assert_eq!(predicate.code_of(&json!({"code": "1008"})), Some(1008));
        assert_eq!(predicate.code_of(&json!({"message": "no code"})), None);
        assert!(predicate.accepts(200));
        assert!(!predicate.accepts(0));
    }

    #[test]
    fn test_http_method_display_and_body() {
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert!(HttpMethod::Put.has_json_body());
        assert!(!HttpMethod::Get.has_json_body());
    }
}
