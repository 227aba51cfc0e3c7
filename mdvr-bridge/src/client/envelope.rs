//! Vendor response envelope.
//!
//! Every vendor answer has the shape `{"code": int, "message": string,
//! "ts": unix_seconds, "data": any}` and arrives with HTTP 200, so success
//! is decided on `code` alone.

use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{BridgeError, Result},
    registry::EndpointSpec,
};

/// Short identifier attached to every log line of one logical call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a new random id of 8 hex characters.
    #[must_use]
    pub fn new() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a vendor status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCodeClass {
    /// 200.
    Success,
    /// 401 and 1008: the token is missing, expired or revoked.
    Unauthorized,
    /// 1007: too many requests.
    RateLimited,
    /// 1003-1013 and 1100-1107: unknown resource or invalid parameter.
    NotFoundOrInvalid,
    /// 1200-1299: text delivery task rules.
    Task,
    /// Anything else, passed through untouched.
    Other,
}

impl VendorCodeClass {
    /// Classifies a vendor code.
    #[must_use]
    pub fn of(code: i64) -> Self {
        match code {
            200 => Self::Success,
            401 | 1008 => Self::Unauthorized,
            1007 => Self::RateLimited,
            1003..=1013 | 1100..=1107 => Self::NotFoundOrInvalid,
            1200..=1299 => Self::Task,
            _ => Self::Other,
        }
    }
}

/// Follows a dot path through nested objects and arrays.
///
/// Numeric segments index arrays. Returns `None` if a segment is missing or
/// the value found is `null`.
///
/// ```
/// use mdvr_bridge::client::extract_path;
/// use serde_json::json;
///
/// let body = json!({"data": {"vehicles": [{"alarm": {"total": 3}}]}});
/// assert_eq!(extract_path(&body, "data.vehicles.0.alarm.total"), Some(&json!(3)));
/// assert_eq!(extract_path(&body, "data.list"), None);
/// ```
#[must_use]
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// Decoded vendor answer.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorResponse {
    /// Endpoint that produced the answer.
    pub endpoint: String,
    /// Correlation id of the call.
    pub correlation_id: CorrelationId,
    /// Vendor status code.
    pub code: i64,
    /// Vendor message, empty if absent.
    pub message: String,
    /// Vendor timestamp in seconds, if present.
    pub ts: Option<i64>,
    /// Whole decoded body.
    pub body: Value,
}

impl VendorResponse {
    /// Decodes raw response bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResponse`] if the bytes are not a JSON
    /// object carrying the status code field.
    pub fn from_slice(
        spec: &EndpointSpec,
        correlation_id: CorrelationId,
        bytes: &[u8],
    ) -> Result<Self> {
        let body: Value = serde_json::from_slice(bytes).map_err(|e| {
            BridgeError::InvalidResponse(format!("endpoint '{}' returned non-JSON body: {e}", spec.name))
        })?;
        Self::from_value(spec, correlation_id, body)
    }

    /// Wraps an already decoded body.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidResponse`] if the body is not an object
    /// or lacks the status code field.
    pub fn from_value(spec: &EndpointSpec, correlation_id: CorrelationId, body: Value) -> Result<Self> {
        if !body.is_object() {
            return Err(BridgeError::InvalidResponse(format!(
                "endpoint '{}' returned a non-object body",
                spec.name
            )));
        }

        let code = spec.response.success.code_of(&body).ok_or_else(|| {
            BridgeError::InvalidResponse(format!(
                "endpoint '{}' response has no integer '{}' field",
                spec.name, spec.response.success.field
            ))
        })?;
        let message = body
            .get("message")
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let ts = body.get("ts").and_then(Value::as_i64);

        Ok(Self { endpoint: spec.name.clone(), correlation_id, code, message, ts, body })
    }

    /// The `data` member, or `null`.
    #[must_use]
    pub fn data(&self) -> &Value {
        self.body.get("data").unwrap_or(&Value::Null)
    }

    /// The value at the endpoint's data path.
    #[must_use]
    pub fn payload(&self, spec: &EndpointSpec) -> Option<&Value> {
        extract_path(&self.body, &spec.response.data_path)
    }

    /// Returns `true` if the endpoint's success predicate holds.
    #[must_use]
    pub fn is_success(&self, spec: &EndpointSpec) -> bool {
        spec.response.success.accepts(self.code)
    }

    /// Class of the status code.
    #[must_use]
    pub fn class(&self) -> VendorCodeClass {
        VendorCodeClass::of(self.code)
    }

    /// Fails with [`BridgeError::VendorError`] unless the call succeeded.
    ///
    /// # Errors
    ///
    /// Returns the vendor code and message when the success predicate fails.
    pub fn ensure_success(&self, spec: &EndpointSpec) -> Result<()> {
        if self.is_success(spec) { Ok(()) } else { Err(self.to_error()) }
    }

    /// Converts the answer into a [`BridgeError::VendorError`].
    pub fn to_error(&self) -> BridgeError {
        BridgeError::VendorError { code: self.code, message: self.message.clone() }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::EndpointRegistry;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::load(
            r#"
            [profiles.test]
            base_url = "https://vendor.example.com"
            username = "u"
            password = "p"

            [endpoints.user_login]
            path = "/api/v1/user/login"
            requires_auth = false
            response = { data_path = "data.token" }

            [endpoints.device_list]
            path = "/api/v1/device/getUserDeviceList"
            response = { data_path = "data.list" }
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_correlation_id_shape() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_eq!(a.as_str().len(), 8);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_vendor_code_classes() {
        assert_eq!(VendorCodeClass::of(200), VendorCodeClass::Success);
        assert_eq!(VendorCodeClass::of(401), VendorCodeClass::Unauthorized);
        assert_eq!(VendorCodeClass::of(1008), VendorCodeClass::Unauthorized);
        assert_eq!(VendorCodeClass::of(1007), VendorCodeClass::RateLimited);
        assert_eq!(VendorCodeClass::of(1003), VendorCodeClass::NotFoundOrInvalid);
        assert_eq!(VendorCodeClass::of(1013), VendorCodeClass::NotFoundOrInvalid);
        assert_eq!(VendorCodeClass::of(1102), VendorCodeClass::NotFoundOrInvalid);
        assert_eq!(VendorCodeClass::of(1108), VendorCodeClass::Other);
        assert_eq!(VendorCodeClass::of(1201), VendorCodeClass::Task);
        assert_eq!(VendorCodeClass::of(500), VendorCodeClass::Other);
    }

    #[test]
    fn test_extract_path_handles_arrays_and_null() {
        let body = json!({"data": {"list": [{"id": 1}, {"id": 2}], "empty": null}});
        assert_eq!(extract_path(&body, "data.list.1.id"), Some(&json!(2)));
        assert_eq!(extract_path(&body, "data.list.9"), None);
        assert_eq!(extract_path(&body, "data.list.x"), None);
        assert_eq!(extract_path(&body, "data.empty"), None);
        assert_eq!(extract_path(&body, "data.list.0.id.deeper"), None);
    }

    #[test]
    fn test_decode_success_envelope() {
        let registry = registry();
        let spec = registry.resolve("device_list").unwrap();
        let bytes = br#"{"code":200,"message":"success","ts":1715568599,"data":{"list":[{"deviceId":"D1"}],"total":1}}"#;

        let response = VendorResponse::from_slice(spec, CorrelationId::new(), bytes).unwrap();
        assert_eq!(response.code, 200);
        assert_eq!(response.message, "success");
        assert_eq!(response.ts, Some(1_715_568_599));
        assert!(response.is_success(spec));
        assert!(response.ensure_success(spec).is_ok());
        assert_eq!(response.payload(spec), Some(&json!([{"deviceId": "D1"}])));
        assert_eq!(response.data()["total"], json!(1));
    }

    #[test]
    fn test_decode_failure_envelope() {
        let registry = registry();
        let spec = registry.resolve("device_list").unwrap();
        let response = VendorResponse::from_value(
            spec,
            CorrelationId::new(),
            json!({"code": 1102, "msg": "device offline"}),
        )
        .unwrap();

        assert_eq!(response.message, "device offline");
        assert_eq!(response.class(), VendorCodeClass::NotFoundOrInvalid);
        let err = response.ensure_success(spec).unwrap_err();
        assert_eq!(err.vendor_code(), Some(1102));
        assert_eq!(response.data(), &Value::Null);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let registry = registry();
        let spec = registry.resolve("device_list").unwrap();

        let not_json = VendorResponse::from_slice(spec, CorrelationId::new(), b"<html>").unwrap_err();
        assert!(matches!(not_json, BridgeError::InvalidResponse(_)));

        let no_code =
            VendorResponse::from_value(spec, CorrelationId::new(), json!({"data": {}})).unwrap_err();
        assert!(no_code.to_string().contains("'code'"));

        let array = VendorResponse::from_value(spec, CorrelationId::new(), json!([1, 2])).unwrap_err();
        assert!(matches!(array, BridgeError::InvalidResponse(_)));
    }
}
