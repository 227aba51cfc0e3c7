//! Domain adapters.
//!
//! Each adapter is a pair of pure halves around [`VendorClient::call`]: a
//! `build_*` function that turns typed arguments into validated request
//! fields, and a `parse_*` function that turns a [`VendorResponse`] into
//! normalized DTOs from [`crate::models`]. Adapters never perform I/O, so
//! they can be tested against recorded payloads alone.
//!
//! Unit handling follows the endpoint's declared units; see [`convert`].
//!
//! [`VendorClient::call`]: crate::client::VendorClient::call

pub mod convert;
pub mod device;
pub mod forwarding;
pub mod gps;
pub mod media;
pub mod statistics;
pub mod task;

use serde_json::Value;

pub use self::{
    device::{DeviceAdapter, DeviceListQuery},
    forwarding::{ForwardingAdapter, parse_forwarded_message},
    gps::{ApiVersion, GpsAdapter},
    media::{MediaAdapter, PlaybackParams},
    statistics::{AlarmQuery, StatisticsAdapter},
    task::{TaskAdapter, TaskListQuery, TaskUpdate, TextDeliveryTask},
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{Page, PageRequest},
    registry::{EndpointRegistry, EndpointSpec, RequestFields},
};

/// Largest id list a single vendor request may carry.
pub const MAX_IDS_PER_REQUEST: usize = 1000;

/// Converts a `json!` object literal into request fields.
pub(crate) fn fields(value: Value) -> RequestFields {
    match value {
        Value::Object(map) => map,
        _ => RequestFields::new(),
    }
}

/// Validates `fields` against `endpoint` and merges in its defaults.
pub(crate) fn prepare(
    registry: &EndpointRegistry,
    endpoint: &str,
    fields: RequestFields,
) -> Result<RequestFields> {
    registry.resolve(endpoint)?.prepare_body(fields)
}

/// Checks that `response` is a successful answer of `endpoint` and returns
/// the endpoint spec with the payload at its data path.
pub(crate) fn payload<'g, 'r>(
    registry: &'g EndpointRegistry,
    endpoint: &str,
    response: &'r VendorResponse,
) -> Result<(&'g EndpointSpec, Option<&'r Value>)> {
    let spec = registry.resolve(endpoint)?;
    if response.endpoint != spec.name {
        return Err(BridgeError::InvalidResponse(format!(
            "response of '{}' cannot be parsed as '{}'",
            response.endpoint, spec.name
        )));
    }
    response.ensure_success(spec)?;
    Ok((spec, response.payload(spec)))
}

/// Records of a payload: array items, or the payload itself if it is an
/// object.
pub(crate) fn records(payload: Option<&Value>) -> &[Value] {
    match payload {
        Some(Value::Array(items)) => items.as_slice(),
        Some(value @ Value::Object(_)) => std::slice::from_ref(value),
        _ => &[],
    }
}

/// List items under the first present key of `keys`, or the payload itself
/// if it is already an array.
pub(crate) fn list_items<'a>(payload: Option<&'a Value>, keys: &[&str]) -> &'a [Value] {
    match payload {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Object(map)) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map_or(&[][..], Vec::as_slice),
        _ => &[],
    }
}

/// Builds a page from a list payload.
///
/// The total is read from `total`, `totalCount` or `count` next to the list
/// and falls back to `None`.
pub(crate) fn page_of<T>(
    payload: Option<&Value>,
    keys: &[&str],
    request: PageRequest,
    parse: impl FnMut(&Value) -> Option<T>,
) -> Page<T> {
    if payload.is_none() {
        return Page::empty(request);
    }
    let items: Vec<T> = list_items(payload, keys).iter().filter_map(parse).collect();
    Page { items, total: page_total(payload), page: request.page, page_size: request.page_size }
}

/// Total item count next to a list.
pub(crate) fn page_total(payload: Option<&Value>) -> Option<u64> {
    let value = payload?;
    ["total", "totalCount", "count"]
        .iter()
        .find_map(|key| value.get(*key).and_then(convert::integer))
        .and_then(|total| u64::try_from(total).ok())
}

/// Rejects an empty or blank identifier.
pub(crate) fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Rejects an empty id list, a blank entry or more than
/// [`MAX_IDS_PER_REQUEST`] entries.
pub(crate) fn require_ids<S: AsRef<str>>(field: &str, values: &[S]) -> Result<Vec<String>> {
    if values.is_empty() {
        return Err(BridgeError::ValidationError(format!("{field} must not be empty")));
    }
    check_id_count(field, values.len())?;
    values
        .iter()
        .map(|value| {
            let value = value.as_ref();
            require_id(field, value)?;
            Ok(value.to_owned())
        })
        .collect()
}

pub(crate) fn check_id_count(field: &str, count: usize) -> Result<()> {
    if count > MAX_IDS_PER_REQUEST {
        return Err(BridgeError::ValidationError(format!(
            "{field} accepts at most {MAX_IDS_PER_REQUEST} entries, got {count}"
        )));
    }
    Ok(())
}
