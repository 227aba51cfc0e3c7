//! Forwarding adapter.
//!
//! The vendor can push GPS, alarm and status messages to a third-party
//! platform. This module manages platforms, policies and device bindings,
//! and decodes the pushed messages with [`parse_forwarded_message`].

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{
    convert::{self, Aliases},
    fields, page_of, payload, prepare, records, require_id, require_ids,
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{
        AlarmTypeCode, DeviceForwardingDto, ForwardedAlarm, ForwardedAlarmItem, ForwardedGps,
        ForwardedMessage, ForwardedStatus, ForwardingPlatformDto, ForwardingPolicyDto, Page,
        PageRequest,
    },
    registry::{CoordinateEncoding, EndpointRegistry, RequestFields, SpeedUnit},
};

/// Endpoint registering a receiving platform.
pub const PLATFORM_CREATE: &str = "forwarding_platform_create";
/// Endpoint listing receiving platforms.
pub const PLATFORM_LIST: &str = "forwarding_platform_list";
/// Endpoint removing a receiving platform.
pub const PLATFORM_DELETE: &str = "forwarding_platform_delete";
/// Endpoint creating a forwarding policy.
pub const POLICY_CREATE: &str = "forwarding_policy_create";
/// Endpoint listing forwarding policies.
pub const POLICY_LIST: &str = "forwarding_policy_list";
/// Endpoint removing a forwarding policy.
pub const POLICY_DELETE: &str = "forwarding_policy_delete";
/// Endpoint binding policies to a device.
pub const DEVICE_SET: &str = "forwarding_device_set";
/// Endpoint reading a device's policies.
pub const DEVICE_GET: &str = "forwarding_device_get";
/// Endpoint unbinding a device's policies.
pub const DEVICE_DELETE: &str = "forwarding_device_delete";
/// Endpoint binding policies to many devices.
pub const DEVICE_BATCH_SET: &str = "forwarding_device_batch_set";

/// Pushed GPS positions.
pub const MSG_GPS: i64 = 1;
/// Pushed alarm.
pub const MSG_ALARM: i64 = 2;
/// Pushed device status.
pub const MSG_STATUS: i64 = 3;

// Pushed messages carry decimal degrees and km/h.
const PUSH_COORDINATES: CoordinateEncoding = CoordinateEncoding::Decimal;
const PUSH_SPEED: SpeedUnit = SpeedUnit::Kmh;

const MSG_ID: Aliases = Aliases::new(&["msgId", "msg_id"]);
const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "imei", "device_id"]);
const LATITUDE: Aliases = Aliases::new(&["latitude", "lat"]);
const LONGITUDE: Aliases = Aliases::new(&["longitude", "lng", "lon"]);
const SPEED: Aliases = Aliases::new(&["speed", "spd"]);
const DIRECTION: Aliases = Aliases::new(&["direction", "course", "dir"]);
const ALTITUDE: Aliases = Aliases::new(&["altitude", "alt"]);
const GPS_TIME: Aliases = Aliases::new(&["time", "gpsTime", "timestamp"]);
const ALARM_TIME: Aliases = Aliases::new(&["time", "alarmTime", "timestamp"]);
const FLAG_ACC: Aliases = Aliases::new(&["statusFlags.acc"]);
const STATUS_ACC: Aliases = Aliases::new(&["accStatus", "acc", "accState"]);
const STATUS_ONLINE: Aliases = Aliases::new(&["online", "isOnline", "onlineStatus"]);
const ALARM_TYPE: Aliases = Aliases::new(&["type", "typeId"]);
const ALARM_STATUS: Aliases = Aliases::new(&["Status", "status"]);

const ID: Aliases = Aliases::new(&["id", "platformId", "policyId"]);
const NAME: Aliases = Aliases::new(&["name"]);
const PLATFORM_URL: Aliases = Aliases::new(&["url", "address"]);
const ENABLED: Aliases = Aliases::new(&["enabled", "status"]);
const PLATFORM_ID: Aliases = Aliases::new(&["platformId"]);
const MSG_IDS: Aliases = Aliases::new(&["msgIds"]);
const POLICY_IDS: Aliases = Aliases::new(&["policyIds"]);

const LIST_KEYS: &[&str] = &["list"];

/// Builds and parses forwarding requests.
#[derive(Debug, Clone)]
pub struct ForwardingAdapter {
    registry: Arc<EndpointRegistry>,
}

impl ForwardingAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Registers a platform that receives pushed messages at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty name or a URL
    /// that is not absolute http(s).
    pub fn build_create_platform_request(&self, name: &str, url: &str) -> Result<RequestFields> {
        require_id("name", name)?;
        let parsed = Url::parse(url)
            .map_err(|e| BridgeError::ValidationError(format!("invalid platform url '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::ValidationError(format!(
                "platform url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        prepare(&self.registry, PLATFORM_CREATE, fields(json!({ "name": name, "url": url })))
    }

    /// Platform list request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid page.
    pub fn build_list_platforms_request(&self, page: PageRequest) -> Result<RequestFields> {
        self.list_request(PLATFORM_LIST, page)
    }

    /// Parses one page of platforms.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_platform_list_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<ForwardingPlatformDto>> {
        let (_, data) = payload(&self.registry, PLATFORM_LIST, response)?;
        Ok(page_of(data, LIST_KEYS, request, |record| {
            Some(ForwardingPlatformDto {
                platform_id: ID.text(record)?,
                name: NAME.text(record),
                url: PLATFORM_URL.text(record),
                enabled: ENABLED.flag(record),
            })
        }))
    }

    /// Removes a platform.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty id.
    pub fn build_delete_platform_request(&self, platform_id: &str) -> Result<RequestFields> {
        require_id("platformId", platform_id)?;
        prepare(&self.registry, PLATFORM_DELETE, fields(json!({ "platformId": platform_id })))
    }

    /// Creates a policy forwarding `msg_ids` to a platform.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty name or platform
    /// id, or a message id list that is empty or holds a non-positive id.
    pub fn build_create_policy_request(
        &self,
        name: &str,
        platform_id: &str,
        msg_ids: &[i64],
    ) -> Result<RequestFields> {
        require_id("name", name)?;
        require_id("platformId", platform_id)?;
        if msg_ids.is_empty() || msg_ids.iter().any(|id| *id <= 0) {
            return Err(BridgeError::ValidationError(format!(
                "msgIds must be a non-empty list of positive ids, got {msg_ids:?}"
            )));
        }
        let body = json!({ "name": name, "platformId": platform_id, "msgIds": msg_ids });
        prepare(&self.registry, POLICY_CREATE, fields(body))
    }

    /// Policy list request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid page.
    pub fn build_list_policies_request(&self, page: PageRequest) -> Result<RequestFields> {
        self.list_request(POLICY_LIST, page)
    }

    /// Parses one page of policies.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_policy_list_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<ForwardingPolicyDto>> {
        let (_, data) = payload(&self.registry, POLICY_LIST, response)?;
        Ok(page_of(data, LIST_KEYS, request, |record| {
            Some(ForwardingPolicyDto {
                policy_id: ID.text(record)?,
                name: NAME.text(record),
                platform_id: PLATFORM_ID.text(record),
                msg_ids: id_list(record, MSG_IDS).iter().filter_map(|id| id.parse().ok()).collect(),
            })
        }))
    }

    /// Removes a policy.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty id.
    pub fn build_delete_policy_request(&self, policy_id: &str) -> Result<RequestFields> {
        require_id("policyId", policy_id)?;
        prepare(&self.registry, POLICY_DELETE, fields(json!({ "policyId": policy_id })))
    }

    /// Binds policies to one device, replacing its current bindings.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// invalid policy list.
    pub fn build_set_device_request<S: AsRef<str>>(&self, device_id: &str, policy_ids: &[S]) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        let policy_ids = require_ids("policyIds", policy_ids)?;
        prepare(&self.registry, DEVICE_SET, fields(json!({ "deviceId": device_id, "policyIds": policy_ids })))
    }

    /// Reads the policies bound to a device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id.
    pub fn build_get_device_request(&self, device_id: &str) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        prepare(&self.registry, DEVICE_GET, fields(json!({ "deviceId": device_id })))
    }

    /// Parses a device's bindings. `None` if the device has none on record.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_device_forwarding_response(
        &self,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Option<DeviceForwardingDto>> {
        let (_, data) = payload(&self.registry, DEVICE_GET, response)?;
        let record = records(data)
            .iter()
            .find(|record| DEVICE_ID.text(record).is_none_or(|id| id == device_id));
        Ok(record.map(|record| DeviceForwardingDto {
            device_id: device_id.to_owned(),
            policy_ids: id_list(record, POLICY_IDS),
        }))
    }

    /// Unbinds all policies from a device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id.
    pub fn build_delete_device_request(&self, device_id: &str) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        prepare(&self.registry, DEVICE_DELETE, fields(json!({ "deviceId": device_id })))
    }

    /// Binds the same policies to up to 1000 devices.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid device or
    /// policy list.
    pub fn build_batch_set_devices_request<D: AsRef<str>, P: AsRef<str>>(
        &self,
        device_ids: &[D],
        policy_ids: &[P],
    ) -> Result<RequestFields> {
        let device_ids = require_ids("deviceIds", device_ids)?;
        let policy_ids = require_ids("policyIds", policy_ids)?;
        let body = json!({ "deviceIds": device_ids, "policyIds": policy_ids });
        prepare(&self.registry, DEVICE_BATCH_SET, fields(body))
    }

    /// Returns the id of a created platform or policy, if the vendor sent
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_created_id_response(&self, response: &VendorResponse) -> Result<Option<String>> {
        let (_, data) = payload(&self.registry, &response.endpoint, response)?;
        Ok(data.and_then(|data| convert::text(data).or_else(|| ID.text(data))))
    }

    /// Checks an answer that carries no data, such as delete or set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_ack_response(&self, response: &VendorResponse) -> Result<()> {
        payload(&self.registry, &response.endpoint, response).map(|_| ())
    }

    fn list_request(&self, endpoint: &str, page: PageRequest) -> Result<RequestFields> {
        page.validate()?;
        prepare(&self.registry, endpoint, fields(json!({ "page": page.page, "pageSize": page.page_size })))
    }
}

/// Ids under `aliases`, from an array or a comma separated string.
fn id_list(record: &Value, aliases: Aliases) -> Vec<String> {
    match aliases.get(record) {
        Some(Value::Array(items)) => items.iter().filter_map(convert::text).collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(other) => convert::text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Decodes a message pushed by the vendor's forwarding service.
///
/// GPS entries without a device id are skipped. Unknown message ids are
/// returned as [`ForwardedMessage::Unknown`] with the payload intact.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidResponse`] if the payload is not an object,
/// or an alarm or status message names no device.
///
/// # Examples
///
/// ```
/// use mdvr_bridge::{adapters::parse_forwarded_message, models::ForwardedMessage};
/// use serde_json::json;
///
/// let push = json!({"msgId": 3, "deviceId": "DEV001", "acc": "ON", "online": 0});
/// let ForwardedMessage::Status(status) = parse_forwarded_message(&push).unwrap() else {
///     panic!("expected a status message");
/// };
/// assert_eq!(status.acc_on, Some(true));
/// assert_eq!(status.online, Some(false));
/// ```
pub fn parse_forwarded_message(push: &Value) -> Result<ForwardedMessage> {
    if !push.is_object() {
        return Err(BridgeError::InvalidResponse("forwarded message is not a JSON object".to_owned()));
    }

    match MSG_ID.integer(push) {
        Some(MSG_GPS) => Ok(ForwardedMessage::Gps { positions: forwarded_positions(push) }),
        Some(MSG_ALARM) => forwarded_alarm(push).map(ForwardedMessage::Alarm),
        Some(MSG_STATUS) => forwarded_status(push).map(ForwardedMessage::Status),
        msg_id => {
            debug!(?msg_id, "unhandled forwarded message");
            Ok(ForwardedMessage::Unknown { msg_id, payload: push.clone() })
        }
    }
}

fn forwarded_positions(push: &Value) -> Vec<ForwardedGps> {
    let entries = convert::extract_path(push, "gps.list")
        .or_else(|| push.get("list"))
        .or_else(|| push.get("gps"));
    let entries = match entries {
        Some(Value::Array(items)) => items.as_slice(),
        Some(single @ Value::Object(_)) => std::slice::from_ref(single),
        _ => std::slice::from_ref(push),
    };

    entries
        .iter()
        .filter_map(|gps| {
            Some(ForwardedGps {
                device_id: DEVICE_ID.text(gps)?,
                latitude: LATITUDE.get(gps).and_then(|v| PUSH_COORDINATES.decode(v)),
                longitude: LONGITUDE.get(gps).and_then(|v| PUSH_COORDINATES.decode(v)),
                speed_kmh: SPEED.get(gps).and_then(|v| PUSH_SPEED.to_kmh(v)),
                direction_deg: DIRECTION.number(gps),
                altitude_m: ALTITUDE.number(gps),
                timestamp_ms: GPS_TIME.timestamp_ms(gps),
                acc_on: FLAG_ACC.flag(gps),
            })
        })
        .collect()
}

fn forwarded_alarm(push: &Value) -> Result<ForwardedAlarm> {
    let container = push.get("alarm").unwrap_or(push);
    let base = container.get("base").unwrap_or(container);
    let device_id = DEVICE_ID
        .text(base)
        .or_else(|| DEVICE_ID.text(push))
        .ok_or_else(|| BridgeError::InvalidResponse("forwarded alarm names no device".to_owned()))?;

    let items = container
        .get("list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|item| {
                    Some(ForwardedAlarmItem {
                        type_code: AlarmTypeCode(ALARM_TYPE.integer(item)?),
                        active: ALARM_STATUS.integer(item).unwrap_or(0) == 0,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ForwardedAlarm {
        device_id,
        latitude: LATITUDE.get(base).and_then(|v| PUSH_COORDINATES.decode(v)),
        longitude: LONGITUDE.get(base).and_then(|v| PUSH_COORDINATES.decode(v)),
        speed_kmh: SPEED.get(base).and_then(|v| PUSH_SPEED.to_kmh(v)),
        timestamp_ms: ALARM_TIME.timestamp_ms(base),
        acc_on: FLAG_ACC.flag(base),
        items,
    })
}

fn forwarded_status(push: &Value) -> Result<ForwardedStatus> {
    let record = push.get("status").filter(|s| s.is_object()).unwrap_or(push);
    let device_id = DEVICE_ID
        .text(record)
        .or_else(|| DEVICE_ID.text(push))
        .ok_or_else(|| BridgeError::InvalidResponse("forwarded status names no device".to_owned()))?;

    Ok(ForwardedStatus {
        device_id,
        acc_on: STATUS_ACC.flag(record),
        online: STATUS_ONLINE.flag(record),
    })
}
