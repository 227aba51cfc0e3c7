//! Statistics adapter: alarms, alarm attachments and vehicle statistics.
//!
//! Alarms the vendor sends without an identifier are dropped, and so are
//! vehicle entries that carry no alarm.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{
    convert::{self, Aliases},
    fields, list_items, page_total, payload, prepare, records, require_id, require_ids,
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{
        AlarmDto, AlarmLevel, AlarmTypeCode, AlarmTypeDescriptionDto, AttachmentDto, Page,
        PageRequest, VehicleDetailDto, VehicleStatisticsDto,
    },
    registry::{EndpointRegistry, RequestFields, UnitSpec},
};

/// Endpoint of currently active alarms.
pub const REALTIME_ALARMS: &str = "stat_realtime_get_vehicle_alarm";
/// Endpoint of past alarms.
pub const HISTORY_ALARMS: &str = "stat_history_get_vehicle_alarm";
/// Endpoint naming alarm type codes.
pub const ALARM_TYPE_DESCRIPTIONS: &str = "alarm_get_type_description";
/// Endpoint of alarm evidence files.
pub const ALARM_ATTACHMENTS: &str = "stat_common_get_attachment";
/// Endpoint of per-vehicle driving statistics.
pub const VEHICLE_STATISTICS: &str = "stat_history_get_vehicle_statistic";
/// Endpoint of one vehicle's trips, stops and alarms.
pub const VEHICLE_DETAIL: &str = "stat_history_get_vehicle_detail";

/// Status of an alarm the vendor sends without one.
pub const DEFAULT_ALARM_STATUS: &str = "active";

const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "device_id"]);
const ALARM_ID: Aliases = Aliases::new(&["id", "alarmId", "alarm_id"]);
const TYPE_CODE: Aliases = Aliases::new(&["typeId", "type", "alarmType", "code"]);
const LEVEL: Aliases = Aliases::new(&["level", "alarmLevel"]);
const MESSAGE: Aliases = Aliases::new(&["message", "msg"]);
const HAPPENED_AT: Aliases = Aliases::new(&["happenAt", "timestamp", "alarmTime", "time"]);
const LATITUDE: Aliases = Aliases::new(&["latitude", "lat"]);
const LONGITUDE: Aliases = Aliases::new(&["longitude", "lng", "lon"]);
const ADDRESS: Aliases = Aliases::new(&["address"]);
const SPEED: Aliases = Aliases::new(&["speed"]);
const ALTITUDE: Aliases = Aliases::new(&["altitude", "height"]);
const HAS_ATTACHMENT: Aliases = Aliases::new(&["hasAttachment", "has_attachment"]);
const STATUS: Aliases = Aliases::new(&["status"]);
const TYPE_NAME: Aliases = Aliases::new(&["name", "description", "desc"]);
const ATTACHMENT_URL: Aliases = Aliases::new(&["url", "fileUrl", "downloadUrl"]);
const FILE_TYPE: Aliases = Aliases::new(&["fileType", "type"]);
const CHANNEL: Aliases = Aliases::new(&["channel"]);
const TOTAL_DISTANCE: Aliases = Aliases::new(&["totalDistance", "total_distance"]);
const TOTAL_DURATION: Aliases = Aliases::new(&["totalDuration", "total_duration"]);
const AVERAGE_SPEED: Aliases = Aliases::new(&["averageSpeed", "average_speed"]);
const MAX_SPEED: Aliases = Aliases::new(&["maxSpeed", "max_speed"]);
const TOTAL_STOPS: Aliases = Aliases::new(&["totalStops", "total_stops"]);
const FUEL: Aliases = Aliases::new(&["fuelConsumption", "fuel_consumption"]);
const IDLE_TIME: Aliases = Aliases::new(&["idleTime", "idle_time"]);
const TOTAL_ALARMS: Aliases = Aliases::new(&["totalAlarms", "total_alarms"]);

const ALARM_LIST_KEYS: &[&str] = &["vehicles", "alarms", "list"];
const DESCRIPTION_LIST_KEYS: &[&str] = &["list", "types"];
const ATTACHMENT_LIST_KEYS: &[&str] = &["list", "attachments", "files"];
const STATISTICS_LIST_KEYS: &[&str] = &["list", "vehicles"];
const DETAIL_ALARM_KEYS: &[&str] = &["alarms"];

/// Alarm query for a set of devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmQuery {
    /// Devices to query, 1 to 1000.
    pub device_ids: Vec<String>,
    /// Alarms at or after, optional for realtime queries.
    pub start: Option<DateTime<Utc>>,
    /// Alarms at or before.
    pub end: Option<DateTime<Utc>>,
    /// Page to fetch.
    pub page: PageRequest,
}

/// Builds and parses alarm and statistics requests.
#[derive(Debug, Clone)]
pub struct StatisticsAdapter {
    registry: Arc<EndpointRegistry>,
}

impl StatisticsAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Realtime alarm request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid device list,
    /// page or window.
    pub fn build_realtime_alarm_request(&self, query: &AlarmQuery) -> Result<RequestFields> {
        self.alarm_request(REALTIME_ALARMS, query)
    }

    /// History alarm request. Both ends of the window are required.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid device list,
    /// page or window.
    pub fn build_history_alarm_request(&self, query: &AlarmQuery) -> Result<RequestFields> {
        if query.start.is_none() || query.end.is_none() {
            return Err(BridgeError::ValidationError(
                "history alarm queries need start and end".to_owned(),
            ));
        }
        self.alarm_request(HISTORY_ALARMS, query)
    }

    /// Parses one page of realtime alarms.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_realtime_alarm_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<AlarmDto>> {
        self.alarm_page(REALTIME_ALARMS, request, response)
    }

    /// Parses one page of history alarms.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_history_alarm_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<AlarmDto>> {
        self.alarm_page(HISTORY_ALARMS, request, response)
    }

    /// Request for the names of all alarm types.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownEndpoint`] if the registry lacks the
    /// endpoint.
    pub fn build_alarm_type_descriptions_request(&self) -> Result<RequestFields> {
        prepare(&self.registry, ALARM_TYPE_DESCRIPTIONS, RequestFields::new())
    }

    /// Parses alarm type names, sorted by code.
    ///
    /// Accepts a list of `{typeId, name}` records or an object keyed by code.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_alarm_type_descriptions_response(
        &self,
        response: &VendorResponse,
    ) -> Result<Vec<AlarmTypeDescriptionDto>> {
        let (_, data) = payload(&self.registry, ALARM_TYPE_DESCRIPTIONS, response)?;

        let listed = list_items(data, DESCRIPTION_LIST_KEYS);
        let mut descriptions: Vec<AlarmTypeDescriptionDto> = if listed.is_empty() {
            data.and_then(Value::as_object)
                .into_iter()
                .flatten()
                .filter_map(|(code, name)| {
                    Some(AlarmTypeDescriptionDto {
                        type_code: AlarmTypeCode(code.trim().parse().ok()?),
                        name: convert::text(name)?,
                    })
                })
                .collect()
        } else {
            listed
                .iter()
                .filter_map(|record| {
                    Some(AlarmTypeDescriptionDto {
                        type_code: AlarmTypeCode(TYPE_CODE.integer(record)?),
                        name: TYPE_NAME.text(record)?,
                    })
                })
                .collect()
        };
        descriptions.sort_by_key(|d| d.type_code);
        Ok(descriptions)
    }

    /// Attachment request for one alarm.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty alarm id.
    pub fn build_attachment_request(&self, alarm_id: &str) -> Result<RequestFields> {
        require_id("alarmId", alarm_id)?;
        prepare(&self.registry, ALARM_ATTACHMENTS, fields(json!({ "alarmId": alarm_id })))
    }

    /// Parses alarm attachments. Entries without a URL are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_attachment_response(
        &self,
        alarm_id: &str,
        response: &VendorResponse,
    ) -> Result<Vec<AttachmentDto>> {
        let (_, data) = payload(&self.registry, ALARM_ATTACHMENTS, response)?;
        let items = match list_items(data, ATTACHMENT_LIST_KEYS) {
            [] => records(data),
            items => items,
        };
        Ok(items
            .iter()
            .filter_map(|record| {
                Some(AttachmentDto {
                    alarm_id: ALARM_ID.text(record).or_else(|| Some(alarm_id.to_owned())),
                    url: ATTACHMENT_URL.text(record)?,
                    file_type: FILE_TYPE.integer(record),
                    channel: CHANNEL.integer(record),
                    timestamp_ms: HAPPENED_AT.timestamp_ms(record),
                })
            })
            .collect())
    }

    /// Driving statistics request for devices over `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid device list or
    /// an `end` before `start`.
    pub fn build_vehicle_statistics_request<S: AsRef<str>>(
        &self,
        device_ids: &[S],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RequestFields> {
        let device_ids = require_ids("deviceIds", device_ids)?;
        check_window(Some(start), Some(end))?;
        let body = json!({
            "deviceIds": device_ids,
            "startTime": start.timestamp(),
            "endTime": end.timestamp(),
        });
        prepare(&self.registry, VEHICLE_STATISTICS, fields(body))
    }

    /// Parses driving statistics.
    ///
    /// Records that name no device are attributed to `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_vehicle_statistics_response(
        &self,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Vec<VehicleStatisticsDto>> {
        let (_, data) = payload(&self.registry, VEHICLE_STATISTICS, response)?;
        let items = match list_items(data, STATISTICS_LIST_KEYS) {
            [] => records(data),
            items => items,
        };
        Ok(items.iter().map(|record| vehicle_statistics(record, device_id)).collect())
    }

    /// Trips, stops and alarms of one device over `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// `end` before `start`.
    pub fn build_vehicle_detail_request(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_window(Some(start), Some(end))?;
        let body = json!({
            "deviceId": device_id,
            "startTime": start.timestamp(),
            "endTime": end.timestamp(),
        });
        prepare(&self.registry, VEHICLE_DETAIL, fields(body))
    }

    /// Parses a vehicle detail answer.
    ///
    /// Returns `None` when the vendor has no data for the period. Every alarm
    /// is attributed to `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_vehicle_detail_response(
        &self,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Option<VehicleDetailDto>> {
        let (spec, data) = payload(&self.registry, VEHICLE_DETAIL, response)?;
        let Some(record @ Value::Object(_)) = data else {
            return Ok(None);
        };

        let listed =
            |key: &str| record.get(key).and_then(Value::as_array).cloned().unwrap_or_default();
        let alarms = list_items(data, DETAIL_ALARM_KEYS)
            .iter()
            .filter_map(|raw| alarm(raw, device_id, spec.units))
            .map(|found| AlarmDto { device_id: device_id.to_owned(), ..found })
            .collect();

        Ok(Some(VehicleDetailDto {
            device_id: device_id.to_owned(),
            trips: listed("trips"),
            stops: listed("stops"),
            alarms,
            total_distance_km: TOTAL_DISTANCE.number(record),
            total_duration_s: TOTAL_DURATION.integer(record),
        }))
    }

    fn alarm_request(&self, endpoint: &str, query: &AlarmQuery) -> Result<RequestFields> {
        let device_ids = require_ids("deviceIds", &query.device_ids)?;
        query.page.validate()?;
        check_window(query.start, query.end)?;

        let mut body = fields(json!({
            "deviceIds": device_ids,
            "pageArg": { "page": query.page.page, "pageSize": query.page.page_size },
        }));
        if let Some(start) = query.start {
            body.insert("start".to_owned(), json!(start.timestamp()));
        }
        if let Some(end) = query.end {
            body.insert("end".to_owned(), json!(end.timestamp()));
        }
        prepare(&self.registry, endpoint, body)
    }

    fn alarm_page(
        &self,
        endpoint: &str,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<AlarmDto>> {
        let (spec, data) = payload(&self.registry, endpoint, response)?;
        if data.is_none() {
            return Ok(Page::empty(request));
        }

        let mut items = Vec::new();
        for entry in list_items(data, ALARM_LIST_KEYS) {
            let device_id = DEVICE_ID.text(entry).unwrap_or_default();
            match entry.get("alarm") {
                Some(Value::Array(alarms)) => {
                    let parsed = alarms.iter().filter_map(|raw| alarm(raw, &device_id, spec.units));
                    items.extend(parsed);
                }
                Some(raw @ Value::Object(_)) => items.extend(alarm(raw, &device_id, spec.units)),
                Some(_) => {}
                // Flat alarm record, or a vehicle with nothing raised.
                None => items.extend(alarm(entry, &device_id, spec.units)),
            }
        }

        Ok(Page { items, total: page_total(data), page: request.page, page_size: request.page_size })
    }
}

fn check_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(BridgeError::ValidationError("end must not be before start".to_owned()))
        }
        _ => Ok(()),
    }
}

/// Alarm level from a numeric code or a name.
fn alarm_level(record: &Value) -> Option<AlarmLevel> {
    let raw = LEVEL.get(record)?;
    convert::integer(raw)
        .map(AlarmLevel::from_code)
        .or_else(|| raw.as_str().and_then(AlarmLevel::from_name))
}

/// Normalized alarm, or `None` if the record has no alarm id.
fn alarm(record: &Value, device_id: &str, units: UnitSpec) -> Option<AlarmDto> {
    Some(AlarmDto {
        alarm_id: ALARM_ID.text(record)?,
        device_id: DEVICE_ID.text(record).unwrap_or_else(|| device_id.to_owned()),
        type_code: TYPE_CODE.integer(record).map(AlarmTypeCode),
        level: alarm_level(record),
        message: MESSAGE.text(record),
        timestamp_ms: HAPPENED_AT.timestamp_ms(record),
        latitude: LATITUDE.get(record).and_then(|v| units.coordinates.decode(v)),
        longitude: LONGITUDE.get(record).and_then(|v| units.coordinates.decode(v)),
        address: ADDRESS.text(record),
        speed_kmh: SPEED.get(record).and_then(|v| units.speed.to_kmh(v)),
        altitude_m: ALTITUDE.number(record),
        has_attachment: HAS_ATTACHMENT.flag(record).unwrap_or(false),
        status: STATUS.text(record).unwrap_or_else(|| DEFAULT_ALARM_STATUS.to_owned()),
    })
}

fn vehicle_statistics(record: &Value, device_id: &str) -> VehicleStatisticsDto {
    VehicleStatisticsDto {
        device_id: DEVICE_ID.text(record).unwrap_or_else(|| device_id.to_owned()),
        total_distance_km: TOTAL_DISTANCE.number(record),
        total_duration_s: TOTAL_DURATION.integer(record),
        average_speed_kmh: AVERAGE_SPEED.number(record),
        max_speed_kmh: MAX_SPEED.number(record),
        total_stops: TOTAL_STOPS.integer(record),
        fuel_consumption: FUEL.number(record),
        idle_time_s: IDLE_TIME.integer(record),
        total_alarms: TOTAL_ALARMS.integer(record),
    }
}
