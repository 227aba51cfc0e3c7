//! GPS adapter: latest position, detailed track and track dates.
//!
//! Both API versions take the same request fields. They differ in endpoint
//! and in the units their responses use, which the registry declares per
//! endpoint.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde_json::{Value, json};
use tracing::debug;

use super::{
    convert::{self, Aliases, SourceChain},
    fields, list_items, payload, prepare, records, require_id,
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{LatestGpsDto, TimestampSource, TrackDatesDto, TrackPlaybackDto, TrackPointDto},
    registry::{EndpointRegistry, RequestFields, UnitSpec},
};

/// How far back a v1 latest-position query looks.
pub const LATEST_GPS_LOOKBACK_HOURS: i64 = 24;

/// Longest window a detailed track query accepts.
pub const MAX_DETAILED_TRACK_DAYS: i64 = 3;

/// Most calendar dates a track dates query covers, counting both ends.
pub const MAX_TRACK_DATES_DAYS: i64 = 31;

const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "imei", "device_id"]);
const LATITUDE: Aliases = Aliases::new(&["latitude", "lat", "gps.latitude", "gps.lat"]);
const LONGITUDE: Aliases = Aliases::new(&["longitude", "lng", "lon", "gps.longitude", "gps.lng"]);
const SPEED: Aliases = Aliases::new(&["speed", "spd", "gps.speed"]);
const DIRECTION: Aliases = Aliases::new(&["direction", "course", "dir", "gps.direction"]);
const ALTITUDE: Aliases = Aliases::new(&["height", "altitude", "alt", "gps.height", "gps.altitude"]);
const ADDRESS: Aliases = Aliases::new(&["address", "gps.address"]);
const POINT_TIME: Aliases = Aliases::new(&["time", "gpsTime", "timestamp", "gps.time"]);
const TRACK_START: Aliases = Aliases::new(&["startTime", "start"]);
const TRACK_END: Aliases = Aliases::new(&["endTime", "end"]);

/// GPS fix time wins over the device's last online time.
const POSITION_TIME: SourceChain<TimestampSource> = SourceChain::new(&[
    (
        TimestampSource::GpsFix,
        Aliases::new(&["gps.time", "gps.gpsTime", "gpsTime", "time", "timestamp"]),
    ),
    (
        TimestampSource::DeviceLastOnline,
        Aliases::new(&["lastOnlineTime", "lastOnline", "device.lastOnlineTime"]),
    ),
]);

const LATEST_LIST_KEYS: &[&str] = &["gpsInfo", "list", "devices"];
const TRACK_POINT_KEYS: &[&str] = &["points", "gpsInfo", "list", "tracks"];
const TRACK_DATE_KEYS: &[&str] = &["dates", "list"];
const TRACK_DATE_FORMATS: &[&str] = &[convert::VENDOR_DATE_FORMAT, "%Y%m%d", "%Y/%m/%d"];

/// Vendor GPS API generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    /// Scaled coordinates, speeds in tenths of km/h.
    #[default]
    V1,
    /// Decimal coordinates, speeds in km/h.
    V2,
}

impl ApiVersion {
    /// Endpoint of the latest-position query.
    #[must_use]
    pub fn latest_endpoint(self) -> &'static str {
        match self {
            Self::V1 => "gps_search_v1",
            Self::V2 => "gps_get_latest_v2",
        }
    }

    /// Endpoint of the detailed track query.
    #[must_use]
    pub fn detailed_track_endpoint(self) -> &'static str {
        match self {
            Self::V1 => "gps_query_detailed_track_v1",
            Self::V2 => "gps_query_detailed_track_v2",
        }
    }

    /// Endpoint of the track dates query.
    #[must_use]
    pub fn track_dates_endpoint(self) -> &'static str {
        match self {
            Self::V1 => "gps_query_track_dates_v1",
            Self::V2 => "gps_query_track_dates_v2",
        }
    }
}

/// Builds and parses GPS requests.
#[derive(Debug, Clone)]
pub struct GpsAdapter {
    registry: Arc<EndpointRegistry>,
}

impl GpsAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Latest position request.
    ///
    /// V1 queries the last [`LATEST_GPS_LOOKBACK_HOURS`] hours before `now`
    /// with second resolution; V2 needs only the device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id.
    pub fn build_latest_gps_request(
        &self,
        version: ApiVersion,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        let body = match version {
            ApiVersion::V1 => {
                let start = now - TimeDelta::hours(LATEST_GPS_LOOKBACK_HOURS);
                json!({
                    "deviceId": device_id,
                    "startTime": start.timestamp(),
                    "endTime": now.timestamp(),
                })
            }
            ApiVersion::V2 => json!({ "deviceId": device_id }),
        };
        prepare(&self.registry, version.latest_endpoint(), fields(body))
    }

    /// Detailed track request for `[start, end]`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ValidationError`] for an empty device id or `end`
    ///   before `start`
    /// - [`BridgeError::RangeTooLarge`] if the window exceeds
    ///   [`MAX_DETAILED_TRACK_DAYS`]
    pub fn build_detailed_track_request(
        &self,
        version: ApiVersion,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_window(end - start, TimeDelta::days(MAX_DETAILED_TRACK_DAYS))?;

        let body = json!({
            "deviceId": device_id,
            "startTime": start.timestamp(),
            "endTime": end.timestamp(),
        });
        prepare(&self.registry, version.detailed_track_endpoint(), fields(body))
    }

    /// Request for the dates with recorded track between `start` and `end`,
    /// both inclusive.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ValidationError`] for an empty device id or `end`
    ///   before `start`
    /// - [`BridgeError::RangeTooLarge`] if the window covers more than
    ///   [`MAX_TRACK_DATES_DAYS`] dates, so 2024-05-01 to 2024-05-31 is the
    ///   widest May query
    pub fn build_track_dates_request(
        &self,
        version: ApiVersion,
        device_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        if end < start {
            return Err(BridgeError::ValidationError("end must not be before start".to_owned()));
        }
        let covered = end.signed_duration_since(start) + TimeDelta::days(1);
        check_window(covered, TimeDelta::days(MAX_TRACK_DATES_DAYS))?;

        let body = json!({
            "deviceId": device_id,
            "startDate": convert::format_vendor_date(start),
            "endDate": convert::format_vendor_date(end),
        });
        prepare(&self.registry, version.track_dates_endpoint(), fields(body))
    }

    /// Parses a latest-position answer.
    ///
    /// Returns `None` when the vendor has no record for the device. The
    /// timestamp comes from the GPS fix and falls back to the device's last
    /// online time; [`LatestGpsDto::timestamp_source`] tells which.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_latest_gps_response(
        &self,
        version: ApiVersion,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Option<LatestGpsDto>> {
        let (spec, data) = payload(&self.registry, version.latest_endpoint(), response)?;

        let candidates = match data {
            Some(Value::Object(_)) if !list_items(data, LATEST_LIST_KEYS).is_empty() => {
                list_items(data, LATEST_LIST_KEYS)
            }
            _ => records(data),
        };
        let Some(record) = select_device_record(candidates, device_id) else {
            debug!(correlation_id = %response.correlation_id, device_id, "no position on record");
            return Ok(None);
        };

        let latest = latest_from_record(record, device_id, spec.units);
        if latest.latitude.is_none() && latest.timestamp_ms.is_none() {
            debug!(correlation_id = %response.correlation_id, device_id, "position record is empty");
            return Ok(None);
        }
        Ok(Some(latest))
    }

    /// Parses a detailed track answer.
    ///
    /// Points without coordinates or timestamp are dropped. The window comes
    /// from the vendor's `startTime`/`endTime` and falls back to the first and
    /// last point.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_detailed_track_response(
        &self,
        version: ApiVersion,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Option<TrackPlaybackDto>> {
        let (spec, data) = payload(&self.registry, version.detailed_track_endpoint(), response)?;
        let Some(data) = data else {
            return Ok(None);
        };

        let raw_points = list_items(Some(data), TRACK_POINT_KEYS);
        let points: Vec<TrackPointDto> =
            raw_points.iter().filter_map(|point| track_point(point, spec.units)).collect();
        let dropped = raw_points.len() - points.len();
        if dropped > 0 {
            debug!(correlation_id = %response.correlation_id, dropped, "skipped incomplete track points");
        }

        let start_time_ms = TRACK_START
            .timestamp_ms(data)
            .or_else(|| points.iter().map(|p| p.timestamp_ms).min())
            .unwrap_or_default();
        let end_time_ms = TRACK_END
            .timestamp_ms(data)
            .or_else(|| points.iter().map(|p| p.timestamp_ms).max())
            .unwrap_or_default();

        Ok(Some(TrackPlaybackDto { device_id: device_id.to_owned(), start_time_ms, end_time_ms, points }))
    }

    /// Parses a track dates answer into sorted `YYYY-MM-DD` strings.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_track_dates_response(
        &self,
        version: ApiVersion,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<TrackDatesDto> {
        let (_, data) = payload(&self.registry, version.track_dates_endpoint(), response)?;

        let mut dates: Vec<NaiveDate> =
            list_items(data, TRACK_DATE_KEYS).iter().filter_map(track_date).collect();
        dates.sort_unstable();
        dates.dedup();

        Ok(TrackDatesDto {
            device_id: device_id.to_owned(),
            dates: dates.into_iter().map(convert::format_vendor_date).collect(),
        })
    }
}

fn check_window(span: TimeDelta, max: TimeDelta) -> Result<()> {
    if span < TimeDelta::zero() {
        return Err(BridgeError::ValidationError("end must not be before start".to_owned()));
    }
    if span > max {
        return Err(BridgeError::range_too_large(span, max));
    }
    Ok(())
}

/// Record for `device_id`, or the first record that names no device.
fn select_device_record<'a>(records: &'a [Value], device_id: &str) -> Option<&'a Value> {
    records
        .iter()
        .find(|record| DEVICE_ID.text(record).as_deref() == Some(device_id))
        .or_else(|| records.iter().find(|record| DEVICE_ID.get(record).is_none()))
}

fn latest_from_record(record: &Value, device_id: &str, units: UnitSpec) -> LatestGpsDto {
    let time = POSITION_TIME.resolve(record, convert::timestamp_ms);
    LatestGpsDto {
        device_id: device_id.to_owned(),
        latitude: LATITUDE.get(record).and_then(|v| units.coordinates.decode(v)),
        longitude: LONGITUDE.get(record).and_then(|v| units.coordinates.decode(v)),
        speed_kmh: SPEED.get(record).and_then(|v| units.speed.to_kmh(v)),
        direction_deg: DIRECTION.number(record),
        altitude_m: ALTITUDE.number(record),
        timestamp_ms: time.map(|t| t.value),
        timestamp_source: time.map(|t| t.source),
        address: ADDRESS.text(record),
    }
}

fn track_point(point: &Value, units: UnitSpec) -> Option<TrackPointDto> {
    Some(TrackPointDto {
        latitude: units.coordinates.decode(LATITUDE.get(point)?)?,
        longitude: units.coordinates.decode(LONGITUDE.get(point)?)?,
        timestamp_ms: POINT_TIME.timestamp_ms(point)?,
        speed_kmh: SPEED.get(point).and_then(|v| units.speed.to_kmh(v)),
        direction_deg: DIRECTION.number(point),
    })
}

fn track_date(value: &Value) -> Option<NaiveDate> {
    let text = convert::text(value)?;
    TRACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
}
