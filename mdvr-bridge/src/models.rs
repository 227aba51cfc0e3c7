//! Normalized data transfer objects.
//!
//! Adapters turn vendor payloads into these types. Field names and units are
//! stable regardless of what the vendor sends: timestamps are milliseconds
//! since the Unix epoch, coordinates are decimal degrees and speeds are km/h.
//! Everything serializes with camelCase keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Requested page of a paginated vendor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Page number, starting at 1.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
}

impl PageRequest {
    /// Largest page size the vendor accepts.
    pub const MAX_PAGE_SIZE: u32 = 1000;

    /// Creates a page request.
    #[must_use]
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Checks page bounds.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] if `page` is 0 or
    /// `page_size` is outside `1..=1000`.
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(BridgeError::ValidationError("page starts at 1".to_owned()));
        }
        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(BridgeError::ValidationError(format!(
                "pageSize must be between 1 and {}, got {}",
                Self::MAX_PAGE_SIZE,
                self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, page_size: 10 }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total item count reported by the vendor.
    pub total: Option<u64>,
    /// Page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// An empty page.
    #[must_use]
    pub fn empty(request: PageRequest) -> Self {
        Self { items: Vec::new(), total: Some(0), page: request.page, page_size: request.page_size }
    }

    /// Returns `true` if the vendor reports more items after this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.total.is_some_and(|total| {
            u64::from(self.page).saturating_mul(u64::from(self.page_size)) < total
        })
    }
}

// ---------------------------------------------------------------------------
// GPS
// ---------------------------------------------------------------------------

/// Field that supplied a "last seen" timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Time of the GPS fix.
    GpsFix,
    /// Device-level last online time.
    DeviceLastOnline,
}

/// Latest known position of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestGpsDto {
    /// Device identifier.
    pub device_id: String,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Heading in degrees.
    pub direction_deg: Option<f64>,
    /// Altitude in meters.
    pub altitude_m: Option<f64>,
    /// Last seen time in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Which vendor field `timestamp_ms` came from.
    pub timestamp_source: Option<TimestampSource>,
    /// Reverse-geocoded address, if the vendor supplies one.
    pub address: Option<String>,
}

/// One point of a recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPointDto {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Fix time in milliseconds.
    pub timestamp_ms: i64,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Heading in degrees.
    pub direction_deg: Option<f64>,
}

/// Track of a device over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPlaybackDto {
    /// Device identifier.
    pub device_id: String,
    /// Range start in milliseconds.
    pub start_time_ms: i64,
    /// Range end in milliseconds.
    pub end_time_ms: i64,
    /// Points in vendor order.
    pub points: Vec<TrackPointDto>,
}

/// Days on which a device recorded a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDatesDto {
    /// Device identifier.
    pub device_id: String,
    /// Dates as `YYYY-MM-DD`.
    pub dates: Vec<String>,
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Vendor connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineState {
    /// State 0.
    Offline,
    /// State 1.
    Online,
    /// State 2. Counted as offline.
    LowPower,
}

impl OnlineState {
    /// Maps a vendor state code.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Offline),
            1 => Some(Self::Online),
            2 => Some(Self::LowPower),
            _ => None,
        }
    }

    /// Only [`OnlineState::Online`] counts as online.
    #[must_use]
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Device from the vendor device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    /// Device identifier.
    pub device_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Vehicle plate number.
    pub plate_no: Option<String>,
    /// Connectivity state.
    pub online_state: Option<OnlineState>,
    /// `true` only when the state is online.
    pub online: Option<bool>,
    /// Ignition state.
    pub acc_on: Option<bool>,
    /// Service expiry in milliseconds.
    pub expiration_ms: Option<i64>,
}

/// Ignition and connectivity state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccStateDto {
    /// Device identifier.
    pub device_id: String,
    /// Connectivity state.
    pub online_state: Option<OnlineState>,
    /// `true` only when the state is online.
    pub online: Option<bool>,
    /// Ignition state.
    pub acc_on: Option<bool>,
    /// Last online time in milliseconds, when the vendor reports it.
    pub last_online_time_ms: Option<i64>,
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Declares a vendor code enum with a checked `TryFrom<i64>`.
macro_rules! vendor_code_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code ),+
        }

        impl $name {
            /// Raw vendor code.
            #[must_use]
            pub fn code(self) -> i64 {
                self as i64
            }
        }

        impl TryFrom<i64> for $name {
            type Error = BridgeError;

            fn try_from(code: i64) -> Result<Self> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(BridgeError::ValidationError(format!(
                        "{} {other} is not one of {:?}",
                        $label,
                        [$($code),+]
                    ))),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}({})", self, self.code())
            }
        }
    };
}

vendor_code_enum! {
    /// What a live session carries.
    PreviewMode, "dataType" {
        /// Audio and video.
        Preview = 1,
        /// Audio monitoring only.
        Monitor = 3,
    }
}

vendor_code_enum! {
    /// Encoder stream.
    StreamType, "streamType" {
        /// Main stream.
        Main = 0,
        /// Sub stream.
        Sub = 1,
    }
}

vendor_code_enum! {
    /// Playback control command.
    PlaybackControl, "ctrl" {
        /// Start or resume.
        Start = 0,
        /// Pause.
        Pause = 1,
        /// Stop.
        Stop = 2,
        /// Fast forward.
        FastForward = 3,
        /// Key frame rewind.
        KeyFrameRewind = 4,
        /// Seek to a position.
        Seek = 5,
        /// Key frame playback.
        KeyFramePlay = 6,
    }
}

vendor_code_enum! {
    /// Playback speed multiplier.
    PlaybackSpeed, "speed" {
        /// Normal speed.
        Normal = 0,
        /// 1x.
        X1 = 1,
        /// 2x.
        X2 = 2,
        /// 4x.
        X4 = 3,
        /// 8x.
        X8 = 4,
        /// 16x.
        X16 = 5,
    }
}

/// One live or playback stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStreamDto {
    /// Device identifier.
    pub device_id: String,
    /// Camera channel.
    pub channel: i64,
    /// Stream URL.
    pub play_url: String,
    /// Raw stream type.
    pub stream_type: Option<i64>,
    /// Raw data type.
    pub data_type: Option<i64>,
}

/// Streams opened by a preview or playback request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSessionDto {
    /// Device identifier.
    pub device_id: String,
    /// Opened streams.
    pub videos: Vec<VideoStreamDto>,
}

/// Recording stored on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFileDto {
    /// Device identifier.
    pub device_id: String,
    /// Camera channel.
    pub channel: Option<i64>,
    /// Recording start in milliseconds.
    pub start_time_ms: Option<i64>,
    /// Recording end in milliseconds.
    pub end_time_ms: Option<i64>,
    /// File size in bytes.
    pub size_bytes: Option<u64>,
    /// Raw stream type.
    pub stream_type: Option<i64>,
    /// File name or path on the device.
    pub file_name: Option<String>,
}

/// Days of a month with recordings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingCalendarDto {
    /// Device identifier.
    pub device_id: String,
    /// Dates as `YYYY-MM-DD`.
    pub dates: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Text delivery task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    /// Task identifier.
    pub task_id: String,
    /// Task name.
    pub name: Option<String>,
    /// Target device, empty if the task targets several.
    pub device_id: String,
    /// Message text.
    pub content: Option<String>,
    /// Vendor status, verbatim.
    pub status: Option<String>,
    /// Creation time in milliseconds.
    pub created_at_ms: Option<i64>,
    /// Scheduled send time in milliseconds.
    pub send_time_ms: Option<i64>,
    /// Completion time in milliseconds.
    pub completed_at_ms: Option<i64>,
    /// Opaque vendor result.
    pub result: Option<Value>,
}

/// Delivery outcome of a task on one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResultDto {
    /// Task identifier.
    pub id: String,
    /// Device identifier.
    pub device_id: String,
    /// Vendor status, verbatim.
    pub status: Option<String>,
    /// Reply reported by the device.
    pub reply_result: Option<String>,
    /// Delivery time in milliseconds.
    pub delivered_at_ms: Option<i64>,
    /// Acknowledgement time in milliseconds.
    pub acknowledged_at_ms: Option<i64>,
    /// Delivery attempts so far.
    pub delivery_attempts: Option<u32>,
    /// Opaque error details.
    pub error_details: Option<Value>,
}

// ---------------------------------------------------------------------------
// Alarms and statistics
// ---------------------------------------------------------------------------

/// Six digit alarm type code `AABBCC`.
///
/// The digits are exposed as category (`AA`), group (`BB`) and item (`CC`)
/// without interpreting them. Codes above 999999 are kept but not split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmTypeCode(pub i64);

impl AlarmTypeCode {
    const MAX_SPLIT: i64 = 999_999;

    /// Raw code.
    #[must_use]
    pub fn raw(self) -> i64 {
        self.0
    }

    fn splittable(self) -> bool {
        (0..=Self::MAX_SPLIT).contains(&self.0)
    }

    /// Leading two digits.
    #[must_use]
    pub fn category(self) -> Option<i64> {
        self.splittable().then_some(self.0 / 10_000)
    }

    /// Middle two digits.
    #[must_use]
    pub fn group(self) -> Option<i64> {
        self.splittable().then_some((self.0 / 100) % 100)
    }

    /// Trailing two digits.
    #[must_use]
    pub fn item(self) -> Option<i64> {
        self.splittable().then_some(self.0 % 100)
    }
}

impl fmt::Display for AlarmTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.splittable() { write!(f, "{:06}", self.0) } else { write!(f, "{}", self.0) }
    }
}

/// Alarm severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmLevel {
    /// Level 1.
    Critical,
    /// Level 2.
    Warning,
    /// Level 3 and anything unrecognised.
    Info,
}

impl AlarmLevel {
    /// Maps a vendor level code.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Critical,
            2 => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Maps a level name such as `"WARNING"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

/// One alarm event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDto {
    /// Alarm identifier.
    pub alarm_id: String,
    /// Device identifier.
    pub device_id: String,
    /// Alarm type.
    pub type_code: Option<AlarmTypeCode>,
    /// Severity.
    pub level: Option<AlarmLevel>,
    /// Vendor message.
    pub message: Option<String>,
    /// Event time in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Address, if supplied.
    pub address: Option<String>,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Altitude in meters.
    pub altitude_m: Option<f64>,
    /// Whether media evidence exists.
    pub has_attachment: bool,
    /// Vendor status, `"active"` if absent.
    pub status: String,
}

/// Alarm counts by severity.
///
/// Alarms without a level count as [`AlarmLevel::Info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSummary {
    /// Alarms counted.
    pub total: u64,
    /// Level 1 alarms.
    pub critical: u64,
    /// Level 2 alarms.
    pub warning: u64,
    /// Level 3 and unlevelled alarms.
    pub info: u64,
}

impl AlarmSummary {
    /// Tallies `alarms` by level.
    #[must_use]
    pub fn of(alarms: &[AlarmDto]) -> Self {
        alarms.iter().fold(Self::default(), |mut summary, alarm| {
            summary.total += 1;
            match alarm.level.unwrap_or(AlarmLevel::Info) {
                AlarmLevel::Critical => summary.critical += 1,
                AlarmLevel::Warning => summary.warning += 1,
                AlarmLevel::Info => summary.info += 1,
            }
            summary
        })
    }
}

impl Page<AlarmDto> {
    /// Severity counts of the alarms on this page.
    #[must_use]
    pub fn summary(&self) -> AlarmSummary {
        AlarmSummary::of(&self.items)
    }
}

/// Human readable name of an alarm type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmTypeDescriptionDto {
    /// Alarm type.
    pub type_code: AlarmTypeCode,
    /// Vendor description.
    pub name: String,
}

/// Media evidence attached to an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    /// Alarm the file belongs to.
    pub alarm_id: Option<String>,
    /// Download URL.
    pub url: String,
    /// Raw file type.
    pub file_type: Option<i64>,
    /// Camera channel.
    pub channel: Option<i64>,
    /// Capture time in milliseconds.
    pub timestamp_ms: Option<i64>,
}

/// Driving totals of one vehicle over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatisticsDto {
    /// Device identifier.
    pub device_id: String,
    /// Distance in kilometers.
    pub total_distance_km: Option<f64>,
    /// Driving time in seconds.
    pub total_duration_s: Option<i64>,
    /// Average speed in km/h.
    pub average_speed_kmh: Option<f64>,
    /// Top speed in km/h.
    pub max_speed_kmh: Option<f64>,
    /// Number of stops.
    pub total_stops: Option<i64>,
    /// Fuel used, in vendor units.
    pub fuel_consumption: Option<f64>,
    /// Idle time in seconds.
    pub idle_time_s: Option<i64>,
    /// Alarms raised.
    pub total_alarms: Option<i64>,
}

/// Trips, stops and alarms of one vehicle over a period.
///
/// Trips and stops are kept as the vendor sends them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetailDto {
    /// Device identifier.
    pub device_id: String,
    /// Vendor trip records.
    pub trips: Vec<Value>,
    /// Vendor stop records.
    pub stops: Vec<Value>,
    /// Alarms raised in the period.
    pub alarms: Vec<AlarmDto>,
    /// Distance in kilometers.
    pub total_distance_km: Option<f64>,
    /// Driving time in seconds.
    pub total_duration_s: Option<i64>,
}

impl VehicleDetailDto {
    /// Severity counts of the period's alarms.
    #[must_use]
    pub fn alarm_summary(&self) -> AlarmSummary {
        AlarmSummary::of(&self.alarms)
    }
}

// ---------------------------------------------------------------------------
// Forwarding
// ---------------------------------------------------------------------------

/// Third-party platform that receives forwarded device data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingPlatformDto {
    /// Platform identifier.
    pub platform_id: String,
    /// Platform name.
    pub name: Option<String>,
    /// Receiving URL.
    pub url: Option<String>,
    /// Whether forwarding is enabled.
    pub enabled: Option<bool>,
}

/// Rule selecting which messages go to a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingPolicyDto {
    /// Policy identifier.
    pub policy_id: String,
    /// Policy name.
    pub name: Option<String>,
    /// Target platform.
    pub platform_id: Option<String>,
    /// Forwarded message kinds.
    pub msg_ids: Vec<i64>,
}

/// Forwarding assignment of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceForwardingDto {
    /// Device identifier.
    pub device_id: String,
    /// Assigned policies.
    pub policy_ids: Vec<String>,
}

/// Position pushed by the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedGps {
    /// Device identifier.
    pub device_id: String,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Heading in degrees.
    pub direction_deg: Option<f64>,
    /// Altitude in meters.
    pub altitude_m: Option<f64>,
    /// Fix time in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Ignition state from the status flags.
    pub acc_on: Option<bool>,
}

/// One alarm flag of a pushed alarm message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedAlarmItem {
    /// Alarm type.
    pub type_code: AlarmTypeCode,
    /// `true` when raised (vendor `Status` 0), `false` when cleared.
    pub active: bool,
}

/// Alarm pushed by the vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedAlarm {
    /// Device identifier.
    pub device_id: String,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Speed in km/h.
    pub speed_kmh: Option<f64>,
    /// Event time in milliseconds.
    pub timestamp_ms: Option<i64>,
    /// Ignition state from the status flags.
    pub acc_on: Option<bool>,
    /// Alarm flags in vendor order.
    pub items: Vec<ForwardedAlarmItem>,
}

/// Status change pushed by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedStatus {
    /// Device identifier.
    pub device_id: String,
    /// Ignition state, if reported.
    pub acc_on: Option<bool>,
    /// Connectivity, if reported.
    pub online: Option<bool>,
}

/// Message pushed by the vendor's forwarding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardedMessage {
    /// `msgId` 1.
    Gps {
        /// Positions in vendor order.
        positions: Vec<ForwardedGps>,
    },
    /// `msgId` 2.
    Alarm(ForwardedAlarm),
    /// `msgId` 3.
    Status(ForwardedStatus),
    /// Any other `msgId`, kept verbatim.
    Unknown {
        /// Raw message id, if present.
        msg_id: Option<i64>,
        /// Raw payload.
        payload: Value,
    },
}
