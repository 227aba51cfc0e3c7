//! Media adapter: live preview, playback, intercom and recordings.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{Value, json};

use super::{
    convert::{self, Aliases},
    fields, list_items, payload, prepare, require_id,
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{
        MediaFileDto, MediaSessionDto, PlaybackControl, PlaybackSpeed, PreviewMode,
        RecordingCalendarDto, StreamType, VideoStreamDto,
    },
    registry::{EndpointRegistry, RequestFields},
};

/// Endpoint of the live preview.
pub const MEDIA_PREVIEW: &str = "media_preview";
/// Endpoint closing a live preview.
pub const MEDIA_CLOSE_PREVIEW: &str = "media_close_preview";
/// Endpoint of recorded playback.
pub const MEDIA_PLAYBACK: &str = "media_playback";
/// Endpoint controlling a running playback.
pub const MEDIA_PLAYBACK_CONTROL: &str = "media_playback_control";
/// Endpoint closing a playback.
pub const MEDIA_CLOSE_PLAYBACK: &str = "media_close_playback";
/// Endpoint starting two-way audio.
pub const INTERCOM_START: &str = "intercom_start";
/// Endpoint ending two-way audio.
pub const INTERCOM_END: &str = "intercom_end";
/// Endpoint listing recorded files.
pub const MEDIA_FILE_LIST: &str = "media_file_list";
/// Endpoint listing days with recordings.
pub const MEDIA_CALENDAR: &str = "media_calendar";

/// Valid camera channels.
pub const CHANNELS: std::ops::RangeInclusive<u8> = 1..=16;

const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "device_id"]);
const CHANNEL: Aliases = Aliases::new(&["channel", "channelNo", "chn"]);
const PLAY_URL: Aliases = Aliases::new(&["playUrl", "play_url", "url"]);
const STREAM_TYPE: Aliases = Aliases::new(&["streamType", "stream_type"]);
const DATA_TYPE: Aliases = Aliases::new(&["dataType", "data_type"]);
const START: Aliases = Aliases::new(&["startTime", "beginTime", "start"]);
const END: Aliases = Aliases::new(&["endTime", "end"]);
const SIZE: Aliases = Aliases::new(&["fileSize", "size"]);
const FILE_NAME: Aliases = Aliases::new(&["fileName", "name"]);

const VIDEO_KEYS: &[&str] = &["videos", "list"];
const FILE_KEYS: &[&str] = &["list", "files"];
const CALENDAR_KEYS: &[&str] = &["dates", "days", "list"];

/// Recorded playback window and stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackParams {
    /// Device to play back from.
    pub device_id: String,
    /// Camera channel, 1 to 16.
    pub channel: u8,
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end, after `start`.
    pub end: DateTime<Utc>,
    /// Audio and video, or video only.
    pub mode: PreviewMode,
    /// Stream, vendor default when `None`.
    pub stream: Option<StreamType>,
}

/// Builds and parses media requests.
#[derive(Debug, Clone)]
pub struct MediaAdapter {
    registry: Arc<EndpointRegistry>,
}

impl MediaAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Live preview request for one channel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or a
    /// channel outside [`CHANNELS`].
    pub fn build_preview_request(
        &self,
        device_id: &str,
        channel: u8,
        mode: PreviewMode,
        stream: StreamType,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_channel(channel)?;
        let body = json!({
            "deviceId": device_id,
            "channels": [channel],
            "dataType": mode,
            "streamType": stream,
        });
        prepare(&self.registry, MEDIA_PREVIEW, fields(body))
    }

    /// Closes a preview. No channels means channel 1.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// invalid channel.
    pub fn build_close_preview_request(&self, device_id: &str, channels: &[u8]) -> Result<RequestFields> {
        self.close_request(MEDIA_CLOSE_PREVIEW, device_id, channels)
    }

    /// Recorded playback request. Times are sent as UTC
    /// `YYYY-MM-DD HH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id, an
    /// invalid channel or a window that does not end after it starts.
    pub fn build_playback_request(&self, params: &PlaybackParams) -> Result<RequestFields> {
        require_id("deviceId", &params.device_id)?;
        check_channel(params.channel)?;
        check_order(params.start, params.end)?;

        let mut body = fields(json!({
            "deviceId": params.device_id,
            "channels": [params.channel],
            "startTime": convert::format_vendor_datetime(params.start),
            "endTime": convert::format_vendor_datetime(params.end),
            "dataType": params.mode,
        }));
        if let Some(stream) = params.stream {
            body.insert("streamType".to_owned(), json!(stream));
        }
        prepare(&self.registry, MEDIA_PLAYBACK, body)
    }

    /// Controls a running playback.
    ///
    /// `seek_to` is required for [`PlaybackControl::Seek`] and ignored
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id, an
    /// invalid channel or a seek without target.
    pub fn build_playback_control_request(
        &self,
        device_id: &str,
        channel: u8,
        control: PlaybackControl,
        speed: PlaybackSpeed,
        seek_to: Option<DateTime<Utc>>,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_channel(channel)?;

        let mut body = fields(json!({
            "deviceId": device_id,
            "channel": channel,
            "ctrl": control,
            "speed": speed,
        }));
        if control == PlaybackControl::Seek {
            let target = seek_to.ok_or_else(|| {
                BridgeError::ValidationError("seek requires a target time".to_owned())
            })?;
            body.insert("seekTime".to_owned(), json!(convert::format_vendor_datetime(target)));
        }
        prepare(&self.registry, MEDIA_PLAYBACK_CONTROL, body)
    }

    /// Closes a playback. No channels means channel 1.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// invalid channel.
    pub fn build_close_playback_request(&self, device_id: &str, channels: &[u8]) -> Result<RequestFields> {
        self.close_request(MEDIA_CLOSE_PLAYBACK, device_id, channels)
    }

    /// Starts two-way audio on a channel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// invalid channel.
    pub fn build_intercom_start_request(&self, device_id: &str, channel: u8) -> Result<RequestFields> {
        self.intercom_request(INTERCOM_START, device_id, channel)
    }

    /// Ends two-way audio on a channel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id or an
    /// invalid channel.
    pub fn build_intercom_end_request(&self, device_id: &str, channel: u8) -> Result<RequestFields> {
        self.intercom_request(INTERCOM_END, device_id, channel)
    }

    /// Lists recorded files of one channel in a window.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id, an
    /// invalid channel or a window that does not end after it starts.
    pub fn build_file_list_request(
        &self,
        device_id: &str,
        channel: u8,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        stream: Option<StreamType>,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_channel(channel)?;
        check_order(start, end)?;

        let mut body = fields(json!({
            "deviceId": device_id,
            "channel": channel,
            "startTime": convert::format_vendor_datetime(start),
            "endTime": convert::format_vendor_datetime(end),
        }));
        if let Some(stream) = stream {
            body.insert("streamType".to_owned(), json!(stream));
        }
        prepare(&self.registry, MEDIA_FILE_LIST, body)
    }

    /// Asks which days of a month have recordings.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id, an
    /// invalid channel or a month outside 1 to 12.
    pub fn build_calendar_request(
        &self,
        device_id: &str,
        channel: u8,
        year: i32,
        month: u32,
    ) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_channel(channel)?;
        let first = month_start(year, month)?;

        let body = json!({
            "deviceId": device_id,
            "channel": channel,
            "month": first.format("%Y-%m").to_string(),
        });
        prepare(&self.registry, MEDIA_CALENDAR, fields(body))
    }

    /// Parses a preview answer into its stream URLs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_preview_response(&self, device_id: &str, response: &VendorResponse) -> Result<MediaSessionDto> {
        self.session(MEDIA_PREVIEW, device_id, response)
    }

    /// Parses a playback answer into its stream URLs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_playback_response(&self, device_id: &str, response: &VendorResponse) -> Result<MediaSessionDto> {
        self.session(MEDIA_PLAYBACK, device_id, response)
    }

    /// Parses a recorded file list.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_file_list_response(
        &self,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Vec<MediaFileDto>> {
        let (_, data) = payload(&self.registry, MEDIA_FILE_LIST, response)?;
        Ok(list_items(data, FILE_KEYS).iter().map(|record| media_file(record, device_id)).collect())
    }

    /// Parses a recording calendar into sorted `YYYY-MM-DD` strings.
    ///
    /// The vendor sends either full dates or day numbers of the requested
    /// month.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ValidationError`] for a month outside 1 to 12
    /// - [`BridgeError::VendorError`] for a non-success code
    pub fn parse_calendar_response(
        &self,
        device_id: &str,
        year: i32,
        month: u32,
        response: &VendorResponse,
    ) -> Result<RecordingCalendarDto> {
        let first = month_start(year, month)?;
        let (_, data) = payload(&self.registry, MEDIA_CALENDAR, response)?;

        let mut dates: Vec<NaiveDate> = list_items(data, CALENDAR_KEYS)
            .iter()
            .filter_map(|entry| calendar_day(entry, first))
            .collect();
        dates.sort_unstable();
        dates.dedup();

        Ok(RecordingCalendarDto {
            device_id: device_id.to_owned(),
            dates: dates.into_iter().map(convert::format_vendor_date).collect(),
        })
    }

    /// Checks an answer that carries no data, such as close or intercom.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_ack_response(&self, response: &VendorResponse) -> Result<()> {
        payload(&self.registry, &response.endpoint, response).map(|_| ())
    }

    fn close_request(&self, endpoint: &str, device_id: &str, channels: &[u8]) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        let channels = if channels.is_empty() { &[1][..] } else { channels };
        for channel in channels {
            check_channel(*channel)?;
        }
        prepare(&self.registry, endpoint, fields(json!({ "deviceId": device_id, "channels": channels })))
    }

    fn intercom_request(&self, endpoint: &str, device_id: &str, channel: u8) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        check_channel(channel)?;
        prepare(&self.registry, endpoint, fields(json!({ "deviceId": device_id, "channel": channel })))
    }

    fn session(&self, endpoint: &str, device_id: &str, response: &VendorResponse) -> Result<MediaSessionDto> {
        let (_, data) = payload(&self.registry, endpoint, response)?;
        let videos = list_items(data, VIDEO_KEYS)
            .iter()
            .filter_map(|record| video_stream(record, device_id))
            .collect();
        Ok(MediaSessionDto { device_id: device_id.to_owned(), videos })
    }
}

fn check_channel(channel: u8) -> Result<()> {
    if !CHANNELS.contains(&channel) {
        return Err(BridgeError::ValidationError(format!(
            "channel must be between {} and {}, got {channel}",
            CHANNELS.start(),
            CHANNELS.end()
        )));
    }
    Ok(())
}

fn check_order(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(BridgeError::ValidationError("end must be after start".to_owned()));
    }
    Ok(())
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BridgeError::ValidationError(format!("invalid month {year}-{month:02}")))
}

/// Streams without a URL are dropped.
fn video_stream(record: &Value, device_id: &str) -> Option<VideoStreamDto> {
    Some(VideoStreamDto {
        device_id: DEVICE_ID.text(record).unwrap_or_else(|| device_id.to_owned()),
        channel: CHANNEL.integer(record).unwrap_or(1),
        play_url: PLAY_URL.text(record)?,
        stream_type: STREAM_TYPE.integer(record),
        data_type: DATA_TYPE.integer(record),
    })
}

fn media_file(record: &Value, device_id: &str) -> MediaFileDto {
    MediaFileDto {
        device_id: DEVICE_ID.text(record).unwrap_or_else(|| device_id.to_owned()),
        channel: CHANNEL.integer(record),
        start_time_ms: START.timestamp_ms(record),
        end_time_ms: END.timestamp_ms(record),
        size_bytes: SIZE.integer(record).and_then(|size| u64::try_from(size).ok()),
        stream_type: STREAM_TYPE.integer(record),
        file_name: FILE_NAME.text(record),
    }
}

fn calendar_day(entry: &Value, month: NaiveDate) -> Option<NaiveDate> {
    if let Some(day) = entry.as_u64() {
        return u32::try_from(day).ok().and_then(|day| month.with_day(day));
    }
    NaiveDate::parse_from_str(convert::text(entry)?.trim(), convert::VENDOR_DATE_FORMAT).ok()
}
