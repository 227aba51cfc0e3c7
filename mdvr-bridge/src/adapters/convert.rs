//! Unit and field-name normalization shared by every adapter.
//!
//! The vendor is inconsistent across endpoints: coordinates arrive scaled by
//! 1e6 or as decimals, timestamps as seconds, milliseconds or naive date
//! strings, and the same concept may live under several field names. The
//! helpers here turn all of that into the units the DTOs promise.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

pub use crate::client::extract_path;
use crate::registry::{CoordinateEncoding, SpeedUnit};

/// Divisor of scaled-integer coordinates.
pub const COORDINATE_SCALE: f64 = 1_000_000.0;

/// Numeric timestamps below this are seconds, at or above it milliseconds.
pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Format of naive vendor date-times.
pub const VENDOR_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of vendor dates.
pub const VENDOR_DATE_FORMAT: &str = "%Y-%m-%d";

impl CoordinateEncoding {
    /// Converts a raw coordinate to decimal degrees.
    ///
    /// ```
    /// use mdvr_bridge::registry::CoordinateEncoding;
    /// use serde_json::json;
    ///
    /// assert_eq!(CoordinateEncoding::Scaled.decode(&json!(5290439)), Some(5.290439));
    /// assert_eq!(CoordinateEncoding::Decimal.decode(&json!(5.290439)), Some(5.290439));
    /// ```
    #[must_use]
    pub fn decode(self, raw: &Value) -> Option<f64> {
        let value = number(raw)?;
        match self {
            Self::Scaled => Some(value / COORDINATE_SCALE),
            Self::Decimal => Some(value),
        }
    }
}

impl SpeedUnit {
    /// Converts a raw speed to km/h.
    #[must_use]
    pub fn to_kmh(self, raw: &Value) -> Option<f64> {
        let value = number(raw)?;
        match self {
            Self::Kmh => Some(value),
            Self::TenthKmh => Some(value / 10.0),
        }
    }
}

/// Reads a number, accepting numeric strings.
#[must_use]
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Reads an integer, accepting numeric strings and integral floats.
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "only integral floats in i64 range are accepted")]
pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a non-empty string; numbers are rendered in decimal.
#[must_use]
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a boolean flag.
///
/// `true`, `1`, `"1"`, `"on"`, `"true"` and `"online"` are set; `false`, `0`
/// and any other string are clear.
#[must_use]
pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) => integer(value).map(|n| n == 1),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            Some(matches!(s.as_str(), "1" | "on" | "true" | "online"))
        }
        _ => None,
    }
}

/// Normalizes a vendor timestamp to milliseconds since the epoch.
///
/// Numbers below [`MILLIS_THRESHOLD`] are seconds. Strings may be numeric,
/// naive `YYYY-MM-DD HH:MM:SS` (read as UTC) or RFC 3339. Non-positive values
/// mean "unknown".
///
/// ```
/// use mdvr_bridge::adapters::convert::timestamp_ms;
/// use serde_json::json;
///
/// assert_eq!(timestamp_ms(&json!(1715568599)), Some(1_715_568_599_000));
/// assert_eq!(timestamp_ms(&json!(1715568599000_i64)), Some(1_715_568_599_000));
/// assert_eq!(timestamp_ms(&json!("2024-05-13 02:49:59")), Some(1_715_568_599_000));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, reason = "value is range checked before the cast")]
pub fn timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(raw) => normalize_epoch(raw),
            None => {
                let raw = n.as_f64().filter(|f| f.is_finite() && *f > 0.0 && *f < 9.0e15)?;
                if raw < MILLIS_THRESHOLD as f64 {
                    Some((raw * 1000.0).round() as i64)
                } else {
                    Some(raw.round() as i64)
                }
            }
        },
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn normalize_epoch(raw: i64) -> Option<i64> {
    if raw <= 0 {
        None
    } else if raw < MILLIS_THRESHOLD {
        raw.checked_mul(1000)
    } else {
        Some(raw)
    }
}

fn parse_timestamp_str(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if let Ok(raw) = s.parse::<i64>() {
        return normalize_epoch(raw);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, VENDOR_DATETIME_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis())
}

/// Renders a UTC instant in the vendor's naive date-time format.
#[must_use]
pub fn format_vendor_datetime(at: DateTime<Utc>) -> String {
    at.format(VENDOR_DATETIME_FORMAT).to_string()
}

/// Renders a date in the vendor's date format.
#[must_use]
pub fn format_vendor_date(date: NaiveDate) -> String {
    date.format(VENDOR_DATE_FORMAT).to_string()
}

/// Ordered alternative names of one vendor field.
///
/// Names may be dot paths into nested objects. The first candidate that is
/// present, not `null` and not an empty string wins.
///
/// ```
/// use mdvr_bridge::adapters::convert::Aliases;
/// use serde_json::json;
///
/// const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "imei", "device_id"]);
///
/// let record = json!({"imei": "860000000000001", "device_id": "other"});
/// assert_eq!(DEVICE_ID.get(&record), Some(&json!("860000000000001")));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aliases(&'static [&'static str]);

impl Aliases {
    /// Creates an alias list in priority order.
    #[must_use]
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self(names)
    }

    /// Candidate names in priority order.
    #[must_use]
    pub fn names(&self) -> &'static [&'static str] {
        self.0
    }

    /// First present value with the name it was found under.
    #[must_use]
    pub fn find<'a>(&self, record: &'a Value) -> Option<(&'static str, &'a Value)> {
        self.0.iter().find_map(|name| {
            extract_path(record, name)
                .filter(|value| !matches!(value, Value::String(s) if s.is_empty()))
                .map(|value| (*name, value))
        })
    }

    /// First present value.
    #[must_use]
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.find(record).map(|(_, value)| value)
    }

    /// First present value as a string.
    #[must_use]
    pub fn text(&self, record: &Value) -> Option<String> {
        self.get(record).and_then(text)
    }

    /// First present value as an integer.
    #[must_use]
    pub fn integer(&self, record: &Value) -> Option<i64> {
        self.get(record).and_then(integer)
    }

    /// First present value as a float.
    #[must_use]
    pub fn number(&self, record: &Value) -> Option<f64> {
        self.get(record).and_then(number)
    }

    /// First present value as a flag.
    #[must_use]
    pub fn flag(&self, record: &Value) -> Option<bool> {
        self.get(record).and_then(flag)
    }

    /// First present value as a millisecond timestamp.
    #[must_use]
    pub fn timestamp_ms(&self, record: &Value) -> Option<i64> {
        self.get(record).and_then(timestamp_ms)
    }
}

/// Value picked by a [`SourceChain`], tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sourced<T, U> {
    /// Tag of the winning candidate.
    pub source: T,
    /// Field name the value was read from.
    pub field: &'static str,
    /// Converted value.
    pub value: U,
}

/// Ordered candidate sources for one concept.
///
/// Each candidate pairs a tag with the field names it may appear under.
/// Candidates are tried in order; the first whose field is present and
/// converts successfully wins, and its tag is reported alongside the value.
#[derive(Debug, Clone, Copy)]
pub struct SourceChain<T: 'static> {
    candidates: &'static [(T, Aliases)],
}

impl<T: Copy> SourceChain<T> {
    /// Creates a chain from candidates in priority order.
    #[must_use]
    pub const fn new(candidates: &'static [(T, Aliases)]) -> Self {
        Self { candidates }
    }

    /// Candidates in priority order.
    #[must_use]
    pub fn candidates(&self) -> &'static [(T, Aliases)] {
        self.candidates
    }

    /// Resolves the first candidate that yields a value.
    pub fn resolve<U>(
        &self,
        record: &Value,
        convert: impl Fn(&Value) -> Option<U>,
    ) -> Option<Sourced<T, U>> {
        self.candidates.iter().find_map(|(source, aliases)| {
            aliases.names().iter().find_map(|field| {
                extract_path(record, field)
                    .and_then(&convert)
                    .map(|value| Sourced { source: *source, field: *field, value })
            })
        })
    }
}
