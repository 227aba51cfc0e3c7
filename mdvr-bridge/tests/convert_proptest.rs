//! Property tests for vendor value normalization.

use chrono::{DateTime, Utc};
use mdvr_bridge::{
    adapters::{
        convert::{self, MILLIS_THRESHOLD},
        parse_forwarded_message,
    },
    models::ForwardedMessage,
    registry::{CoordinateEncoding, SpeedUnit},
};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_epoch_seconds_become_millis(secs in 1_i64..MILLIS_THRESHOLD) {
        prop_assert_eq!(convert::timestamp_ms(&json!(secs)), Some(secs * 1000));
        prop_assert_eq!(convert::timestamp_ms(&json!(secs.to_string())), Some(secs * 1000));
    }

    #[test]
    fn test_epoch_millis_pass_through(millis in MILLIS_THRESHOLD..4_102_444_800_000_i64) {
        prop_assert_eq!(convert::timestamp_ms(&json!(millis)), Some(millis));
    }

    #[test]
    fn test_non_positive_timestamps_are_unknown(raw in i64::MIN..=0) {
        prop_assert_eq!(convert::timestamp_ms(&json!(raw)), None);
    }

    #[test]
    fn test_vendor_datetime_is_read_back_as_utc(secs in 1_i64..4_102_444_800) {
        let at = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
        let rendered = convert::format_vendor_datetime(at);
        prop_assert_eq!(convert::timestamp_ms(&json!(rendered)), Some(secs * 1000));
    }

    #[test]
    fn test_scaled_coordinates(micro in -180_000_000_i64..=180_000_000) {
        let decoded = CoordinateEncoding::Scaled.decode(&json!(micro)).unwrap();
        #[allow(clippy::cast_precision_loss)]
        let expected = micro as f64 / 1_000_000.0;
        prop_assert!((decoded - expected).abs() < 1e-9);
        prop_assert_eq!(CoordinateEncoding::Scaled.decode(&json!(micro.to_string())), Some(decoded));
    }

    #[test]
    fn test_decimal_coordinates_unchanged(degrees in -180.0_f64..=180.0) {
        prop_assert_eq!(CoordinateEncoding::Decimal.decode(&json!(degrees)), Some(degrees));
    }

    #[test]
    fn test_tenth_kmh_speed(tenths in 0_u32..50_000) {
        let kmh = SpeedUnit::TenthKmh.to_kmh(&json!(tenths)).unwrap();
        prop_assert!((kmh * 10.0 - f64::from(tenths)).abs() < 1e-6);
        prop_assert_eq!(SpeedUnit::Kmh.to_kmh(&json!(tenths)), Some(f64::from(tenths)));
    }

    #[test]
    fn test_integer_flags(raw in any::<i64>()) {
        prop_assert_eq!(convert::flag(&json!(raw)), Some(raw == 1));
    }

    #[test]
    fn test_garbage_strings_never_panic(s in "\\PC{0,40}") {
        let value = json!(s);
        let _ = convert::timestamp_ms(&value);
        let _ = convert::number(&value);
        let _ = convert::integer(&value);
        let _ = convert::flag(&value);
    }

    #[test]
    fn test_unknown_message_ids_are_kept(msg_id in 4_i64..10_000, device in "[A-Z0-9]{4,12}") {
        let payload = json!({"msgId": msg_id, "deviceId": device});
        match parse_forwarded_message(&payload).unwrap() {
            ForwardedMessage::Unknown { msg_id: got, payload: kept } => {
                prop_assert_eq!(got, Some(msg_id));
                prop_assert_eq!(kept, payload);
            }
            other => prop_assert!(false, "unexpected message: {:?}", other),
        }
    }
}
