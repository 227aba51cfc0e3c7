//! Decoding messages pushed by the vendor's forwarding service.
//!
//! Reads one JSON push per line from piped stdin and prints the decoded
//! message. Without piped input it decodes a few built-in samples.
//!
//! # Running this example
//!
//! ```bash
//! cargo run --example forwarded_push
//! echo '{"msgId":3,"deviceId":"DEV001","accStatus":1,"online":1}' | cargo run --example forwarded_push
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "examples are allowed to use println"
)]

use std::io::{self, BufRead, IsTerminal};

use mdvr_bridge::{adapters::parse_forwarded_message, models::ForwardedMessage};
use serde_json::{Value, json};

fn samples() -> Vec<Value> {
    vec![
        json!({
            "msgId": 1,
            "deviceId": "DEV001",
            "gps": {"list": [{"latitude": 5.290_439, "longitude": 100.291_992, "speed": 42, "time": 1_715_568_599}]}
        }),
        json!({
            "msgId": 2,
            "deviceId": "DEV001",
            "alarm": {
                "base": {"alarmId": "A-1", "time": 1_715_568_599},
                "list": [{"type": 6, "Status": 0}]
            }
        }),
        json!({"msgId": 3, "deviceId": "DEV001", "accStatus": 1, "online": 1}),
        json!({"msgId": 99, "deviceId": "DEV001"}),
    ]
}

fn describe(message: &ForwardedMessage) -> String {
    match message {
        ForwardedMessage::Gps { positions } => format!("{} position(s)", positions.len()),
        ForwardedMessage::Alarm(alarm) => format!("alarm on {}", alarm.device_id),
        ForwardedMessage::Status(status) => format!("status of {}", status.device_id),
        ForwardedMessage::Unknown { msg_id, .. } => format!("unhandled msgId {msg_id:?}"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut pushes = Vec::new();
    if !stdin.is_terminal() {
        for line in stdin.lock().lines() {
            let line = line?;
            if !line.trim().is_empty() {
                pushes.push(serde_json::from_str::<Value>(&line)?);
            }
        }
    }
    if pushes.is_empty() {
        pushes = samples();
    }

    for push in &pushes {
        match parse_forwarded_message(push) {
            Ok(message) => {
                println!("{}", describe(&message));
                println!("{}", serde_json::to_string_pretty(&message)?);
            }
            Err(e) => eprintln!("skipped push: {e}"),
        }
    }
    Ok(())
}
