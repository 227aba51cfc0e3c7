//! Error handling example showing how vendor failures surface.
//!
//! Walks through the error kinds a caller has to branch on: validation
//! failures raised before any request, vendor codes passed through with
//! their class, and transport failures after retries.
//!
//! # Running this example
//!
//! ```bash
//! export MDVR_API_CONFIG=mdvr-bridge/config/vendor_api.toml
//! export MDVR_API_USERNAME=fleet MDVR_API_PASSWORD=...
//! cargo run --example error_handling -- DEV001
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::uninlined_format_args,
    reason = "examples are allowed to use println and simple formatting"
)]

use std::{env, sync::Arc};

use chrono::{TimeDelta, Utc};
use mdvr_bridge::{
    BridgeError, EndpointRegistry, VendorClient,
    adapters::{ApiVersion, GpsAdapter, TaskAdapter},
    client::VendorCodeClass,
};

fn explain(error: &BridgeError) {
    match error {
        BridgeError::ValidationError(msg) => println!("   rejected locally: {msg}"),
        BridgeError::RangeTooLarge { .. } => println!("   window too wide: {error}"),
        BridgeError::AuthenticationFailed(msg) => println!("   check credentials: {msg}"),
        BridgeError::TransportError { correlation_id, attempts, message } => {
            println!("   vendor unreachable after {attempts} attempt(s) [{correlation_id}]: {message}");
        }
        BridgeError::VendorError { code, message } => match VendorCodeClass::of(*code) {
            VendorCodeClass::NotFoundOrInvalid => println!("   unknown resource ({code}): {message}"),
            VendorCodeClass::Task => println!("   task rule violated ({code}): {message}"),
            class => println!("   vendor said {code} ({class:?}): {message}"),
        },
        other => println!("   {other}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("MDVR Bridge: Error Handling Example\n");

    let device_id = env::args().nth(1).unwrap_or_else(|| "DEV001".to_owned());
    let registry = Arc::new(EndpointRegistry::from_env()?);
    let client = VendorClient::new(Arc::clone(&registry))?;
    let gps = GpsAdapter::new(Arc::clone(&registry));
    let tasks = TaskAdapter::new(registry);

    println!("1. Detailed track over four days (limit is three)");
    let now = Utc::now();
    if let Err(e) = gps.build_detailed_track_request(ApiVersion::V1, &device_id, now - TimeDelta::days(4), now) {
        explain(&e);
    }

    println!("\n2. Blank device id");
    if let Err(e) = gps.build_latest_gps_request(ApiVersion::V2, " ", now) {
        explain(&e);
    }

    println!("\n3. Results of a task that does not exist");
    let fields = tasks.build_task_results_request("no-such-task")?;
    match client.call("task_get_results", fields).await {
        Ok(response) => println!("   {} result(s)", tasks.parse_task_results_response("no-such-task", &response)?.len()),
        Err(e) => explain(&e),
    }

    println!("\n4. Latest position of {device_id}");
    let version = ApiVersion::V2;
    let fields = gps.build_latest_gps_request(version, &device_id, now)?;
    match client.call(version.latest_endpoint(), fields).await {
        Ok(response) => match gps.parse_latest_gps_response(version, &device_id, &response)? {
            Some(fix) => println!("   {:?}, {:?}", fix.latitude, fix.longitude),
            None => println!("   no position reported"),
        },
        Err(e) => explain(&e),
    }

    client.logout().await?;
    Ok(())
}
