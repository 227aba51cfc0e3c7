//! MDVR Verify: checks vendor API access for the configured profile.
//!
//! Loads the endpoint registry, logs in, fetches one page of the device
//! list and logs out again. Prints a report on stdout and exits non-zero
//! if any step failed.
//!
//! # Usage
//!
//! ```text
//! MDVR_API_CONFIG=config/vendor_api.toml \
//! MDVR_API_PROFILE=staging \
//! MDVR_API_USERNAME=fleet MDVR_API_PASSWORD=... \
//!     mdvr-verify [--json]
//! ```

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

mod observability;
mod report;

use std::{process::ExitCode, sync::Arc};

use mdvr_bridge::{
    EndpointRegistry, VendorClient,
    adapters::{DeviceAdapter, DeviceListQuery},
    models::PageRequest,
};
use tracing::{error, info};

use crate::{
    observability::{LogFormat, init_observability},
    report::{Check, Report},
};

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());
    let json = std::env::args().skip(1).any(|arg| arg == "--json");

    let report = verify().await;
    if json {
        match report.to_json() {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                error!(error = %e, "failed to render report");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{report}");
    }

    if report.passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

async fn verify() -> Report {
    let mut report = Report::default();

    let registry = match EndpointRegistry::from_env() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "failed to load endpoint registry");
            report.push(Check::fail("config", e));
            report.push(Check::skip("login"));
            report.push(Check::skip("devices"));
            return report;
        }
    };
    report.profile = Some(registry.profile().name.clone());
    report.base_url = Some(registry.profile().base_url.to_string());
    report.push(Check::pass("config", format!("{} endpoints", registry.len())));

    let client = match VendorClient::new(Arc::clone(&registry)) {
        Ok(client) => client,
        Err(e) => {
            report.push(Check::fail("login", e));
            report.push(Check::skip("devices"));
            return report;
        }
    };

    match client.authenticate().await {
        Ok(_) => report.push(Check::pass("login", "session token issued")),
        Err(e) => {
            error!(error = %e, "vendor login failed");
            report.push(Check::fail("login", e));
            report.push(Check::skip("devices"));
            return report;
        }
    }

    report.push(list_devices(&client, registry).await);

    if let Err(e) = client.logout().await {
        info!(error = %e, "vendor logout failed");
    }
    report
}

async fn list_devices(client: &VendorClient, registry: Arc<EndpointRegistry>) -> Check {
    let devices = DeviceAdapter::new(registry);
    let query = DeviceListQuery { page: PageRequest::new(1, 1), ..DeviceListQuery::default() };

    let result = async {
        let fields = devices.build_device_list_request(&query)?;
        let response = client.call("device_list", fields).await?;
        devices.parse_device_list_response(query.page, &response)
    }
    .await;

    match result {
        Ok(page) => {
            let total = page.total.map_or_else(|| "unknown".to_owned(), |total| total.to_string());
            info!(total = %total, "device list reachable");
            Check::pass("devices", format!("{total} device(s) visible"))
        }
        Err(e) => {
            error!(error = %e, "device list failed");
            Check::fail("devices", e)
        }
    }
}
