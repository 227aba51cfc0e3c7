//! Device adapter: device list, connectivity and ACC state, device config.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use super::{
    check_id_count, convert::Aliases, fields, page_of, payload, prepare, records, require_id,
    require_ids,
};
use crate::{
    client::VendorResponse,
    error::Result,
    models::{AccStateDto, DeviceDto, OnlineState, Page, PageRequest},
    registry::{EndpointRegistry, RequestFields},
};

/// Endpoint of the paginated device list.
pub const DEVICE_LIST: &str = "device_list";
/// Endpoint of the device state query.
pub const DEVICE_STATES: &str = "device_states";
/// Endpoint of the device configuration query.
pub const DEVICE_CONFIG: &str = "device_get_config";

const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "imei", "device_id"]);
const NAME: Aliases = Aliases::new(&["deviceName", "name"]);
const PLATE: Aliases = Aliases::new(&["plateNumber", "plateNo", "plate"]);
const STATE: Aliases = Aliases::new(&["state", "onlineState"]);
const ACC: Aliases = Aliases::new(&["accState", "acc", "accStatus"]);
const EXPIRATION: Aliases = Aliases::new(&["expirationTime", "expireTime", "expiration"]);
const LAST_ONLINE: Aliases = Aliases::new(&["lastOnlineTime", "lastOnline"]);

const LIST_KEYS: &[&str] = &["list", "devices"];

/// Filters of a device list query. All filters are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceListQuery {
    /// Page to fetch.
    pub page: PageRequest,
    /// Restrict to one company.
    pub company_id: Option<i64>,
    /// Restrict to these devices, at most 1000.
    pub device_ids: Vec<String>,
    /// Restrict to these plates, at most 1000.
    pub plate_numbers: Vec<String>,
}

/// Builds and parses device requests.
#[derive(Debug, Clone)]
pub struct DeviceAdapter {
    registry: Arc<EndpointRegistry>,
}

impl DeviceAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Device list request. Empty filters are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid page or a
    /// filter with more than 1000 entries.
    ///
    /// [`BridgeError::ValidationError`]: crate::error::BridgeError::ValidationError
    pub fn build_device_list_request(&self, query: &DeviceListQuery) -> Result<RequestFields> {
        query.page.validate()?;
        check_id_count("deviceIds", query.device_ids.len())?;
        check_id_count("plateNumbers", query.plate_numbers.len())?;

        let mut body = fields(json!({
            "page": query.page.page,
            "pageSize": query.page.page_size,
        }));
        if let Some(company_id) = query.company_id {
            body.insert("companyId".to_owned(), json!(company_id));
        }
        if !query.device_ids.is_empty() {
            body.insert("deviceIds".to_owned(), json!(query.device_ids));
        }
        if !query.plate_numbers.is_empty() {
            body.insert("plateNumbers".to_owned(), json!(query.plate_numbers));
        }
        prepare(&self.registry, DEVICE_LIST, body)
    }

    /// Parses one page of the device list. Entries without a device id are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    ///
    /// [`BridgeError::VendorError`]: crate::error::BridgeError::VendorError
    pub fn parse_device_list_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<DeviceDto>> {
        let (_, data) = payload(&self.registry, DEVICE_LIST, response)?;
        Ok(page_of(data, LIST_KEYS, request, device))
    }

    /// State request for up to 1000 devices.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty list, a blank id
    /// or more than 1000 ids.
    ///
    /// [`BridgeError::ValidationError`]: crate::error::BridgeError::ValidationError
    pub fn build_device_states_request<S: AsRef<str>>(&self, device_ids: &[S]) -> Result<RequestFields> {
        let device_ids = require_ids("deviceIds", device_ids)?;
        prepare(&self.registry, DEVICE_STATES, fields(json!({ "deviceIds": device_ids })))
    }

    /// Parses the states of every device in the answer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    ///
    /// [`BridgeError::VendorError`]: crate::error::BridgeError::VendorError
    pub fn parse_device_states_response(&self, response: &VendorResponse) -> Result<Vec<AccStateDto>> {
        let (_, data) = payload(&self.registry, DEVICE_STATES, response)?;
        Ok(records(data).iter().filter_map(acc_state).collect())
    }

    /// Parses the state of one device. `None` if the answer does not list it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    ///
    /// [`BridgeError::VendorError`]: crate::error::BridgeError::VendorError
    pub fn parse_device_state_response(
        &self,
        device_id: &str,
        response: &VendorResponse,
    ) -> Result<Option<AccStateDto>> {
        let state = self
            .parse_device_states_response(response)?
            .into_iter()
            .find(|state| state.device_id == device_id);
        if state.is_none() {
            debug!(correlation_id = %response.correlation_id, device_id, "device not in state list");
        }
        Ok(state)
    }

    /// Configuration request for one device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty device id.
    ///
    /// [`BridgeError::ValidationError`]: crate::error::BridgeError::ValidationError
    pub fn build_device_config_request(&self, device_id: &str) -> Result<RequestFields> {
        require_id("deviceId", device_id)?;
        prepare(&self.registry, DEVICE_CONFIG, fields(json!({ "deviceId": device_id })))
    }

    /// Returns the device configuration as sent by the vendor.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    ///
    /// [`BridgeError::VendorError`]: crate::error::BridgeError::VendorError
    pub fn parse_device_config_response(&self, response: &VendorResponse) -> Result<Option<Value>> {
        let (_, data) = payload(&self.registry, DEVICE_CONFIG, response)?;
        Ok(data.cloned())
    }
}

fn online_state(record: &Value) -> Option<OnlineState> {
    STATE.integer(record).and_then(OnlineState::from_code)
}

fn device(record: &Value) -> Option<DeviceDto> {
    let online_state = online_state(record);
    Some(DeviceDto {
        device_id: DEVICE_ID.text(record)?,
        name: NAME.text(record),
        plate_no: PLATE.text(record),
        online_state,
        online: online_state.map(OnlineState::is_online),
        acc_on: ACC.flag(record),
        expiration_ms: EXPIRATION.timestamp_ms(record),
    })
}

fn acc_state(record: &Value) -> Option<AccStateDto> {
    let online_state = online_state(record);
    Some(AccStateDto {
        device_id: DEVICE_ID.text(record)?,
        online_state,
        online: online_state.map(OnlineState::is_online),
        acc_on: ACC.flag(record),
        last_online_time_ms: LAST_ONLINE.timestamp_ms(record),
    })
}
