//! Text delivery task adapter.
//!
//! Whether a task may still be changed is decided by the vendor. Update and
//! delete requests are always built; a refusal comes back as a vendor code in
//! the 1200 range.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{
    convert::{self, Aliases},
    fields, list_items, page_of, payload, prepare, records, require_id, require_ids,
};
use crate::{
    client::VendorResponse,
    error::{BridgeError, Result},
    models::{Page, PageRequest, TaskDto, TaskResultDto},
    registry::{EndpointRegistry, RequestFields},
};

/// Endpoint creating a text delivery task.
pub const TASK_CREATE_TEXT_DELIVERY: &str = "task_create_text_delivery";
/// Endpoint listing tasks.
pub const TASK_LIST: &str = "task_get_list";
/// Endpoint returning one task.
pub const TASK_DETAIL: &str = "task_get_detail";
/// Endpoint editing a task.
pub const TASK_UPDATE_INFO: &str = "task_update_info";
/// Endpoint changing a task's status.
pub const TASK_UPDATE_STATUS: &str = "task_update_status";
/// Endpoint returning per-device delivery results.
pub const TASK_RESULTS: &str = "task_get_results";
/// Endpoint deleting a task.
pub const TASK_DELETE: &str = "task_delete";
/// Endpoint sending text immediately, without a task.
pub const TEXT_SEND: &str = "text_send";

/// Content type sent when the caller names none: show on the device screen.
pub const DEFAULT_CONTENT_TYPE: &str = "1";

const TASK_ID: Aliases = Aliases::new(&["id", "taskId", "task_id"]);
const NAME: Aliases = Aliases::new(&["name", "taskName"]);
const DEVICE_ID: Aliases = Aliases::new(&["deviceId", "device_id"]);
const CONTENT: Aliases = Aliases::new(&["content", "message"]);
const STATUS: Aliases = Aliases::new(&["status", "state"]);
const CREATED_AT: Aliases = Aliases::new(&["createdAt", "createTime"]);
const SEND_TIME: Aliases = Aliases::new(&["sendTime"]);
const COMPLETED_AT: Aliases = Aliases::new(&["completedAt", "finishTime"]);
const RESULT: Aliases = Aliases::new(&["result"]);
const REPLY: Aliases = Aliases::new(&["replyResult", "deviceResponse", "device_response"]);
const DELIVERED_AT: Aliases = Aliases::new(&["deliveredAt", "delivered_at"]);
const ACKNOWLEDGED_AT: Aliases = Aliases::new(&["acknowledgedAt", "acknowledged_at"]);
const ATTEMPTS: Aliases = Aliases::new(&["deliveryAttempts", "delivery_attempts"]);
const ERROR_DETAILS: Aliases = Aliases::new(&["errorDetails", "error_details"]);

const TASK_LIST_KEYS: &[&str] = &["tasks", "list"];
const RESULT_LIST_KEYS: &[&str] = &["results", "list"];

/// New text delivery task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDeliveryTask {
    /// Task name.
    pub name: String,
    /// Text to deliver.
    pub content: String,
    /// Target device.
    pub device_id: String,
    /// Vendor content type codes, [`DEFAULT_CONTENT_TYPE`] when empty.
    pub content_types: Vec<String>,
    /// Operator recorded by the vendor.
    pub operator: Option<String>,
    /// Scheduled send time, immediate when `None`.
    pub send_time: Option<DateTime<Utc>>,
}

/// Changes to an existing task. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    /// New name.
    pub name: Option<String>,
    /// New text.
    pub content: Option<String>,
    /// New scheduled send time.
    pub send_time: Option<DateTime<Utc>>,
}

/// Filters of a task list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// Page to fetch.
    pub page: PageRequest,
    /// Restrict to one device.
    pub device_id: Option<String>,
    /// Restrict to one vendor status.
    pub status: Option<String>,
    /// Created at or after.
    pub start: Option<DateTime<Utc>>,
    /// Created at or before.
    pub end: Option<DateTime<Utc>>,
}

/// Builds and parses task requests.
#[derive(Debug, Clone)]
pub struct TaskAdapter {
    registry: Arc<EndpointRegistry>,
}

impl TaskAdapter {
    /// Creates an adapter over `registry`.
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Request creating a text delivery task.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty name, content or
    /// device id.
    pub fn build_create_text_delivery_request(&self, task: &TextDeliveryTask) -> Result<RequestFields> {
        require_id("name", &task.name)?;
        require_id("content", &task.content)?;
        require_id("deviceId", &task.device_id)?;

        let content_types = if task.content_types.is_empty() {
            vec![DEFAULT_CONTENT_TYPE.to_owned()]
        } else {
            task.content_types.clone()
        };
        let mut body = fields(json!({
            "name": task.name,
            "content": task.content,
            "contentTypes": content_types,
            "deviceId": task.device_id,
        }));
        if let Some(operator) = &task.operator {
            body.insert("operator".to_owned(), json!(operator));
        }
        if let Some(send_time) = task.send_time {
            body.insert("sendTime".to_owned(), json!(convert::format_vendor_datetime(send_time)));
        }
        prepare(&self.registry, TASK_CREATE_TEXT_DELIVERY, body)
    }

    /// Returns the id of a newly created task, if the vendor sent one.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_create_task_response(&self, response: &VendorResponse) -> Result<Option<String>> {
        let (_, data) = payload(&self.registry, TASK_CREATE_TEXT_DELIVERY, response)?;
        Ok(data.and_then(|data| convert::text(data).or_else(|| TASK_ID.text(data))))
    }

    /// Request editing a task.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty task id or an
    /// update that changes nothing.
    pub fn build_update_task_info_request(&self, task_id: &str, update: &TaskUpdate) -> Result<RequestFields> {
        require_id("taskId", task_id)?;
        if *update == TaskUpdate::default() {
            return Err(BridgeError::ValidationError("task update changes nothing".to_owned()));
        }

        let mut body = fields(json!({ "taskId": task_id }));
        if let Some(name) = &update.name {
            body.insert("name".to_owned(), json!(name));
        }
        if let Some(content) = &update.content {
            body.insert("content".to_owned(), json!(content));
        }
        if let Some(send_time) = update.send_time {
            body.insert("sendTime".to_owned(), json!(convert::format_vendor_datetime(send_time)));
        }
        prepare(&self.registry, TASK_UPDATE_INFO, body)
    }

    /// Request changing a task's vendor status code.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty task id.
    pub fn build_update_task_status_request(&self, task_id: &str, status: i64) -> Result<RequestFields> {
        require_id("taskId", task_id)?;
        prepare(&self.registry, TASK_UPDATE_STATUS, fields(json!({ "taskId": task_id, "status": status })))
    }

    /// Request deleting a task.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty task id.
    pub fn build_delete_task_request(&self, task_id: &str) -> Result<RequestFields> {
        require_id("taskId", task_id)?;
        prepare(&self.registry, TASK_DELETE, fields(json!({ "taskId": task_id })))
    }

    /// Task list request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an invalid page or an
    /// `end` before `start`.
    pub fn build_task_list_request(&self, query: &TaskListQuery) -> Result<RequestFields> {
        query.page.validate()?;
        if let (Some(start), Some(end)) = (query.start, query.end) {
            if end < start {
                return Err(BridgeError::ValidationError("end must not be before start".to_owned()));
            }
        }

        let mut body = fields(json!({ "page": query.page.page, "pageSize": query.page.page_size }));
        if let Some(device_id) = &query.device_id {
            body.insert("deviceId".to_owned(), json!(device_id));
        }
        if let Some(status) = &query.status {
            body.insert("status".to_owned(), json!(status));
        }
        if let Some(start) = query.start {
            body.insert("startTime".to_owned(), json!(convert::format_vendor_datetime(start)));
        }
        if let Some(end) = query.end {
            body.insert("endTime".to_owned(), json!(convert::format_vendor_datetime(end)));
        }
        prepare(&self.registry, TASK_LIST, body)
    }

    /// Parses one page of tasks. Entries without an id are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_task_list_response(
        &self,
        request: PageRequest,
        response: &VendorResponse,
    ) -> Result<Page<TaskDto>> {
        let (_, data) = payload(&self.registry, TASK_LIST, response)?;
        Ok(page_of(data, TASK_LIST_KEYS, request, task))
    }

    /// Task detail request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty task id.
    pub fn build_task_detail_request(&self, task_id: &str) -> Result<RequestFields> {
        require_id("taskId", task_id)?;
        prepare(&self.registry, TASK_DETAIL, fields(json!({ "taskId": task_id })))
    }

    /// Parses a task detail. The task may be wrapped in `task`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_task_detail_response(&self, response: &VendorResponse) -> Result<Option<TaskDto>> {
        let (_, data) = payload(&self.registry, TASK_DETAIL, response)?;
        let record = data.map(|data| data.get("task").filter(|t| t.is_object()).unwrap_or(data));
        Ok(record.and_then(task))
    }

    /// Delivery results request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for an empty task id.
    pub fn build_task_results_request(&self, task_id: &str) -> Result<RequestFields> {
        require_id("taskId", task_id)?;
        prepare(&self.registry, TASK_RESULTS, fields(json!({ "taskId": task_id })))
    }

    /// Parses per-device delivery results. A single object is one result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code.
    pub fn parse_task_results_response(
        &self,
        task_id: &str,
        response: &VendorResponse,
    ) -> Result<Vec<TaskResultDto>> {
        let (_, data) = payload(&self.registry, TASK_RESULTS, response)?;
        let items = match list_items(data, RESULT_LIST_KEYS) {
            [] => records(data),
            items => items,
        };
        Ok(items.iter().filter_map(|record| task_result(record, task_id)).collect())
    }

    /// Sends text to devices at once.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ValidationError`] for empty content or an
    /// invalid device list.
    pub fn build_send_text_request<S: AsRef<str>>(&self, device_ids: &[S], content: &str) -> Result<RequestFields> {
        let device_ids = require_ids("deviceIds", device_ids)?;
        require_id("content", content)?;
        prepare(&self.registry, TEXT_SEND, fields(json!({ "deviceIds": device_ids, "content": content })))
    }

    /// Checks an answer that carries no data, such as update or delete.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::VendorError`] for a non-success code. Codes
    /// 1200 to 1299 mean the task is in a state that forbids the change.
    pub fn parse_ack_response(&self, response: &VendorResponse) -> Result<()> {
        payload(&self.registry, &response.endpoint, response).map(|_| ())
    }
}

fn task(record: &Value) -> Option<TaskDto> {
    Some(TaskDto {
        task_id: TASK_ID.text(record)?,
        name: NAME.text(record),
        device_id: DEVICE_ID.text(record).unwrap_or_default(),
        content: CONTENT.text(record),
        status: STATUS.text(record),
        created_at_ms: CREATED_AT.timestamp_ms(record),
        send_time_ms: SEND_TIME.timestamp_ms(record),
        completed_at_ms: COMPLETED_AT.timestamp_ms(record),
        result: RESULT.get(record).cloned(),
    })
}

/// Results without a device id are skipped.
fn task_result(record: &Value, task_id: &str) -> Option<TaskResultDto> {
    Some(TaskResultDto {
        id: TASK_ID.text(record).unwrap_or_else(|| task_id.to_owned()),
        device_id: DEVICE_ID.text(record)?,
        status: STATUS.text(record),
        reply_result: REPLY.text(record),
        delivered_at_ms: DELIVERED_AT.timestamp_ms(record),
        acknowledged_at_ms: ACKNOWLEDGED_AT.timestamp_ms(record),
        delivery_attempts: ATTEMPTS.integer(record).and_then(|n| u32::try_from(n).ok()),
        error_details: ERROR_DETAILS.get(record).cloned(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{
        adapters::test_support::{response, shipped_registry},
        client::VendorCodeClass,
    };

    fn adapter() -> TaskAdapter {
        TaskAdapter::new(shipped_registry())
    }

    fn new_task() -> TextDeliveryTask {
        TextDeliveryTask {
            name: "Shift notice".into(),
            content: "Return to depot".into(),
            device_id: "DEV001".into(),
            content_types: Vec::new(),
            operator: Some("dispatch".into()),
            send_time: None,
        }
    }

    #[test]
    fn test_create_text_delivery_request() {
        let body = adapter().build_create_text_delivery_request(&new_task()).unwrap();
        assert_eq!(body["contentTypes"], json!(["1"]));
        assert_eq!(body["operator"], json!("dispatch"));
        assert_eq!(body["deviceId"], json!("DEV001"));
        assert!(body.get("sendTime").is_none());

        let blank = TextDeliveryTask { content: " ".into(), ..new_task() };
        assert!(matches!(
            adapter().build_create_text_delivery_request(&blank),
            Err(BridgeError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_created_task_id() {
        let tasks = adapter();
        let registry = shipped_registry();

        let bare = response(&registry, TASK_CREATE_TEXT_DELIVERY, json!({"code": 200, "data": 4711}));
        assert_eq!(tasks.parse_create_task_response(&bare).unwrap().as_deref(), Some("4711"));

        let wrapped =
            response(&registry, TASK_CREATE_TEXT_DELIVERY, json!({"code": 200, "data": {"taskId": "T-9"}}));
        assert_eq!(tasks.parse_create_task_response(&wrapped).unwrap().as_deref(), Some("T-9"));
    }

    #[test]
    fn test_update_requires_a_change() {
        let tasks = adapter();
        assert!(tasks.build_update_task_info_request("T-1", &TaskUpdate::default()).is_err());

        let update = TaskUpdate {
            send_time: Some(Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()),
            ..TaskUpdate::default()
        };
        let body = tasks.build_update_task_info_request("T-1", &update).unwrap();
        assert_eq!(body["taskId"], json!("T-1"));
        assert_eq!(body["sendTime"], json!("2024-01-02 08:00:00"));
        assert!(body.get("name").is_none());
    }

    #[test]
    fn test_locked_task_surfaces_task_class() {
        let tasks = adapter();
        let registry = shipped_registry();
        assert!(tasks.build_update_task_status_request("T-1", 2).is_ok());

        let refused = response(
            &registry,
            TASK_UPDATE_STATUS,
            json!({"code": 1203, "message": "task already executed"}),
        );
        let err = tasks.parse_ack_response(&refused).unwrap_err();
        assert_eq!(err.vendor_class(), Some(VendorCodeClass::Task));
    }

    #[test]
    fn test_task_list_request_and_page() {
        let tasks = adapter();
        let registry = shipped_registry();
        let query = TaskListQuery {
            page: PageRequest::new(1, 20),
            device_id: Some("DEV001".into()),
            ..TaskListQuery::default()
        };
        let body = tasks.build_task_list_request(&query).unwrap();
        assert_eq!(body["pageSize"], json!(20));
        assert_eq!(body["deviceId"], json!("DEV001"));
        assert!(body.get("status").is_none());

        let answer = response(
            &registry,
            TASK_LIST,
            json!({
                "code": 200,
                "data": {"total": 2, "tasks": [
                    {"id": 1, "deviceId": "DEV001", "message": "hello", "status": 2, "createdAt": 1_715_568_599},
                    {"taskId": "2", "content": "bye", "sendTime": "2024-05-13 02:49:59"},
                    {"content": "no id"}
                ]}
            }),
        );
        let page = tasks.parse_task_list_response(query.page, &answer).unwrap();
        assert_eq!(page.total, Some(2));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].task_id, "1");
        assert_eq!(page.items[0].content.as_deref(), Some("hello"));
        assert_eq!(page.items[0].status.as_deref(), Some("2"));
        assert_eq!(page.items[0].created_at_ms, Some(1_715_568_599_000));
        assert_eq!(page.items[1].send_time_ms, Some(1_715_568_599_000));
        assert_eq!(page.items[1].device_id, "");
    }

    #[test]
    fn test_task_detail_unwraps_task() {
        let tasks = adapter();
        let registry = shipped_registry();
        let answer = response(
            &registry,
            TASK_DETAIL,
            json!({"code": 200, "data": {"task": {"id": "T-1", "deviceId": "DEV001", "result": {"ok": true}}}}),
        );
        let detail = tasks.parse_task_detail_response(&answer).unwrap().unwrap();
        assert_eq!(detail.task_id, "T-1");
        assert_eq!(detail.result, Some(json!({"ok": true})));

        let empty = response(&registry, TASK_DETAIL, json!({"code": 200, "data": null}));
        assert!(tasks.parse_task_detail_response(&empty).unwrap().is_none());
    }

    #[test]
    fn test_task_results() {
        let tasks = adapter();
        let registry = shipped_registry();

        let single = response(
            &registry,
            TASK_RESULTS,
            json!({"code": 200, "data": {
                "deviceId": "DEV001",
                "status": "delivered",
                "deliveredAt": 1_715_568_599_000_i64,
                "deliveryAttempts": 2,
                "deviceResponse": "OK"
            }}),
        );
        let results = tasks.parse_task_results_response("T-1", &single).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "T-1");
        assert_eq!(results[0].delivered_at_ms, Some(1_715_568_599_000));
        assert_eq!(results[0].delivery_attempts, Some(2));
        assert_eq!(results[0].reply_result.as_deref(), Some("OK"));

        let list = response(
            &registry,
            TASK_RESULTS,
            json!({"code": 200, "data": {"list": [{"deviceId": "DEV001"}, {"deviceId": "DEV002", "errorDetails": {"reason": "offline"}}]}}),
        );
        let results = tasks.parse_task_results_response("T-1", &list).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].error_details, Some(json!({"reason": "offline"})));
    }

    #[test]
    fn test_send_text_request() {
        let body = adapter().build_send_text_request(&["DEV001", "DEV002"], "Stop").unwrap();
        assert_eq!(body["deviceIds"], json!(["DEV001", "DEV002"]));
        assert!(adapter().build_send_text_request(&["DEV001"], "").is_err());
    }
}
