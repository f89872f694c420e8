//! REST clients for the OpenStack services the controller check talks to

pub mod compute;
pub mod keystone;
pub mod network;

use probekit_base::{CheckError, CheckResult};
use serde_json::{Map, Value};

/// Object found at the JSON `pointer` of a response
pub(crate) fn object_at<'a>(url: &str, value: &'a Value, pointer: &str) -> CheckResult<&'a Map<String, Value>> {
    value
        .pointer(pointer)
        .and_then(Value::as_object)
        .ok_or_else(|| CheckError::payload(url, format!("missing object {}", pointer)))
}

/// Array found at the JSON `pointer` of a response
pub(crate) fn array_at<'a>(url: &str, value: &'a Value, pointer: &str) -> CheckResult<&'a Vec<Value>> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| CheckError::payload(url, format!("missing array {}", pointer)))
}

/// Identifiers come back as strings or integers depending on the resource
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn str_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}
