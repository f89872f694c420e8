//! Metric-name normalization and numeric filtering
//!
//! Vendor APIs name their fields however they like (`maxTotalRAMSize`,
//! `memory-actual`, `OS-FLV-EXT-DATA:ephemeral`). Checks turn them into
//! snake_case metric segments and keep only the numeric values.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Convert a vendor field name into a snake_case metric segment.
///
/// An underscore goes before an ASCII uppercase letter when it follows a
/// lowercase letter or digit, or when it is not the first character and is
/// followed by a lowercase letter. The result is lowercased and `-` becomes `_`.
pub fn convert_metric_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let after_lower = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let before_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || before_lower {
                out.push('_');
            }
        }
        out.push(c);
    }

    out.to_lowercase().replace('-', "_")
}

/// Numeric JSON values only: booleans, strings and containers are skipped
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Normalized name -> value for every numeric field of `object`
pub fn numeric_fields(object: &Map<String, Value>) -> BTreeMap<String, f64> {
    object
        .iter()
        .filter_map(|(key, value)| numeric_value(value).map(|v| (convert_metric_name(key), v)))
        .collect()
}

/// Same as [`numeric_fields`] with every key placed under `prefix.`
pub fn prefixed_numeric_fields(prefix: &str, object: &Map<String, Value>) -> BTreeMap<String, f64> {
    object
        .iter()
        .filter_map(|(key, value)| {
            numeric_value(value).map(|v| (format!("{}.{}", prefix, convert_metric_name(key)), v))
        })
        .collect()
}

/// Numeric fields plus strings holding integers (an empty string counts as 0).
///
/// Some endpoints (flavor details) send `"swap": ""` or `"id": "42"`.
pub fn lenient_numeric_fields(object: &Map<String, Value>) -> BTreeMap<String, f64> {
    let mut fields = BTreeMap::new();
    for (key, value) in object {
        let parsed = match value {
            Value::String(s) if s.is_empty() => Some(0.0),
            Value::String(s) => s.trim().parse::<i64>().ok().map(|v| v as f64),
            other => numeric_value(other),
        };
        if let Some(v) = parsed {
            fields.insert(convert_metric_name(key), v);
        }
    }
    fields
}

/// `key:value` tag
pub fn tag(key: &str, value: impl std::fmt::Display) -> String {
    format!("{}:{}", key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_camel_case() {
        assert_eq!(convert_metric_name("maxTotalRAMSize"), "max_total_ram_size");
        assert_eq!(convert_metric_name("totalFloatingIpsUsed"), "total_floating_ips_used");
        assert_eq!(convert_metric_name("maxPersonality"), "max_personality");
        assert_eq!(convert_metric_name("HTTPResponse"), "http_response");
    }

    #[test]
    fn test_convert_keeps_separators() {
        assert_eq!(
            convert_metric_name("OS-FLV-EXT-DATA:ephemeral"),
            "os_flv_ext_data:ephemeral"
        );
        assert_eq!(convert_metric_name("memory-actual"), "memory_actual");
        assert_eq!(convert_metric_name("cpu0_time"), "cpu0_time");
        assert_eq!(convert_metric_name("vda_read"), "vda_read");
        assert_eq!(convert_metric_name("rxtx_factor"), "rxtx_factor");
    }

    #[test]
    fn test_convert_digit_before_upper() {
        assert_eq!(convert_metric_name("ipv4Count"), "ipv4_count");
        assert_eq!(convert_metric_name("A"), "a");
        assert_eq!(convert_metric_name(""), "");
    }

    #[test]
    fn test_numeric_fields_skip_bools_and_strings() {
        let obj = json!({
            "maxImageMeta": 128,
            "rxtx_factor": 1.5,
            "enabled": true,
            "name": "m1.small",
            "nested": {"a": 1},
            "list": [1, 2],
            "nothing": null,
        });
        let fields = numeric_fields(obj.as_object().unwrap());
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["max_image_meta"], 128.0);
        assert_eq!(fields["rxtx_factor"], 1.5);
    }

    #[test]
    fn test_prefixed_fields() {
        let obj = json!({"readBytes": 10, "errors": -1, "id": "vda"});
        let fields = prefixed_numeric_fields("disk_details", obj.as_object().unwrap());
        assert_eq!(fields["disk_details.read_bytes"], 10.0);
        assert_eq!(fields["disk_details.errors"], -1.0);
        assert!(!fields.contains_key("disk_details.id"));
    }

    #[test]
    fn test_lenient_fields_parse_integer_strings() {
        let obj = json!({
            "id": "42",
            "swap": "",
            "name": "m1.tiny",
            "ram": 512,
            "rxtx_factor": "1.0",
            "os-flavor-access:is_public": true,
        });
        let fields = lenient_numeric_fields(obj.as_object().unwrap());
        assert_eq!(fields["id"], 42.0);
        assert_eq!(fields["swap"], 0.0);
        assert_eq!(fields["ram"], 512.0);
        assert!(!fields.contains_key("name"));
        assert!(!fields.contains_key("rxtx_factor"));
        assert!(!fields.contains_key("os_flavor_access:is_public"));
    }
}
