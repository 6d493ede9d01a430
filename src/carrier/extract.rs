//! Optional-chain lookups over carrier JSON.
//!
//! The carrier API is not consistent about where it puts identifiers and status
//! codes. Each `*_PATHS` constant lists the variants observed upstream, in the
//! order they are probed.

use serde_json::Value;

/// Courier identifier on a serviceability record.
pub const COURIER_ID_PATHS: &[&[&str]] = &[
    &["courier_company_id"],
    &["courier_id"],
    &["courierId"],
    &["id"],
];

/// Service mode on a serviceability record.
pub const SERVICE_MODE_PATHS: &[&[&str]] = &[&["mode"], &["service_type"]];

/// Pickup request status: top level first, then the nested `response` object.
pub const PICKUP_STATUS_PATHS: &[&[&str]] = &[&["status"], &["response", "status"]];

pub const PICKUP_ID_PATHS: &[&[&str]] = &[
    &["pickup_id"],
    &["response", "pickup_id"],
    &["pickup_token_number"],
    &["response", "pickup_token_number"],
];

pub const AWB_CODE_PATH: &[&str] = &["response", "data", "awb_code"];

/// Phone on a recent-order search record.
pub const ORDER_PHONE_PATHS: &[&[&str]] = &[&["billing_phone"], &["customer_phone"]];

/// Walk a single path. Any missing node yields `None`; explicit nulls count as missing.
pub fn at_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Return the first path that resolves to a present, non-empty value.
pub fn first_present<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| at_path(value, path))
        .find(|v| !is_blank(v))
}

/// Strings and numbers both render as text; everything else is not text.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Loose truthiness used for carrier flags such as `pickup_scheduled`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}
