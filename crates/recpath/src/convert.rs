//! Data-type conversion helpers.
//!
//! Every helper accepts an arbitrary [`Value`] and returns either the
//! converted value or `None` when the input cannot be converted. Callers in
//! the function library decide whether `None` means "empty string", "pass the
//! value through unchanged", or a `type` error; nothing here panics or errors.

use chrono::{NaiveDate, NaiveDateTime};

use crate::record::{FieldDescriptor, Record, Schema, Value};

/// Converts a value to a string.
///
/// Aggregates (records, arrays, maps) are not string-convertible here; use
/// `escapeJson` for a structural rendering. Bytes decode as lossy UTF-8.
/// Dates render as UTC in `YYYY-MM-DDTHH:MM:SS.mmmZ` form.
pub fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Record(_) | Value::Array(_) | Value::Map(_) => None,
        Value::Boolean(b) => Some(b.to_string()),
        Value::Long(n) => Some(n.to_string()),
        Value::Double(d) => Some(ryu::Buffer::new().format(*d).to_owned()),
        Value::String(s) => Some(s.clone()),
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Date(ms) => {
            let dt = chrono::DateTime::from_timestamp_millis(*ms)?;
            Some(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        }
    }
}

/// Converts a value to a long. Doubles truncate; strings parse as decimal
/// integers; dates convert to epoch milliseconds.
pub fn to_long(value: &Value) -> Option<i64> {
    match value {
        Value::Long(n) => Some(*n),
        Value::Double(d) => {
            if d.is_finite() { Some(*d as i64) } else { None }
        }
        Value::String(s) => s.trim().parse().ok(),
        Value::Date(ms) => Some(*ms),
        Value::Boolean(_) | Value::Null | Value::Bytes(_) | Value::Record(_) | Value::Array(_) | Value::Map(_) => None,
    }
}

/// Converts a value to a double. Longs widen; strings parse; dates convert
/// to epoch milliseconds.
pub fn to_double(value: &Value) -> Option<f64> {
    match value {
        Value::Double(d) => Some(*d),
        Value::Long(n) => Some(*n as f64),
        Value::String(s) => s.trim().parse().ok(),
        Value::Date(ms) => Some(*ms as f64),
        Value::Boolean(_) | Value::Null | Value::Bytes(_) | Value::Record(_) | Value::Array(_) | Value::Map(_) => None,
    }
}

/// Converts a value to a boolean. Only booleans and the strings
/// `"true"`/`"false"` (case-insensitive) convert.
pub fn to_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Converts a value to a moment (epoch milliseconds).
///
/// Longs are taken as epoch milliseconds directly. Strings try RFC 3339,
/// then `YYYY-MM-DD HH:MM:SS`, then a bare `YYYY-MM-DD` (midnight UTC).
pub fn to_date(value: &Value) -> Option<i64> {
    match value {
        Value::Date(ms) => Some(*ms),
        Value::Long(ms) => Some(*ms),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp_millis());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc().timestamp_millis());
            }
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
            }
            None
        }
        _ => None,
    }
}

/// Converts a value to a byte array. Strings encode as UTF-8.
pub fn to_byte_array(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(b) => Some(b.clone()),
        Value::String(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

/// Converts a value to a record. Maps convert with a schema inferred from
/// their entries, in entry order.
pub fn to_record(value: &Value) -> Option<Record> {
    match value {
        Value::Record(rec) => Some(rec.borrow().clone()),
        Value::Map(map) => {
            let map = map.borrow();
            let fields = map
                .iter()
                .map(|(k, v)| FieldDescriptor::new(k.clone(), v.data_type()))
                .collect();
            let mut record = Record::new(Schema::new(fields).into_ref());
            for (k, v) in map.iter() {
                record.set_value(k.clone(), v.clone());
            }
            Some(record)
        }
        _ => None,
    }
}
