//! JSON bridge functions: `escapeJson` and `unescapeJson`.
//!
//! `escapeJson` renders any value as a JSON string: records and maps become
//! objects (fields in schema / insertion order), arrays become arrays, bytes
//! become arrays of numbers, dates become epoch milliseconds. `unescapeJson`
//! parses a JSON string back into a value, optionally coercing objects into
//! records with inferred schemas.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    convert,
    error::{PathError, PathErrorKind},
    eval::{EvalContext, ValueStream, once_err},
    field_value::FieldValue,
    functions::{fan, scalar_value},
    record::Value,
    tree::Expr,
};

/// `escapeJson(x)`: the JSON rendering of the value.
pub(super) fn escape_json<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan(&args[0], ctx, current, |fv| {
        let json = value_to_json(fv.value());
        let text = serde_json::to_string(&json).map_err(|e| {
            PathError::eval(PathErrorKind::ParseFailed, format!("value is not JSON-renderable: {e}"))
        })?;
        Ok(Value::String(text))
    })
}

/// `unescapeJson(s [, recordsFromMaps])`: parses JSON text. Invalid JSON is
/// a `parse-failed` error; non-string input is a `type` error; null passes
/// through.
pub(super) fn unescape_json<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let records_from_maps = match args.get(1) {
        Some(arg) => match scalar_value(arg, ctx.clone(), &current) {
            Ok(v) => v.as_ref().and_then(convert::to_boolean).unwrap_or(false),
            Err(e) => return once_err(e),
        },
        None => false,
    };
    fan(&args[0], ctx, current, move |fv| match fv.value() {
        Value::Null => Ok(Value::Null),
        Value::String(text) => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                PathError::eval(PathErrorKind::ParseFailed, format!("invalid JSON: {e}"))
            })?;
            Ok(json_to_value(json, records_from_maps))
        }
        other => Err(PathError::eval(
            PathErrorKind::Type,
            format!("unescapeJson() requires a string, got a {}", other.type_name()),
        )),
    })
}

/// Renders a value as a JSON tree. Non-finite doubles become null, matching
/// JSON's number model.
pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Long(n) => serde_json::Value::from(*n),
        Value::Double(d) => serde_json::Number::from_f64(*d).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(bytes) => serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect()),
        Value::Date(ms) => serde_json::Value::from(*ms),
        Value::Record(record) => {
            let record = record.borrow();
            let mut object = serde_json::Map::new();
            for field in record.schema().fields() {
                let value = record.get_value(field.name()).unwrap_or(Value::Null);
                object.insert(field.name().to_owned(), value_to_json(&value));
            }
            serde_json::Value::Object(object)
        }
        Value::Array(array) => serde_json::Value::Array(array.borrow().iter().map(value_to_json).collect()),
        Value::Map(map) => {
            let mut object = serde_json::Map::new();
            for (key, value) in map.borrow().iter() {
                object.insert(key.clone(), value_to_json(value));
            }
            serde_json::Value::Object(object)
        }
    }
}

/// Converts a parsed JSON tree into a value. Objects become maps, or records
/// with inferred schemas when `records_from_maps` is set. Whole numbers
/// become longs; everything else numeric becomes a double.
pub(crate) fn json_to_value(json: serde_json::Value, records_from_maps: bool) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| Value::Double(n.as_f64().unwrap_or(f64::NAN)), Value::Long),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::array(
            items
                .into_iter()
                .map(|item| json_to_value(item, records_from_maps))
                .collect(),
        ),
        serde_json::Value::Object(object) => {
            let mut entries = IndexMap::new();
            for (key, value) in object {
                entries.insert(key, json_to_value(value, records_from_maps));
            }
            let map = Value::map(entries);
            if records_from_maps {
                convert::to_record(&map).map_or(map, Value::record)
            } else {
                map
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scalars_round_trip_through_json() {
        assert_eq!(value_to_json(&Value::Long(48)), serde_json::json!(48));
        assert_eq!(value_to_json(&Value::Boolean(true)), serde_json::json!(true));
        assert_eq!(value_to_json(&Value::Null), serde_json::Value::Null);
        assert_eq!(json_to_value(serde_json::json!(1.5), false), Value::Double(1.5));
        assert_eq!(
            json_to_value(serde_json::json!("x"), false),
            Value::String("x".to_owned())
        );
    }

    #[test]
    fn objects_become_maps_preserving_key_order() {
        let value = json_to_value(serde_json::json!({"b": 1, "a": 2}), false);
        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        let keys: Vec<String> = map.borrow().keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn objects_become_records_when_asked() {
        let value = json_to_value(serde_json::json!({"id": 1, "name": "x"}), true);
        let Value::Record(record) = value else {
            panic!("expected a record");
        };
        assert_eq!(record.borrow().get_value("id"), Some(Value::Long(1)));
        let names: Vec<_> = record
            .borrow()
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(names, vec!["id".to_owned(), "name".to_owned()]);
    }

    #[test]
    fn non_finite_doubles_render_as_null() {
        assert_eq!(value_to_json(&Value::Double(f64::NAN)), serde_json::Value::Null);
    }
}
