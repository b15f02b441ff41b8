//! Miscellaneous functions: stream consumers (`count`, `coalesce`), the
//! boolean negation, field-name reflection, value constructors (`mapOf`,
//! `recordOf`, `arrayOf`), and charset transcoding (`toString`, `toBytes`).

use std::{rc::Rc, str::FromStr};

use indexmap::IndexMap;

use crate::{
    charset::Charset,
    error::{PathError, PathErrorKind},
    eval::{self, EvalContext, ValueStream, empty, once, once_err},
    field_value::FieldValue,
    functions::{Function, coerce_string, fan, required_string, scalar_value},
    record::{FieldDescriptor, Record, Schema, Value},
    tree::Expr,
};

/// `count(path)`: the number of field values the argument produces.
pub(super) fn count<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let mut total: i64 = 0;
    let mut stream = eval::eval_expr_stream(&args[0], ctx, current);
    while let Some(item) = stream.next() {
        match item {
            Ok(_) => total += 1,
            Err(e) => return once_err(e),
        }
    }
    once(FieldValue::standalone(Value::Long(total), ""))
}

/// `coalesce(a, b, …)`: the first argument value that is non-null, with its
/// slot identity intact. Empty when every argument is null or missing.
pub(super) fn coalesce<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    for arg in args {
        let mut stream = eval::eval_expr_stream(arg, ctx.clone(), Rc::clone(&current));
        while let Some(item) = stream.next() {
            match item {
                Ok(fv) => {
                    if !fv.value().is_null() {
                        return once(fv);
                    }
                }
                Err(e) => return once_err(e),
            }
        }
    }
    empty()
}

/// `not(bool)`: negates the predicate truth of its argument.
pub(super) fn not<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    match eval::predicate_matches(&args[0], ctx, &current) {
        Ok(holds) => once(FieldValue::standalone(Value::Boolean(!holds), "")),
        Err(e) => once_err(e),
    }
}

/// `fieldName(x)`: the descriptor name of each value the argument produces.
/// Map entries and array elements answer with their container field's name.
pub(super) fn field_name<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan(&args[0], ctx, current, |fv| {
        Ok(Value::String(fv.descriptor().name().to_owned()))
    })
}

/// `mapOf(k1, v1, …)`: a new map from key/value argument pairs. Keys are
/// string-coerced; values keep their types; a missing value reads as null.
pub(super) fn map_of<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let mut entries = IndexMap::new();
    for pair in args.chunks(2) {
        let key = match required_string(&pair[0], ctx.clone(), &current, Function::MapOf, "string key") {
            Ok(v) => v,
            Err(e) => return once_err(e),
        };
        let value = match scalar_value(&pair[1], ctx.clone(), &current) {
            Ok(v) => v.unwrap_or(Value::Null),
            Err(e) => return once_err(e),
        };
        entries.insert(key, value);
    }
    once(FieldValue::standalone(Value::map(entries), ""))
}

/// `recordOf(k1, v1, …)`: like `mapOf`, but builds a record whose schema is
/// inferred from the values.
pub(super) fn record_of<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let mut names = Vec::new();
    let mut values = Vec::new();
    for pair in args.chunks(2) {
        let key = match required_string(&pair[0], ctx.clone(), &current, Function::RecordOf, "string key") {
            Ok(v) => v,
            Err(e) => return once_err(e),
        };
        let value = match scalar_value(&pair[1], ctx.clone(), &current) {
            Ok(v) => v.unwrap_or(Value::Null),
            Err(e) => return once_err(e),
        };
        names.push(key);
        values.push(value);
    }
    let fields = names
        .iter()
        .zip(&values)
        .map(|(name, value)| FieldDescriptor::new(name.clone(), value.data_type()))
        .collect();
    let record = Record::with_values(Schema::new(fields).into_ref(), names.into_iter().zip(values));
    once(FieldValue::standalone(Value::record(record), ""))
}

/// `arrayOf(v1, v2, …)`: a new array from the first value of each argument;
/// a missing argument contributes null.
pub(super) fn array_of<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let mut elements = Vec::with_capacity(args.len());
    for arg in args {
        match scalar_value(arg, ctx.clone(), &current) {
            Ok(v) => elements.push(v.unwrap_or(Value::Null)),
            Err(e) => return once_err(e),
        }
    }
    once(FieldValue::standalone(Value::array(elements), ""))
}

/// `toString(bytes, charset)`: decodes a byte array. Strings and null pass
/// through; other scalars string-coerce.
pub(super) fn to_string_charset<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let charset = match charset_argument(&args[1], &ctx, &current, Function::ToString) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| match fv.value() {
        Value::Null => Ok(Value::Null),
        Value::Bytes(bytes) => Ok(Value::String(charset.decode(bytes))),
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Ok(Value::String(coerce_string(other, Function::ToString)?)),
    })
}

/// `toBytes(s, charset)`: encodes a string. Byte arrays and null pass
/// through; other scalars string-coerce first.
pub(super) fn to_bytes_charset<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let charset = match charset_argument(&args[1], &ctx, &current, Function::ToBytes) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| match fv.value() {
        Value::Null => Ok(Value::Null),
        Value::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
        other => {
            let s = coerce_string(other, Function::ToBytes)?;
            Ok(Value::Bytes(charset.encode(&s)))
        }
    })
}

fn charset_argument(
    arg: &Expr,
    ctx: &EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
) -> Result<Charset, PathError> {
    let name = required_string(arg, ctx.clone(), current, function, "charset name")?;
    Charset::from_str(&name)
        .map_err(|_| PathError::eval(PathErrorKind::Charset, format!("unknown charset '{name}'")))
}
