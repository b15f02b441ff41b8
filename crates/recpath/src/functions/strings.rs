//! String functions: the substring family, the boolean string predicates,
//! case mapping, trimming, padding, and concatenation.
//!
//! All of these fan out over their first argument: one output value per
//! field value the argument produces. Remaining arguments are scalars,
//! evaluated once per call against the same context. Null subjects read as
//! the empty string except where a function documents otherwise (`padLeft`/
//! `padRight` pass null through).

use std::rc::Rc;

use crate::{
    error::PathResult,
    eval::{self, EvalContext, ValueStream, once, once_err},
    field_value::FieldValue,
    functions::{Function, coerce_string, fan, required_long, scalar_string, scalar_value},
    record::Value,
    tree::Expr,
};

/// `substring(s, start, end)`: 0-based, end-exclusive character slice.
/// A negative end or an empty window yields the empty string; bounds clamp
/// to the subject's length.
pub(super) fn substring<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let start = match required_long(&args[1], ctx.clone(), &current, Function::Substring, "numeric start index") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let end = match required_long(&args[2], ctx.clone(), &current, Function::Substring, "numeric end index") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), Function::Substring)?;
        Ok(Value::String(substring_of(&s, start, end)))
    })
}

fn substring_of(s: &str, start: i64, end: i64) -> String {
    if end < 0 || end <= start {
        return String::new();
    }
    let len = s.chars().count() as i64;
    if start > len {
        return String::new();
    }
    let start = start.max(0);
    let end = end.min(len);
    if end <= start {
        return String::new();
    }
    s.chars().skip(start as usize).take((end - start) as usize).collect()
}

/// `substringBefore` / `substringBeforeLast`: the prefix up to the first
/// (or last) occurrence of the search string. An empty or absent search
/// returns the subject unchanged.
pub(super) fn substring_before<'a>(
    args: &'a [Expr],
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    last: bool,
) -> ValueStream<'a> {
    let function = if last {
        Function::SubstringBeforeLast
    } else {
        Function::SubstringBefore
    };
    let search = match scalar_string(&args[1], ctx.clone(), &current, function) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), function)?;
        if search.is_empty() {
            return Ok(Value::String(s));
        }
        let found = if last { s.rfind(&search) } else { s.find(&search) };
        Ok(Value::String(match found {
            Some(index) => s[..index].to_owned(),
            None => s,
        }))
    })
}

/// `substringAfter` / `substringAfterLast`: the suffix past the first (or
/// last) occurrence of the search string, with the same fallback rule.
pub(super) fn substring_after<'a>(
    args: &'a [Expr],
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    last: bool,
) -> ValueStream<'a> {
    let function = if last {
        Function::SubstringAfterLast
    } else {
        Function::SubstringAfter
    };
    let search = match scalar_string(&args[1], ctx.clone(), &current, function) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), function)?;
        if search.is_empty() {
            return Ok(Value::String(s));
        }
        let found = if last { s.rfind(&search) } else { s.find(&search) };
        Ok(Value::String(match found {
            Some(index) => s[index + search.len()..].to_owned(),
            None => s,
        }))
    })
}

/// `contains(s, sub)`: substring test. The empty pattern matches.
pub(super) fn contains<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    string_predicate(args, ctx, current, Function::Contains, |s, pattern| s.contains(pattern))
}

/// `startsWith(s, p)`: prefix test. The empty pattern matches.
pub(super) fn starts_with<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    string_predicate(args, ctx, current, Function::StartsWith, |s, pattern| {
        s.starts_with(pattern)
    })
}

/// `endsWith(s, p)`: suffix test. The empty pattern matches.
pub(super) fn ends_with<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    string_predicate(args, ctx, current, Function::EndsWith, |s, pattern| s.ends_with(pattern))
}

fn string_predicate<'a>(
    args: &'a [Expr],
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    function: Function,
    test: impl Fn(&str, &str) -> bool + 'a,
) -> ValueStream<'a> {
    let pattern = match scalar_string(&args[1], ctx.clone(), &current, function) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), function)?;
        Ok(Value::Boolean(test(&s, &pattern)))
    })
}

/// `replace(s, from, to)`: literal replace-all. The replacement may itself
/// be a path; it is string-coerced.
pub(super) fn replace<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let from = match scalar_string(&args[1], ctx.clone(), &current, Function::Replace) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    let to = match scalar_string(&args[2], ctx.clone(), &current, Function::Replace) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), Function::Replace)?;
        Ok(Value::String(s.replace(&from, &to)))
    })
}

/// `replaceNull(a, b)`: `a` where non-null, `b` otherwise.
pub(super) fn replace_null<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let fallback = match scalar_value(&args[1], ctx.clone(), &current) {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        Ok(if fv.value().is_null() {
            fallback.clone()
        } else {
            fv.value().clone()
        })
    })
}

/// `toUpperCase(s)`: Unicode uppercase. Null and missing read as the empty
/// string.
pub(super) fn to_upper_case<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan_or_empty_string(&args[0], ctx, current, |fv| {
        let s = coerce_string(fv.value(), Function::ToUpperCase)?;
        Ok(Value::String(s.to_uppercase()))
    })
}

/// `toLowerCase(s)`: Unicode lowercase. Null and missing read as the empty
/// string.
pub(super) fn to_lower_case<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan_or_empty_string(&args[0], ctx, current, |fv| {
        let s = coerce_string(fv.value(), Function::ToLowerCase)?;
        Ok(Value::String(s.to_lowercase()))
    })
}

/// `trim(s)`: strips leading and trailing whitespace. Null and missing read
/// as the empty string.
pub(super) fn trim<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan_or_empty_string(&args[0], ctx, current, |fv| {
        let s = coerce_string(fv.value(), Function::Trim)?;
        Ok(Value::String(s.trim().to_owned()))
    })
}

/// Like [`fan`], but an argument that produces no values at all still yields
/// one empty string, honoring the "null/missing reads as empty" contract of
/// the case and trim functions.
fn fan_or_empty_string<'a>(
    arg: &'a Expr,
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    transform: impl Fn(&FieldValue) -> PathResult<Value> + 'a,
) -> ValueStream<'a> {
    let mut input = eval::eval_expr_stream(arg, ctx, current).peekable();
    if input.peek().is_none() {
        return once(FieldValue::standalone(Value::String(String::new()), ""));
    }
    Box::new(input.map(move |item| {
        let fv = item?;
        let value = transform(&fv)?;
        Ok(fv.with_function_result(value))
    }))
}

/// `isEmpty(x)`: true for a missing field, null, the empty string, or an
/// empty collection. A missing argument produces a single `true`.
pub(super) fn is_empty<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    emptiness(args, ctx, current, value_is_empty)
}

/// `isBlank(x)`: like `isEmpty`, and also true for all-whitespace strings.
pub(super) fn is_blank<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    emptiness(args, ctx, current, |v| match v {
        Value::String(s) => s.trim().is_empty(),
        other => value_is_empty(other),
    })
}

/// Shared shape of the emptiness predicates: an argument that produces no
/// values at all still answers `true` once, so `[isEmpty(./x)]` retains
/// candidates with no `x` field.
fn emptiness<'a>(
    args: &'a [Expr],
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    test: impl Fn(&Value) -> bool + 'a,
) -> ValueStream<'a> {
    let mut input = eval::eval_expr_stream(&args[0], ctx, current).peekable();
    if input.peek().is_none() {
        return once(FieldValue::standalone(Value::Boolean(true), ""));
    }
    Box::new(input.map(move |item| {
        let fv = item?;
        let answer = test(fv.value());
        Ok(fv.with_function_result(Value::Boolean(answer)))
    }))
}

fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Bytes(b) => b.is_empty(),
        Value::Array(arr) => arr.borrow().is_empty(),
        Value::Map(map) => map.borrow().is_empty(),
        _ => false,
    }
}

/// `padLeft(s, width [, pad])` / `padRight(...)`: pads to `width` characters
/// with the pad string cycled and truncated as needed (default `_`). A width
/// no larger than the subject returns the subject; a null subject stays null.
pub(super) fn pad<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>, left: bool) -> ValueStream<'a> {
    let function = if left { Function::PadLeft } else { Function::PadRight };
    let width = match required_long(&args[1], ctx.clone(), &current, function, "numeric width") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let pad_text = match args.get(2) {
        Some(arg) => match scalar_string(arg, ctx.clone(), &current, function) {
            Ok(v) => v.unwrap_or_else(|| "_".to_owned()),
            Err(e) => return once_err(e),
        },
        None => "_".to_owned(),
    };
    fan(&args[0], ctx, current, move |fv| {
        if fv.value().is_null() {
            return Ok(Value::Null);
        }
        let s = coerce_string(fv.value(), function)?;
        Ok(Value::String(pad_string(&s, width, &pad_text, left)))
    })
}

fn pad_string(s: &str, width: i64, pad: &str, left: bool) -> String {
    let len = s.chars().count() as i64;
    if width <= len {
        return s.to_owned();
    }
    let pad_chars: Vec<char> = pad.chars().collect();
    if pad_chars.is_empty() {
        return s.to_owned();
    }
    let needed = (width - len) as usize;
    let filler: String = (0..needed).map(|i| pad_chars[i % pad_chars.len()]).collect();
    if left {
        format!("{filler}{s}")
    } else {
        format!("{s}{filler}")
    }
}

/// `concat(a, b, …)`: string-coerces and concatenates every value produced
/// by every argument, in order. Null and aggregate values contribute nothing.
pub(super) fn concat<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let mut out = String::new();
    for arg in args {
        let mut stream = eval::eval_expr_stream(arg, ctx.clone(), Rc::clone(&current));
        while let Some(item) = stream.next() {
            match item {
                Ok(fv) => {
                    if let Some(s) = crate::convert::to_string(fv.value()) {
                        out.push_str(&s);
                    }
                }
                Err(e) => return once_err(e),
            }
        }
    }
    once(FieldValue::standalone(Value::String(out), ""))
}

/// `join(delimiter, a, b, …)`: string-coerces every value produced by the
/// trailing arguments and joins them with the delimiter.
pub(super) fn join<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let delimiter = match scalar_string(&args[0], ctx.clone(), &current, Function::Join) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return once_err(e),
    };
    let mut pieces = Vec::new();
    for arg in &args[1..] {
        let mut stream = eval::eval_expr_stream(arg, ctx.clone(), Rc::clone(&current));
        while let Some(item) = stream.next() {
            match item {
                Ok(fv) => pieces.push(crate::convert::to_string(fv.value()).unwrap_or_default()),
                Err(e) => return once_err(e),
            }
        }
    }
    once(FieldValue::standalone(Value::String(pieces.join(&delimiter)), ""))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn substring_clamps_and_empties_per_contract() {
        assert_eq!(substring_of("John Doe", 0, 4), "John");
        assert_eq!(substring_of("John Doe", 5, 100), "Doe", "end clamps to length");
        assert_eq!(substring_of("John Doe", 3, 3), "", "empty window");
        assert_eq!(substring_of("John Doe", 4, 2), "", "end before start");
        assert_eq!(substring_of("John Doe", 0, -1), "", "negative end");
        assert_eq!(substring_of("John Doe", 100, 101), "", "start past length");
        assert_eq!(substring_of("John Doe", -3, 4), "John", "negative start clamps to 0");
    }

    #[test]
    fn pad_cycles_and_truncates_the_pad_string() {
        assert_eq!(pad_string("abc", 6, "_", true), "___abc");
        assert_eq!(pad_string("abc", 6, "xy", false), "abcxyx");
        assert_eq!(pad_string("abc", 2, "_", true), "abc", "width below length");
        assert_eq!(pad_string("abc", -4, "_", true), "abc", "negative width");
        assert_eq!(pad_string("", 3, "ab", true), "aba", "empty subject fills entirely");
    }

    #[test]
    fn emptiness_covers_collections() {
        assert!(value_is_empty(&Value::Null));
        assert!(value_is_empty(&Value::String(String::new())));
        assert!(value_is_empty(&Value::array(vec![])));
        assert!(!value_is_empty(&Value::array(vec![Value::Long(1)])));
        assert!(!value_is_empty(&Value::Long(0)));
    }
}
