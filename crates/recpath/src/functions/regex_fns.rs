//! Regex functions: `containsRegex`, `matchesRegex`, `replaceRegex`.
//!
//! Patterns compile through the per-path cache, so a pattern used across many
//! records compiles once per compiled path. `matchesRegex` anchors the
//! pattern to the whole subject; `containsRegex` searches anywhere.

use std::rc::Rc;

use crate::{
    eval::{EvalContext, ValueStream, once_err},
    field_value::FieldValue,
    functions::{Function, coerce_string, fan, required_string},
    record::Value,
    tree::Expr,
};

/// `containsRegex(s, re)`: true when the pattern matches anywhere.
pub(super) fn contains_regex<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let pattern = match required_string(&args[1], ctx.clone(), &current, Function::ContainsRegex, "pattern") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let regex = match ctx.caches.regex(&pattern) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), Function::ContainsRegex)?;
        Ok(Value::Boolean(regex.is_match(&s)))
    })
}

/// `matchesRegex(s, re)`: true when the pattern matches the whole subject.
pub(super) fn matches_regex<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let pattern = match required_string(&args[1], ctx.clone(), &current, Function::MatchesRegex, "pattern") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let regex = match ctx.caches.regex(&format!("^(?:{pattern})$")) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), Function::MatchesRegex)?;
        Ok(Value::Boolean(regex.is_match(&s)))
    })
}

/// `replaceRegex(s, re, repl)`: replaces every match. The replacement
/// supports `$1` and `${name}` group references; `\$` escapes a literal
/// dollar sign.
pub(super) fn replace_regex<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let pattern = match required_string(&args[1], ctx.clone(), &current, Function::ReplaceRegex, "pattern") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let replacement = match required_string(&args[2], ctx.clone(), &current, Function::ReplaceRegex, "replacement") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let regex = match ctx.caches.regex(&pattern) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    // The replacement engine spells a literal dollar as `$$`; the path
    // language spells it `\$`.
    let replacement = replacement.replace("\\$", "$$");
    fan(&args[0], ctx, current, move |fv| {
        let s = coerce_string(fv.value(), Function::ReplaceRegex)?;
        Ok(Value::String(regex.replace_all(&s, replacement.as_str()).into_owned()))
    })
}
