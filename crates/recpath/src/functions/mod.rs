//! The path function library.
//!
//! Functions are enumerated in [`Function`]: the enum is the registry. Name
//! resolution (`FromStr`), arity metadata, and the filter-safety flag used by
//! the predicate-placement rule all live here, so adding a function touches
//! this file and one family module. Each family has its own submodule:
//!
//! - `strings`: substring family, predicates, case, trim, pad, concat, join
//! - `regex_fns`: `containsRegex`, `matchesRegex`, `replaceRegex`
//! - `json_fns`: `escapeJson`, `unescapeJson`
//! - `digest`: `hash`, `uuid5`, `base64Encode`, `base64Decode`
//! - `datetime`: `toDate`, `format`
//! - `misc`: `count`, `coalesce`, `not`, `fieldName`, `mapOf`, `recordOf`,
//!   `arrayOf`, `toString`, `toBytes`

use std::rc::Rc;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    convert,
    error::{PathError, PathErrorKind, PathResult},
    eval::{self, EvalContext, ValueStream},
    field_value::FieldValue,
    record::Value,
    tree::{Expr, FunctionCall},
};

pub(crate) mod datetime;
pub(crate) mod digest;
pub(crate) mod json_fns;
pub(crate) mod misc;
pub(crate) mod regex_fns;
pub(crate) mod strings;

/// Every library function, named as written in path source.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and
/// `Into<&'static str>` implementations; all variants serialize in camelCase
/// (e.g., `SubstringBeforeLast` -> "substringBeforeLast").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub(crate) enum Function {
    Substring,
    SubstringBefore,
    SubstringBeforeLast,
    SubstringAfter,
    SubstringAfterLast,
    /// Filter: true when the subject contains the pattern.
    Contains,
    /// Filter: true when the subject starts with the prefix.
    StartsWith,
    /// Filter: true when the subject ends with the suffix.
    EndsWith,
    /// Filter: true when the regex matches anywhere in the subject.
    ContainsRegex,
    /// Filter: true when the regex matches the whole subject.
    MatchesRegex,
    Replace,
    ReplaceRegex,
    ReplaceNull,
    ToUpperCase,
    ToLowerCase,
    Trim,
    /// Filter: true when the argument is missing, null, or empty.
    IsEmpty,
    /// Filter: true when the argument is empty or all whitespace.
    IsBlank,
    PadLeft,
    PadRight,
    Concat,
    Join,
    FieldName,
    EscapeJson,
    UnescapeJson,
    Count,
    Coalesce,
    /// Filter: negates its boolean argument.
    Not,
    Hash,
    Uuid5,
    Base64Encode,
    Base64Decode,
    ToString,
    ToBytes,
    ToDate,
    Format,
    MapOf,
    RecordOf,
    ArrayOf,
}

impl Function {
    /// The accepted argument count as `(minimum, maximum)`; `None` means
    /// unbounded.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Substring | Self::Replace | Self::ReplaceRegex => (3, Some(3)),
            Self::SubstringBefore
            | Self::SubstringBeforeLast
            | Self::SubstringAfter
            | Self::SubstringAfterLast
            | Self::Contains
            | Self::StartsWith
            | Self::EndsWith
            | Self::ContainsRegex
            | Self::MatchesRegex
            | Self::ReplaceNull
            | Self::Hash
            | Self::ToString
            | Self::ToBytes => (2, Some(2)),
            Self::ToUpperCase
            | Self::ToLowerCase
            | Self::Trim
            | Self::IsEmpty
            | Self::IsBlank
            | Self::FieldName
            | Self::EscapeJson
            | Self::Count
            | Self::Not
            | Self::Base64Encode
            | Self::Base64Decode => (1, Some(1)),
            Self::PadLeft | Self::PadRight | Self::ToDate | Self::Format => (2, Some(3)),
            Self::UnescapeJson | Self::Uuid5 => (1, Some(2)),
            Self::Concat | Self::Coalesce | Self::ArrayOf => (1, None),
            Self::MapOf | Self::RecordOf | Self::Join => (2, None),
        }
    }

    /// True for functions whose argument lists must pair up (`mapOf`,
    /// `recordOf`); an odd count is an arity error.
    pub fn requires_even_args(self) -> bool {
        matches!(self, Self::MapOf | Self::RecordOf)
    }

    /// True for filter functions: boolean predicates over the current
    /// context, legal as a bare predicate body. Everything else must appear
    /// inside a larger filter expression.
    pub fn is_filter(self) -> bool {
        matches!(
            self,
            Self::Contains
                | Self::StartsWith
                | Self::EndsWith
                | Self::ContainsRegex
                | Self::MatchesRegex
                | Self::IsEmpty
                | Self::IsBlank
                | Self::Not
        )
    }
}

/// Evaluates a function call with `current` as the relative base for its
/// arguments.
pub(crate) fn eval_call<'a>(call: &'a FunctionCall, ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let args = call.args.as_slice();
    match call.function {
        Function::Substring => strings::substring(args, ctx, current),
        Function::SubstringBefore => strings::substring_before(args, ctx, current, false),
        Function::SubstringBeforeLast => strings::substring_before(args, ctx, current, true),
        Function::SubstringAfter => strings::substring_after(args, ctx, current, false),
        Function::SubstringAfterLast => strings::substring_after(args, ctx, current, true),
        Function::Contains => strings::contains(args, ctx, current),
        Function::StartsWith => strings::starts_with(args, ctx, current),
        Function::EndsWith => strings::ends_with(args, ctx, current),
        Function::ContainsRegex => regex_fns::contains_regex(args, ctx, current),
        Function::MatchesRegex => regex_fns::matches_regex(args, ctx, current),
        Function::Replace => strings::replace(args, ctx, current),
        Function::ReplaceRegex => regex_fns::replace_regex(args, ctx, current),
        Function::ReplaceNull => strings::replace_null(args, ctx, current),
        Function::ToUpperCase => strings::to_upper_case(args, ctx, current),
        Function::ToLowerCase => strings::to_lower_case(args, ctx, current),
        Function::Trim => strings::trim(args, ctx, current),
        Function::IsEmpty => strings::is_empty(args, ctx, current),
        Function::IsBlank => strings::is_blank(args, ctx, current),
        Function::PadLeft => strings::pad(args, ctx, current, true),
        Function::PadRight => strings::pad(args, ctx, current, false),
        Function::Concat => strings::concat(args, ctx, current),
        Function::Join => strings::join(args, ctx, current),
        Function::FieldName => misc::field_name(args, ctx, current),
        Function::EscapeJson => json_fns::escape_json(args, ctx, current),
        Function::UnescapeJson => json_fns::unescape_json(args, ctx, current),
        Function::Count => misc::count(args, ctx, current),
        Function::Coalesce => misc::coalesce(args, ctx, current),
        Function::Not => misc::not(args, ctx, current),
        Function::Hash => digest::hash(args, ctx, current),
        Function::Uuid5 => digest::uuid5(args, ctx, current),
        Function::Base64Encode => digest::base64_encode(args, ctx, current),
        Function::Base64Decode => digest::base64_decode(args, ctx, current),
        Function::ToString => misc::to_string_charset(args, ctx, current),
        Function::ToBytes => misc::to_bytes_charset(args, ctx, current),
        Function::ToDate => datetime::to_date(args, ctx, current),
        Function::Format => datetime::format(args, ctx, current),
        Function::MapOf => misc::map_of(args, ctx, current),
        Function::RecordOf => misc::record_of(args, ctx, current),
        Function::ArrayOf => misc::array_of(args, ctx, current),
    }
}

// ---------------------------------------------------------------------------
// shared argument helpers
// ---------------------------------------------------------------------------

/// Maps `transform` over every field value produced by the first argument.
/// Each output keeps the input's slot name and ancestry but carries the
/// transformed value and no writeback target.
pub(crate) fn fan<'a>(
    arg: &'a Expr,
    ctx: EvalContext<'a>,
    current: Rc<FieldValue>,
    transform: impl Fn(&FieldValue) -> PathResult<Value> + 'a,
) -> ValueStream<'a> {
    let input = eval::eval_expr_stream(arg, ctx, current);
    Box::new(input.map(move |item| {
        let fv = item?;
        let value = transform(&fv)?;
        Ok(fv.with_function_result(value))
    }))
}

/// Evaluates an argument and takes its first value, if any.
pub(crate) fn scalar_value(expr: &Expr, ctx: EvalContext<'_>, current: &Rc<FieldValue>) -> PathResult<Option<Value>> {
    Ok(eval::first_expr_value(expr, ctx, current)?.map(FieldValue::into_value))
}

/// Evaluates an argument to a string. Missing and null read as `None`;
/// values that cannot be string-coerced are `type` errors.
pub(crate) fn scalar_string(
    expr: &Expr,
    ctx: EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
) -> PathResult<Option<String>> {
    match scalar_value(expr, ctx, current)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_string(&value, function).map(Some),
    }
}

/// Evaluates an argument to a long. Missing and null read as `None`; values
/// that cannot be numerically coerced are `type` errors.
pub(crate) fn scalar_long(
    expr: &Expr,
    ctx: EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
) -> PathResult<Option<i64>> {
    match scalar_value(expr, ctx, current)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert::to_long(&value)
            .ok_or_else(|| {
                PathError::eval(
                    PathErrorKind::Type,
                    format!("{function}() cannot convert a {} to a number", value.type_name()),
                )
            })
            .map(Some),
    }
}

/// Evaluates a required string argument; missing is a `type` error.
pub(crate) fn required_string(
    expr: &Expr,
    ctx: EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
    what: &str,
) -> PathResult<String> {
    scalar_string(expr, ctx, current, function)?.ok_or_else(|| {
        PathError::eval(PathErrorKind::Type, format!("{function}() requires a {what}"))
    })
}

/// Evaluates a required numeric argument; missing is a `type` error.
pub(crate) fn required_long(
    expr: &Expr,
    ctx: EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
    what: &str,
) -> PathResult<i64> {
    scalar_long(expr, ctx, current, function)?.ok_or_else(|| {
        PathError::eval(PathErrorKind::Type, format!("{function}() requires a {what}"))
    })
}

/// String-coerces a value for the string function family. Null reads as the
/// empty string; aggregates are `type` errors.
pub(crate) fn coerce_string(value: &Value, function: Function) -> PathResult<String> {
    if value.is_null() {
        return Ok(String::new());
    }
    convert::to_string(value).ok_or_else(|| {
        PathError::eval(
            PathErrorKind::Type,
            format!("{function}() cannot convert a {} to a string", value.type_name()),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn names_resolve_in_camel_case() {
        assert_eq!(Function::from_str("substringBeforeLast"), Ok(Function::SubstringBeforeLast));
        assert_eq!(Function::from_str("toUpperCase"), Ok(Function::ToUpperCase));
        assert_eq!(Function::from_str("base64Encode"), Ok(Function::Base64Encode));
        assert_eq!(Function::from_str("uuid5"), Ok(Function::Uuid5));
        assert_eq!(Function::from_str("mapOf"), Ok(Function::MapOf));
        assert!(Function::from_str("subString").is_err(), "names are case-sensitive");
    }

    #[test]
    fn filter_safety_covers_exactly_the_boolean_predicates() {
        for function in [
            Function::Contains,
            Function::StartsWith,
            Function::EndsWith,
            Function::ContainsRegex,
            Function::MatchesRegex,
            Function::IsEmpty,
            Function::IsBlank,
            Function::Not,
        ] {
            assert!(function.is_filter(), "{function} should be filter-safe");
        }
        for function in [Function::Substring, Function::Concat, Function::Count, Function::Hash] {
            assert!(!function.is_filter(), "{function} should not be filter-safe");
        }
    }

    #[test]
    fn arity_bounds_are_enforced_for_variadics() {
        assert_eq!(Function::Substring.arity(), (3, Some(3)));
        assert_eq!(Function::Concat.arity(), (1, None));
        assert_eq!(Function::MapOf.arity(), (2, None));
        assert!(Function::MapOf.requires_even_args());
        assert!(!Function::Concat.requires_even_args());
    }
}
