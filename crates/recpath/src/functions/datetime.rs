//! Date functions: `toDate` and `format`.
//!
//! Patterns use chrono's strftime syntax. Both functions are contracted to
//! pass the value through unchanged on any parse or format problem (bad
//! input, an unparseable subject, an invalid pattern) and never raise. The
//! time zone argument accepts `UTC`/`GMT`/`Z` or a fixed offset (`+05:30`,
//! `-0800`); when absent the system's local zone applies.

use std::rc::Rc;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone,
    format::{Item, StrftimeItems},
};

use crate::{
    error::PathResult,
    eval::{EvalContext, ValueStream, once_err},
    field_value::FieldValue,
    functions::{Function, fan, required_string, scalar_string},
    record::Value,
    tree::Expr,
};

/// Where a wall-clock reading is interpreted or rendered.
#[derive(Debug, Clone, Copy)]
enum Zone {
    Local,
    Fixed(FixedOffset),
}

/// Parses a time zone argument: `UTC`, `GMT`, `Z`, or a fixed offset in
/// `±HH:MM`, `±HHMM`, or `±HH` form.
fn parse_zone(name: &str) -> Option<Zone> {
    let name = name.trim();
    if name.is_empty() {
        return Some(Zone::Local);
    }
    if name.eq_ignore_ascii_case("UTC") || name.eq_ignore_ascii_case("GMT") || name == "Z" {
        return FixedOffset::east_opt(0).map(Zone::Fixed);
    }
    let (sign, rest) = match name.as_bytes().first()? {
        b'+' => (1, &name[1..]),
        b'-' => (-1, &name[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = if digits.len() <= 2 {
        (digits.parse::<i32>().ok()?, 0)
    } else {
        let split = digits.len() - 2;
        (digits[..split].parse::<i32>().ok()?, digits[split..].parse::<i32>().ok()?)
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(Zone::Fixed)
}

/// True when the pattern parses cleanly as strftime items.
fn pattern_is_valid(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// `toDate(s, pattern [, timezone])`: parses a string into a moment.
/// Non-string input and unparseable strings pass through unchanged.
pub(super) fn to_date<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let pattern = match required_string(&args[1], ctx.clone(), &current, Function::ToDate, "pattern") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let zone = match zone_argument(args.get(2), &ctx, &current, Function::ToDate) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let Value::String(text) = fv.value() else {
            return Ok(fv.value().clone());
        };
        Ok(match parse_moment(text, &pattern, zone) {
            Some(ms) => Value::Date(ms),
            None => fv.value().clone(),
        })
    })
}

fn zone_argument(
    arg: Option<&Expr>,
    ctx: &EvalContext<'_>,
    current: &Rc<FieldValue>,
    function: Function,
) -> PathResult<Zone> {
    let Some(arg) = arg else {
        return Ok(Zone::Local);
    };
    match scalar_string(arg, ctx.clone(), current, function)? {
        Some(name) => Ok(parse_zone(&name).unwrap_or(Zone::Local)),
        None => Ok(Zone::Local),
    }
}

/// Parses a wall-clock string against a pattern, interpreting it in the
/// given zone. `None` means unparseable.
fn parse_moment(text: &str, pattern: &str, zone: Zone) -> Option<i64> {
    if !pattern_is_valid(pattern) {
        return None;
    }
    // Patterns carrying their own offset resolve without the zone argument.
    if let Ok(dt) = DateTime::parse_from_str(text, pattern) {
        return Some(dt.timestamp_millis());
    }
    let naive = NaiveDateTime::parse_from_str(text, pattern)
        .ok()
        .or_else(|| Some(NaiveDate::parse_from_str(text, pattern).ok()?.and_hms_opt(0, 0, 0)?))?;
    match zone {
        Zone::Fixed(offset) => Some(offset.from_local_datetime(&naive).earliest()?.timestamp_millis()),
        Zone::Local => Some(Local.from_local_datetime(&naive).earliest()?.timestamp_millis()),
    }
}

/// `format(date, pattern [, timezone])`: renders a moment as wall-clock
/// text. Non-date input and invalid patterns pass through unchanged.
pub(super) fn format<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let pattern = match required_string(&args[1], ctx.clone(), &current, Function::Format, "pattern") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let zone = match zone_argument(args.get(2), &ctx, &current, Function::Format) {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    fan(&args[0], ctx, current, move |fv| {
        let ms = match fv.value() {
            Value::Date(ms) | Value::Long(ms) => *ms,
            other => return Ok(other.clone()),
        };
        Ok(match format_moment(ms, &pattern, zone) {
            Some(text) => Value::String(text),
            None => fv.value().clone(),
        })
    })
}

fn format_moment(ms: i64, pattern: &str, zone: Zone) -> Option<String> {
    if !pattern_is_valid(pattern) {
        return None;
    }
    let utc = DateTime::from_timestamp_millis(ms)?;
    Some(match zone {
        Zone::Fixed(offset) => utc.with_timezone(&offset).format(pattern).to_string(),
        Zone::Local => utc.with_timezone(&Local).format(pattern).to_string(),
    })
}
