//! The evaluator: walks a compiled path tree against a record, producing a
//! lazy stream of field values.
//!
//! Streams are boxed pull iterators over `PathResult<FieldValue>`. Each step
//! adapts the incoming stream; nothing is materialized except per-node child
//! lists and the inputs of intrinsically-consuming functions. Consumers
//! cancel by dropping the iterator.
//!
//! The evaluation context carries the root field value (absolute paths
//! restart from it) and the per-compiled-path caches.

use std::{
    rc::Rc,
    sync::{Mutex, PoisonError},
};

use ahash::AHashMap;
use regex::Regex;

use crate::{
    convert,
    error::{PathError, PathErrorKind, PathResult},
    field_value::{FieldValue, Writeback},
    functions,
    record::{ArrayRef, DataType, FieldDescriptor, MapRef, RecordRef, Value},
    tree::{BracketOp, CmpOp, Expr, IndexEntry, Literal, PathTree, Step, StepKind},
};

/// A lazy, finite stream of field values. Errors terminate the stream from
/// the consumer's point of view; adapters simply pass them through.
pub(crate) type ValueStream<'a> = Box<dyn Iterator<Item = PathResult<FieldValue>> + 'a>;

/// Per-compiled-path caches, populated lazily on first use and effectively
/// read-only afterwards. Interior mutability keeps compiled paths shareable
/// across threads.
#[derive(Debug, Default)]
pub(crate) struct PathCaches {
    regexes: Mutex<AHashMap<String, Regex>>,
}

impl PathCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a regex, or returns the cached compilation of the same
    /// pattern source. Invalid patterns are `parse-failed` errors.
    pub fn regex(&self, pattern: &str) -> PathResult<Regex> {
        let mut cache = self.regexes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| {
            PathError::eval(
                PathErrorKind::ParseFailed,
                format!("invalid regular expression '{pattern}': {e}"),
            )
        })?;
        cache.insert(pattern.to_owned(), re.clone());
        Ok(re)
    }
}

/// The context threaded through evaluation.
#[derive(Clone)]
pub(crate) struct EvalContext<'a> {
    /// The field value wrapping the root record. Absolute paths restart here.
    pub root: Rc<FieldValue>,
    pub caches: &'a PathCaches,
}

/// An empty stream.
pub(crate) fn empty<'a>() -> ValueStream<'a> {
    Box::new(std::iter::empty())
}

/// A single-item stream.
pub(crate) fn once<'a>(fv: FieldValue) -> ValueStream<'a> {
    Box::new(std::iter::once(Ok(fv)))
}

/// A single-error stream.
pub(crate) fn once_err<'a>(e: PathError) -> ValueStream<'a> {
    Box::new(std::iter::once(Err(e)))
}

/// Applies `f` to each successful item, flattening the produced streams.
/// Errors pass through unchanged.
pub(crate) fn flat_map_ok<'a>(
    input: ValueStream<'a>,
    f: impl Fn(FieldValue) -> ValueStream<'a> + 'a,
) -> ValueStream<'a> {
    Box::new(input.flat_map(move |item| match item {
        Ok(fv) => f(fv),
        Err(e) => once_err(e),
    }))
}

/// Evaluates a path tree, starting from the root (absolute) or the current
/// value (relative).
pub(crate) fn eval_path<'a>(tree: &'a PathTree, ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let start = if tree.absolute { Rc::clone(&ctx.root) } else { current };
    let mut stream = once((*start).clone());
    for step in &tree.steps {
        stream = apply_step(step, stream, ctx.clone());
    }
    stream
}

fn apply_step<'a>(step: &'a Step, input: ValueStream<'a>, ctx: EvalContext<'a>) -> ValueStream<'a> {
    let mut stream: ValueStream<'a> = match &step.kind {
        StepKind::SelfRef => input,
        StepKind::Parent => Box::new(input.filter_map(|item| match item {
            Ok(fv) => fv.parent().cloned().map(Ok),
            Err(e) => Some(Err(e)),
        })),
        StepKind::Child(name) if step.descendant => flat_map_ok(input, move |fv| {
            descendant_stream(fv, DescendantMatch::Name(name.as_str()))
        }),
        StepKind::Child(name) => flat_map_ok(input, move |fv| child_stream(&fv, name)),
        StepKind::Wildcard if step.descendant => {
            flat_map_ok(input, move |fv| descendant_stream(fv, DescendantMatch::Any))
        }
        StepKind::Wildcard => flat_map_ok(input, |fv| wildcard_stream(fv)),
        StepKind::Call(call) => {
            let call_ctx = ctx.clone();
            flat_map_ok(input, move |fv| {
                functions::eval_call(call, call_ctx.clone(), Rc::new(fv))
            })
        }
    };
    for op in &step.ops {
        stream = apply_bracket(op, stream, ctx.clone());
    }
    stream
}

// ---------------------------------------------------------------------------
// child / wildcard / descendant selection
// ---------------------------------------------------------------------------

/// Emits the named field of a record-bearing value, or nothing.
fn child_stream<'a>(fv: &FieldValue, name: &str) -> ValueStream<'a> {
    let Value::Record(record) = fv.value() else {
        return empty();
    };
    let record = record.clone();
    let parent = Rc::new(fv.clone());
    match record_child(&parent, &record, name) {
        Some(child) => once(child),
        None => empty(),
    }
}

/// Builds the field value for one record field. Absent fields (neither in the
/// schema nor ever set) produce `None`; schema fields that were never set
/// read as null so they can still be updated through.
pub(crate) fn record_child(parent: &Rc<FieldValue>, record: &RecordRef, name: &str) -> Option<FieldValue> {
    let rec = record.borrow();
    let descriptor = match rec.schema().field(name) {
        Some(descriptor) => descriptor.clone(),
        None if rec.has_value(name) => {
            let data_type = rec.get_value(name).map_or(DataType::Null, |v| v.data_type());
            FieldDescriptor::new(name, data_type)
        }
        None => return None,
    };
    let value = rec.get_value(name).unwrap_or(Value::Null);
    drop(rec);
    Some(FieldValue::new(
        value,
        Rc::new(descriptor),
        Some(Rc::clone(parent)),
        Writeback::RecordField {
            record: record.clone(),
            field: name.to_owned(),
        },
    ))
}

/// The element type declared by a container's descriptor, if it has one.
fn element_type(descriptor: &FieldDescriptor) -> Option<DataType> {
    match descriptor.data_type() {
        DataType::Array(element) | DataType::Map(element) => Some((**element).clone()),
        _ => None,
    }
}

/// Builds the field value for one map entry. The descriptor carries the map
/// field's own name; entries share it.
fn map_entry(parent: &Rc<FieldValue>, map: &MapRef, key: &str) -> Option<FieldValue> {
    let value = map.borrow().get(key).cloned()?;
    let data_type = element_type(parent.descriptor()).unwrap_or_else(|| value.data_type());
    let descriptor = Rc::new(FieldDescriptor::new(parent.descriptor().name(), data_type));
    Some(FieldValue::new(
        value,
        descriptor,
        Some(Rc::clone(parent)),
        Writeback::MapEntry {
            map: map.clone(),
            key: key.to_owned(),
        },
    ))
}

/// Builds the field value for one array element, carrying its index.
fn array_element(parent: &Rc<FieldValue>, array: &ArrayRef, index: usize) -> Option<FieldValue> {
    let value = array.borrow().get(index).cloned()?;
    let data_type = element_type(parent.descriptor()).unwrap_or_else(|| value.data_type());
    let descriptor = Rc::new(FieldDescriptor::new(parent.descriptor().name(), data_type));
    Some(FieldValue::new(
        value,
        descriptor,
        Some(Rc::clone(parent)),
        Writeback::ArrayElement {
            array: array.clone(),
            index,
        },
    ))
}

/// `*` on a record: every schema field in schema order. On a map or array:
/// every entry or element. On a scalar: nothing.
fn wildcard_stream<'a>(fv: FieldValue) -> ValueStream<'a> {
    match fv.value().clone() {
        Value::Record(record) => {
            let parent = Rc::new(fv);
            let names: Vec<String> = record
                .borrow()
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().to_owned())
                .collect();
            let children: Vec<FieldValue> = names
                .iter()
                .filter_map(|name| record_child(&parent, &record, name))
                .collect();
            Box::new(children.into_iter().map(Ok))
        }
        Value::Map(_) | Value::Array(_) => elements_stream(fv),
        _ => empty(),
    }
}

/// `[*]` and map/array wildcard traversal: every element of an array (with
/// its index) or every entry of a map (in insertion order).
fn elements_stream<'a>(fv: FieldValue) -> ValueStream<'a> {
    match fv.value().clone() {
        Value::Array(array) => {
            let parent = Rc::new(fv);
            let len = array.borrow().len();
            let elements: Vec<FieldValue> = (0..len)
                .filter_map(|i| array_element(&parent, &array, i))
                .collect();
            Box::new(elements.into_iter().map(Ok))
        }
        Value::Map(map) => {
            let parent = Rc::new(fv);
            let keys: Vec<String> = map.borrow().keys().cloned().collect();
            let entries: Vec<FieldValue> = keys
                .iter()
                .filter_map(|key| map_entry(&parent, &map, key))
                .collect();
            Box::new(entries.into_iter().map(Ok))
        }
        _ => empty(),
    }
}

/// What a descendant step matches.
#[derive(Clone, Copy)]
enum DescendantMatch<'a> {
    /// Match record fields with this name. Synthetic children (map entries,
    /// array elements) inherit their container's name and never match by it.
    Name(&'a str),
    /// Match every descendant.
    Any,
}

/// Pre-order walk over all descendants of a value. The starting value itself
/// is not a descendant. Records are tree-shaped by host contract, so the walk
/// terminates without revisit tracking.
fn descendant_stream<'a>(fv: FieldValue, matcher: DescendantMatch<'a>) -> ValueStream<'a> {
    let mut stack = container_children(&fv);
    stack.reverse();
    Box::new(DescendantIter { matcher, stack })
}

struct DescendantIter<'a> {
    matcher: DescendantMatch<'a>,
    /// Nodes yet to visit; the top of the stack is the next pre-order node.
    /// The flag records whether the node came from a record field, making its
    /// descriptor name authoritative for name matching.
    stack: Vec<(FieldValue, bool)>,
}

impl Iterator for DescendantIter<'_> {
    type Item = PathResult<FieldValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (fv, is_record_field) = self.stack.pop()?;
            let mut children = container_children(&fv);
            children.reverse();
            self.stack.extend(children);

            let matched = match self.matcher {
                DescendantMatch::Name(name) => is_record_field && fv.descriptor().name() == name,
                DescendantMatch::Any => true,
            };
            if matched {
                return Some(Ok(fv));
            }
        }
    }
}

/// The direct children of a container value: record fields in schema order,
/// array elements in index order, map entries in insertion order.
fn container_children(fv: &FieldValue) -> Vec<(FieldValue, bool)> {
    match fv.value() {
        Value::Record(record) => {
            let record = record.clone();
            let parent = Rc::new(fv.clone());
            let names: Vec<String> = record
                .borrow()
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().to_owned())
                .collect();
            names
                .iter()
                .filter_map(|name| record_child(&parent, &record, name))
                .map(|child| (child, true))
                .collect()
        }
        Value::Array(array) => {
            let array = array.clone();
            let parent = Rc::new(fv.clone());
            let len = array.borrow().len();
            (0..len)
                .filter_map(|i| array_element(&parent, &array, i))
                .map(|child| (child, false))
                .collect()
        }
        Value::Map(map) => {
            let map = map.clone();
            let parent = Rc::new(fv.clone());
            let keys: Vec<String> = map.borrow().keys().cloned().collect();
            keys.iter()
                .filter_map(|key| map_entry(&parent, &map, key))
                .map(|child| (child, false))
                .collect()
        }
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// bracket operations
// ---------------------------------------------------------------------------

fn apply_bracket<'a>(op: &'a BracketOp, input: ValueStream<'a>, ctx: EvalContext<'a>) -> ValueStream<'a> {
    match op {
        BracketOp::Indices(entries) => flat_map_ok(input, move |fv| indices_stream(fv, entries)),
        BracketOp::Keys(keys) => flat_map_ok(input, move |fv| keys_stream(fv, keys)),
        BracketOp::Wildcard => flat_map_ok(input, |fv| elements_stream(fv)),
        BracketOp::Filter(expr) => filter_stream(expr, input, ctx),
    }
}

/// Resolves a possibly-negative index against an array length. Out-of-range
/// indices resolve to `None`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// Index selection on an array-bearing value. Entries emit in listed order;
/// duplicates are allowed; out-of-range indices contribute nothing; a
/// reversed range is empty. Non-array values contribute nothing.
fn indices_stream<'a>(fv: FieldValue, entries: &[IndexEntry]) -> ValueStream<'a> {
    let Value::Array(array) = fv.value() else {
        return empty();
    };
    let array = array.clone();
    let parent = Rc::new(fv);
    let len = array.borrow().len();

    let mut selected = Vec::new();
    for entry in entries {
        match *entry {
            IndexEntry::At(index) => {
                if let Some(resolved) = resolve_index(index, len) {
                    selected.push(resolved);
                }
            }
            IndexEntry::Range(start, end) => {
                let start = if start < 0 { len as i64 + start } else { start };
                let end = if end < 0 { len as i64 + end } else { end };
                for index in start..=end {
                    if (0..len as i64).contains(&index) {
                        selected.push(index as usize);
                    }
                }
            }
        }
    }

    let elements: Vec<FieldValue> = selected
        .into_iter()
        .filter_map(|i| array_element(&parent, &array, i))
        .collect();
    Box::new(elements.into_iter().map(Ok))
}

/// Key selection on a map-bearing value. Keys emit in listed order; missing
/// keys contribute nothing. Non-map values contribute nothing.
fn keys_stream<'a>(fv: FieldValue, keys: &[String]) -> ValueStream<'a> {
    let Value::Map(map) = fv.value() else {
        return empty();
    };
    let map = map.clone();
    let parent = Rc::new(fv);
    let entries: Vec<FieldValue> = keys
        .iter()
        .filter_map(|key| map_entry(&parent, &map, key))
        .collect();
    Box::new(entries.into_iter().map(Ok))
}

/// Retains the values for which the predicate holds. Predicate errors
/// surface; candidates whose referenced fields are missing simply drop.
fn filter_stream<'a>(expr: &'a Expr, input: ValueStream<'a>, ctx: EvalContext<'a>) -> ValueStream<'a> {
    Box::new(input.filter_map(move |item| match item {
        Err(e) => Some(Err(e)),
        Ok(fv) => {
            let candidate = Rc::new(fv.clone());
            match predicate_matches(expr, ctx.clone(), &candidate) {
                Ok(true) => Some(Ok(fv)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        }
    }))
}

// ---------------------------------------------------------------------------
// expressions and predicates
// ---------------------------------------------------------------------------

/// Evaluates an expression to a stream of field values, with `current` as
/// the relative base.
pub(crate) fn eval_expr_stream<'a>(expr: &'a Expr, ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    match expr {
        Expr::Path(path) => eval_path(path, ctx, current),
        Expr::Literal(Literal::Long(n)) => once(FieldValue::standalone(Value::Long(*n), "")),
        Expr::Literal(Literal::String(s)) => once(FieldValue::standalone(Value::String(s.clone()), "")),
        Expr::Call(call) => functions::eval_call(call, ctx, current),
        Expr::Compare { .. } => match predicate_matches(expr, ctx, &current) {
            Ok(holds) => once(FieldValue::standalone(Value::Boolean(holds), "")),
            Err(e) => once_err(e),
        },
    }
}

/// Evaluates an expression and takes its first value, if any.
pub(crate) fn first_expr_value(
    expr: &Expr,
    ctx: EvalContext<'_>,
    current: &Rc<FieldValue>,
) -> PathResult<Option<FieldValue>> {
    eval_expr_stream(expr, ctx, Rc::clone(current)).next().transpose()
}

/// Decides whether a predicate holds for a candidate:
/// - a comparison holds if any left-hand value satisfies the operator
///   against the first right-hand value;
/// - a function call holds if its first result is boolean true;
/// - a path holds if it produces at least one non-null value (existence).
pub(crate) fn predicate_matches(expr: &Expr, ctx: EvalContext<'_>, candidate: &Rc<FieldValue>) -> PathResult<bool> {
    match expr {
        Expr::Compare { op, lhs, rhs } => {
            let Some(rhs_value) = first_expr_value(rhs, ctx.clone(), candidate)? else {
                return Ok(false);
            };
            let rhs_value = rhs_value.into_value();
            let mut lhs_stream = eval_expr_stream(lhs, ctx, Rc::clone(candidate));
            while let Some(item) = lhs_stream.next() {
                if compare_values(item?.value(), &rhs_value, *op) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Call(call) => {
            let mut stream = functions::eval_call(call, ctx, Rc::clone(candidate));
            match stream.next() {
                None => Ok(false),
                Some(Err(e)) => Err(e),
                Some(Ok(fv)) => Ok(matches!(fv.value(), Value::Boolean(true))),
            }
        }
        Expr::Path(path) => {
            let mut stream = eval_path(path, ctx, Rc::clone(candidate));
            while let Some(item) = stream.next() {
                if !item?.value().is_null() {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Literal(literal) => Ok(match literal {
            Literal::Long(_) => true,
            Literal::String(s) => !s.is_empty(),
        }),
    }
}

/// Compares two values under the coercion rules:
/// - two strings compare as strings (equality exact, ordering by code point);
/// - two booleans compare for equality only;
/// - otherwise both sides coerce to a common numeric type (double if either
///   side is floating, else long, falling back to double for fractional
///   strings);
/// - incomparable values yield false for every operator, `!=` included.
pub(crate) fn compare_values(a: &Value, b: &Value, op: CmpOp) -> bool {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
        };
    }
    if let (Value::Boolean(x), Value::Boolean(y)) = (a, b) {
        return match op {
            CmpOp::Eq => x == y,
            CmpOp::Ne => x != y,
            _ => false,
        };
    }

    let floating = matches!(a, Value::Double(_)) || matches!(b, Value::Double(_));
    if !floating {
        if let (Some(x), Some(y)) = (convert::to_long(a), convert::to_long(b)) {
            return compare_ordered(x, y, op);
        }
    }
    match (convert::to_double(a), convert::to_double(b)) {
        (Some(x), Some(y)) => compare_ordered_partial(x, y, op),
        _ => false,
    }
}

fn compare_ordered(x: i64, y: i64, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq => x == y,
        CmpOp::Ne => x != y,
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
    }
}

fn compare_ordered_partial(x: f64, y: f64, op: CmpOp) -> bool {
    match op {
        CmpOp::Eq => x == y,
        CmpOp::Ne => x != y,
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_uses_a_common_type() {
        assert!(compare_values(&Value::Long(10), &Value::String("9".to_owned()), CmpOp::Gt));
        assert!(compare_values(&Value::Double(1.5), &Value::Long(1), CmpOp::Gt));
        assert!(compare_values(&Value::Long(48), &Value::Long(48), CmpOp::Eq));
    }

    #[test]
    fn string_comparison_is_codepoint_lexicographic() {
        let a = Value::String("10".to_owned());
        let b = Value::String("9".to_owned());
        assert!(compare_values(&a, &b, CmpOp::Lt), "two strings compare as strings");
    }

    #[test]
    fn string_equality_is_exact() {
        let a = Value::String("1.0".to_owned());
        let b = Value::String("1".to_owned());
        assert!(!compare_values(&a, &b, CmpOp::Eq));
        assert!(compare_values(&a, &b, CmpOp::Ne));
    }

    #[test]
    fn incomparable_types_yield_false_for_every_operator() {
        let a = Value::String("abc".to_owned());
        let b = Value::Long(1);
        for op in [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge] {
            assert!(!compare_values(&a, &b, op), "'abc' vs 1 should be incomparable");
        }
        assert!(!compare_values(&Value::Null, &Value::Null, CmpOp::Eq));
    }

    #[test]
    fn fractional_strings_fall_back_to_double_comparison() {
        let a = Value::String("1.5".to_owned());
        let b = Value::Long(1);
        assert!(compare_values(&a, &b, CmpOp::Gt));
    }

    #[test]
    fn resolve_index_handles_negative_and_out_of_range() {
        assert_eq!(resolve_index(-1, 10), Some(9));
        assert_eq!(resolve_index(0, 10), Some(0));
        assert_eq!(resolve_index(10, 10), None);
        assert_eq!(resolve_index(-11, 10), None);
        assert_eq!(resolve_index(0, 0), None);
    }
}
