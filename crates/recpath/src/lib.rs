#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "index narrowing is range-checked")]
#![expect(clippy::cast_sign_loss, reason = "negative indices are resolved before casting")]
#![expect(clippy::cast_possible_wrap, reason = "lengths fit comfortably in i64")]

mod charset;
pub mod convert;
mod error;
mod eval;
mod field_value;
mod functions;
mod lex;
mod parse;
mod record;
mod tree;

use std::rc::Rc;

pub use crate::{
    error::{PathError, PathErrorKind, PathResult},
    field_value::FieldValue,
    record::{ArrayRef, DataType, FieldDescriptor, MapRef, Record, RecordRef, Schema, SchemaRef, Value},
};

use crate::eval::{EvalContext, PathCaches, ValueStream};

/// A compiled record path.
///
/// Compiling is the expensive step: the source is lexed, parsed, and
/// validated once, and the resulting path is immutable. Compiled paths are
/// `Send + Sync` and meant to be compiled once and evaluated against many
/// records; per-path caches (compiled regexes) fill in lazily on first use.
#[derive(Debug)]
pub struct RecordPath {
    source: String,
    tree: tree::PathTree,
    caches: PathCaches,
}

impl RecordPath {
    /// Compiles a path source.
    ///
    /// Compile-time errors (lexing, grammar, unknown functions, argument
    /// counts, and non-filter functions in bare predicate position) carry
    /// the byte offset of the offending token.
    pub fn compile(source: &str) -> PathResult<Self> {
        let tree = parse::parse(source)?;
        Ok(Self {
            source: source.to_owned(),
            tree,
            caches: PathCaches::new(),
        })
    }

    /// The source this path was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the path against a record.
    pub fn evaluate(&self, root: &RecordRef) -> Evaluation<'_> {
        let root_value = Rc::new(FieldValue::root(root.clone()));
        self.start(Rc::clone(&root_value), root_value)
    }

    /// Evaluates the path with an explicit current value, for expressions
    /// embedded in a larger context: relative steps resolve from `context`
    /// while absolute steps still resolve from `root`.
    pub fn evaluate_with_context(&self, root: &RecordRef, context: FieldValue) -> Evaluation<'_> {
        let root_value = Rc::new(FieldValue::root(root.clone()));
        self.start(root_value, Rc::new(context))
    }

    fn start(&self, root: Rc<FieldValue>, current: Rc<FieldValue>) -> Evaluation<'_> {
        let ctx = EvalContext {
            root,
            caches: &self.caches,
        };
        Evaluation {
            stream: eval::eval_path(&self.tree, ctx, current),
        }
    }
}

/// The result of evaluating a path against one record.
pub struct Evaluation<'path> {
    stream: ValueStream<'path>,
}

impl<'path> Evaluation<'path> {
    /// The selected field values as a lazy iterator. Dropping the iterator
    /// cancels the rest of the evaluation; an error item ends the stream.
    pub fn selected_fields(self) -> SelectedFields<'path> {
        SelectedFields { stream: self.stream }
    }

    /// Convenience: collects every selected field value, stopping at the
    /// first error.
    pub fn collect_fields(self) -> PathResult<Vec<FieldValue>> {
        self.selected_fields().collect()
    }
}

/// Lazy iterator over the field values selected by an evaluation.
pub struct SelectedFields<'path> {
    stream: ValueStream<'path>,
}

impl Iterator for SelectedFields<'_> {
    type Item = PathResult<FieldValue>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next()
    }
}
