//! The compiled path tree.
//!
//! A path is a chain of [`Step`]s. Each step selects or transforms the
//! current field-value stream and carries zero or more bracket operations
//! (selectors and predicates) applied left to right. Expressions appear
//! inside predicates and function arguments.

use smallvec::SmallVec;

use crate::functions::Function;

/// A fully parsed path: a chain of steps, absolute or relative.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathTree {
    /// Absolute paths start from the root record; relative paths start from
    /// the current context value.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One step of a path, with its bracket operations.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub kind: StepKind,
    /// True when the step was introduced by `//`: the step matches across
    /// all descendants instead of direct children.
    pub descendant: bool,
    pub ops: SmallVec<[BracketOp; 2]>,
}

/// What a step selects.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StepKind {
    /// `.`: pass the current value through.
    SelfRef,
    /// `..`: move to the parent of the current value.
    Parent,
    /// A named child field of a record.
    Child(String),
    /// `*`: every field of a record, entry of a map, or element of an array.
    Wildcard,
    /// A function call evaluated against the current value.
    Call(FunctionCall),
}

/// A bracketed operation attached to a step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BracketOp {
    /// `[i]`, `[i,j,k]`, `[i..j]`, and mixtures: array element selection.
    Indices(SmallVec<[IndexEntry; 4]>),
    /// `['k1','k2']`: map entry selection by key.
    Keys(SmallVec<[String; 2]>),
    /// `[*]`: every element of an array or entry of a map.
    Wildcard,
    /// `[expr]`: retain values for which the predicate holds.
    Filter(Box<Expr>),
}

/// One entry of an index-selector list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum IndexEntry {
    /// A single index; negative counts from the end (`-1` is the last).
    At(i64),
    /// An inclusive range; either bound may be negative. A reversed range
    /// yields nothing.
    Range(i64, i64),
}

/// An expression: a predicate body or a function argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// A sub-path, relative to the candidate or absolute from the root.
    Path(PathTree),
    Literal(Literal),
    Call(FunctionCall),
    /// A single comparison between two sub-expressions.
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A literal value in an expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Long(i64),
    String(String),
}

/// A call to a library function with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionCall {
    pub function: Function,
    pub args: Vec<Expr>,
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
