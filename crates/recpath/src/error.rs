//! Error kinds and the error type returned by compilation and evaluation.
//!
//! Compile-time errors (lexing, parsing, predicate placement, arity) carry the
//! byte offset of the offending token in the path source. Evaluation errors
//! carry no position. The engine never logs; errors are returned to the host.

use std::fmt::{self, Display};

use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a [`PathError`].
pub type PathResult<T> = Result<T, PathError>;

/// The category of a path error.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. All variants serialize in kebab-case (e.g., `PredicatePlacement`
/// -> "predicate-placement").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum PathErrorKind {
    /// Unknown character or unterminated literal while tokenizing.
    Lex,
    /// Grammar violation while parsing.
    Parse,
    /// A non-filter function used as a bare predicate body.
    PredicatePlacement,
    /// Wrong number of arguments to a function.
    Arity,
    /// An argument was not convertible to the type a function requires.
    Type,
    /// Unknown charset name passed to `toString` or `toBytes`.
    Charset,
    /// Invalid JSON passed to `unescapeJson`, or a regex pattern that failed
    /// to compile.
    ParseFailed,
    /// Unknown digest name passed to `hash`.
    Algorithm,
    /// `update_value` called on a field value with no backing slot.
    NoWriteback,
}

/// An error from compiling or evaluating a record path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    kind: PathErrorKind,
    message: String,
    /// Byte offset into the path source, present for compile-time errors.
    position: Option<usize>,
}

impl PathError {
    /// Creates a compile-time error anchored at a byte offset in the source.
    pub(crate) fn compile(kind: PathErrorKind, position: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: Some(position),
        }
    }

    /// Creates an evaluation-time error with no source position.
    pub(crate) fn eval(kind: PathErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> PathErrorKind {
        self.kind
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the path source where the error was detected.
    ///
    /// Present for compile-time errors, absent for evaluation errors.
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} error at offset {}: {}", self.kind, pos, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for PathError {}
