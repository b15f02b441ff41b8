//! Recursive-descent parser: token stream to path tree.
//!
//! The parser also performs the compile-time validations: function names must
//! exist, argument counts must match the registry's arity metadata, and a
//! bare function call used as a predicate body must be a filter function.

use std::str::FromStr;

use smallvec::SmallVec;

use crate::{
    error::{PathError, PathErrorKind, PathResult},
    functions::Function,
    lex::{Token, TokenKind, tokenize},
    tree::{BracketOp, CmpOp, Expr, FunctionCall, IndexEntry, Literal, PathTree, Step, StepKind},
};

/// Parses a full path source.
pub(crate) fn parse(source: &str) -> PathResult<PathTree> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    let tree = parser.parse_path()?;
    if let Some(token) = parser.peek() {
        return Err(PathError::compile(
            PathErrorKind::Parse,
            token.start,
            format!("unexpected {} after the end of the path", token.kind.describe()),
        ));
    }
    Ok(tree)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    /// The position for an error at the current token, or end-of-source.
    fn here(&self) -> usize {
        self.peek().map_or(self.source_len, |t| t.start)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &TokenKind, context: &str) -> PathResult<Token> {
        match self.advance() {
            Some(token) if token.kind == *expected => Ok(token),
            Some(token) => Err(PathError::compile(
                PathErrorKind::Parse,
                token.start,
                format!("expected {} {context}, found {}", expected.describe(), token.kind.describe()),
            )),
            None => Err(PathError::compile(
                PathErrorKind::Parse,
                self.source_len,
                format!("expected {} {context}, found end of path", expected.describe()),
            )),
        }
    }

    /// Parses a path: absolute (`/…` or `//…`) or relative (starting with
    /// `.`, `..`, or a function call).
    fn parse_path(&mut self) -> PathResult<PathTree> {
        match self.peek_kind() {
            Some(TokenKind::Slash | TokenKind::DoubleSlash) => self.parse_absolute(),
            Some(TokenKind::Dot | TokenKind::DotDot) => self.parse_relative(),
            Some(TokenKind::Identifier(_)) => {
                // Only a function call can root a relative path; a bare name
                // is most likely a missing './' or '/'.
                let next_is_call = self
                    .tokens
                    .get(self.pos + 1)
                    .is_some_and(|t| t.kind == TokenKind::LeftParen);
                if next_is_call {
                    self.parse_relative()
                } else {
                    Err(PathError::compile(
                        PathErrorKind::Parse,
                        self.here(),
                        "a bare name is not a path; relative field references start with './'",
                    ))
                }
            }
            Some(_) => Err(PathError::compile(
                PathErrorKind::Parse,
                self.here(),
                "a path must start with '/', '//', '.', '..', or a function call",
            )),
            None => Err(PathError::compile(
                PathErrorKind::Parse,
                self.source_len,
                "empty path",
            )),
        }
    }

    fn parse_absolute(&mut self) -> PathResult<PathTree> {
        let Some(first_sep) = self.advance() else {
            return Err(PathError::compile(PathErrorKind::Parse, self.source_len, "empty path"));
        };
        let descendant = first_sep.kind == TokenKind::DoubleSlash;

        // A lone '/' selects the root itself.
        if self.peek().is_none() {
            if descendant {
                return Err(PathError::compile(
                    PathErrorKind::Parse,
                    self.source_len,
                    "expected a field name or '*' after '//'",
                ));
            }
            return Ok(PathTree {
                absolute: true,
                steps: Vec::new(),
            });
        }

        let mut steps = vec![self.parse_step(descendant)?];
        self.parse_step_chain(&mut steps)?;
        Ok(PathTree { absolute: true, steps })
    }

    fn parse_relative(&mut self) -> PathResult<PathTree> {
        let mut steps = vec![self.parse_step(false)?];
        self.parse_step_chain(&mut steps)?;
        Ok(PathTree {
            absolute: false,
            steps,
        })
    }

    fn parse_step_chain(&mut self, steps: &mut Vec<Step>) -> PathResult<()> {
        while let Some(kind) = self.peek_kind() {
            let descendant = match kind {
                TokenKind::Slash => false,
                TokenKind::DoubleSlash => true,
                _ => break,
            };
            self.advance();
            steps.push(self.parse_step(descendant)?);
        }
        Ok(())
    }

    /// Parses one segment and its bracket operations.
    fn parse_step(&mut self, descendant: bool) -> PathResult<Step> {
        let Some(token) = self.advance() else {
            return Err(PathError::compile(
                PathErrorKind::Parse,
                self.source_len,
                "expected a segment, found end of path",
            ));
        };
        let kind = match token.kind {
            TokenKind::Dot => StepKind::SelfRef,
            TokenKind::DotDot => StepKind::Parent,
            TokenKind::Star => StepKind::Wildcard,
            TokenKind::Quoted(name) => StepKind::Child(name),
            TokenKind::Identifier(name) => {
                if self.peek_kind() == Some(&TokenKind::LeftParen) {
                    StepKind::Call(self.parse_call(name, token.start)?)
                } else {
                    StepKind::Child(name)
                }
            }
            other => {
                return Err(PathError::compile(
                    PathErrorKind::Parse,
                    token.start,
                    format!("expected a segment, found {}", other.describe()),
                ));
            }
        };

        if descendant && !matches!(kind, StepKind::Child(_) | StepKind::Wildcard) {
            return Err(PathError::compile(
                PathErrorKind::Parse,
                token.start,
                "'//' must be followed by a field name or '*'",
            ));
        }

        let mut ops = SmallVec::new();
        while self.peek_kind() == Some(&TokenKind::LeftBracket) {
            ops.push(self.parse_bracket()?);
        }
        Ok(Step { kind, descendant, ops })
    }

    /// Parses one `[...]` operation: `[*]`, an index list, a key list, or a
    /// filter expression. A leading number or string only commits to a
    /// selector once the following token rules out a comparison.
    fn parse_bracket(&mut self) -> PathResult<BracketOp> {
        self.expect(&TokenKind::LeftBracket, "to open a selector")?;
        let body_start = self.pos;

        let op = match self.peek_kind() {
            Some(TokenKind::Star) => {
                self.advance();
                BracketOp::Wildcard
            }
            Some(TokenKind::Number(_)) => {
                self.advance();
                match self.peek_kind() {
                    Some(TokenKind::DotDot | TokenKind::Comma | TokenKind::RightBracket) => {
                        self.pos = body_start;
                        self.parse_index_entries()?
                    }
                    _ => {
                        self.pos = body_start;
                        self.parse_filter()?
                    }
                }
            }
            Some(TokenKind::Quoted(_)) => {
                self.advance();
                match self.peek_kind() {
                    Some(TokenKind::Comma | TokenKind::RightBracket) => {
                        self.pos = body_start;
                        self.parse_key_list()?
                    }
                    _ => {
                        self.pos = body_start;
                        self.parse_filter()?
                    }
                }
            }
            _ => self.parse_filter()?,
        };

        self.expect(&TokenKind::RightBracket, "to close the selector")?;
        Ok(op)
    }

    /// Parses `i`, `i..j`, and comma-separated mixtures of both.
    fn parse_index_entries(&mut self) -> PathResult<BracketOp> {
        let mut entries = SmallVec::new();
        loop {
            let start = self.expect_number("in an index selector")?;
            if self.peek_kind() == Some(&TokenKind::DotDot) {
                self.advance();
                let end = self.expect_number("after '..' in a range selector")?;
                entries.push(IndexEntry::Range(start, end));
            } else {
                entries.push(IndexEntry::At(start));
            }
            if self.peek_kind() == Some(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(BracketOp::Indices(entries))
    }

    fn expect_number(&mut self, context: &str) -> PathResult<i64> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Number(n),
                ..
            }) => {
                let n = *n;
                self.advance();
                Ok(n)
            }
            Some(token) => Err(PathError::compile(
                PathErrorKind::Parse,
                token.start,
                format!("expected a number {context}, found {}", token.kind.describe()),
            )),
            None => Err(PathError::compile(
                PathErrorKind::Parse,
                self.source_len,
                format!("expected a number {context}, found end of path"),
            )),
        }
    }

    /// Parses `'k1', 'k2', …` as a map key selector.
    fn parse_key_list(&mut self) -> PathResult<BracketOp> {
        let mut keys = SmallVec::new();
        loop {
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Quoted(key),
                    ..
                }) => keys.push(key),
                Some(token) => {
                    return Err(PathError::compile(
                        PathErrorKind::Parse,
                        token.start,
                        format!("expected a quoted key, found {}", token.kind.describe()),
                    ));
                }
                None => {
                    return Err(PathError::compile(
                        PathErrorKind::Parse,
                        self.source_len,
                        "expected a quoted key, found end of path",
                    ));
                }
            }
            if self.peek_kind() == Some(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(BracketOp::Keys(keys))
    }

    /// Parses a filter expression and enforces the predicate-placement rule:
    /// a bare function call must be a filter function.
    fn parse_filter(&mut self) -> PathResult<BracketOp> {
        let expr_start = self.here();
        let expr = self.parse_expr()?;
        if let Expr::Call(call) = &expr {
            if !call.function.is_filter() {
                return Err(PathError::compile(
                    PathErrorKind::PredicatePlacement,
                    expr_start,
                    format!(
                        "{}() is not a filter function and cannot stand alone as a predicate; \
                         use it inside a comparison",
                        call.function
                    ),
                ));
            }
        }
        Ok(BracketOp::Filter(Box::new(expr)))
    }

    /// Parses an expression: a primary, optionally compared to another.
    fn parse_expr(&mut self) -> PathResult<Expr> {
        let lhs = self.parse_primary()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Equal) => CmpOp::Eq,
            Some(TokenKind::NotEqual) => CmpOp::Ne,
            Some(TokenKind::Less) => CmpOp::Lt,
            Some(TokenKind::LessEqual) => CmpOp::Le,
            Some(TokenKind::Greater) => CmpOp::Gt,
            Some(TokenKind::GreaterEqual) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_primary()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_primary(&mut self) -> PathResult<Expr> {
        match self.peek_kind() {
            Some(TokenKind::Slash | TokenKind::DoubleSlash | TokenKind::Dot | TokenKind::DotDot) => {
                Ok(Expr::Path(self.parse_path()?))
            }
            Some(TokenKind::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::Literal(Literal::Long(n)))
            }
            Some(TokenKind::Quoted(text)) => {
                let text = text.clone();
                self.advance();
                Ok(Expr::Literal(Literal::String(text)))
            }
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                let start = self.here();
                self.advance();
                if self.peek_kind() == Some(&TokenKind::LeftParen) {
                    Ok(Expr::Call(self.parse_call(name, start)?))
                } else {
                    Err(PathError::compile(
                        PathErrorKind::Parse,
                        start,
                        format!("'{name}' is not a function call; relative field references start with './'"),
                    ))
                }
            }
            Some(_) => Err(PathError::compile(
                PathErrorKind::Parse,
                self.here(),
                "expected a path, literal, or function call",
            )),
            None => Err(PathError::compile(
                PathErrorKind::Parse,
                self.source_len,
                "expected an expression, found end of path",
            )),
        }
    }

    /// Parses the parenthesized argument list of a function call and runs the
    /// compile-time arity checks.
    fn parse_call(&mut self, name: String, name_start: usize) -> PathResult<FunctionCall> {
        let function = Function::from_str(&name).map_err(|_| {
            PathError::compile(
                PathErrorKind::Parse,
                name_start,
                format!("unknown function '{name}'"),
            )
        })?;
        self.expect(&TokenKind::LeftParen, "to open the argument list")?;

        let mut args = Vec::new();
        if self.peek_kind() != Some(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.peek_kind() == Some(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "to close the argument list")?;

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => format!("{min}"),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(PathError::compile(
                PathErrorKind::Arity,
                name_start,
                format!("{function}() takes {expected} arguments, got {}", args.len()),
            ));
        }
        if function.requires_even_args() && args.len() % 2 != 0 {
            return Err(PathError::compile(
                PathErrorKind::Arity,
                name_start,
                format!("{function}() takes key/value pairs, got an odd count of {}", args.len()),
            ));
        }

        Ok(FunctionCall { function, args })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_a_child_chain() {
        let tree = parse("/mainAccount/balance").expect("path should parse");
        assert!(tree.absolute);
        assert_eq!(tree.steps.len(), 2);
        assert_eq!(tree.steps[0].kind, StepKind::Child("mainAccount".to_owned()));
        assert_eq!(tree.steps[1].kind, StepKind::Child("balance".to_owned()));
        assert!(!tree.steps[1].descendant);
    }

    #[test]
    fn a_lone_slash_selects_the_root() {
        let tree = parse("/").expect("root path should parse");
        assert!(tree.absolute);
        assert!(tree.steps.is_empty());
    }

    #[test]
    fn descendant_steps_carry_the_flag() {
        let tree = parse("//id").expect("descendant path should parse");
        assert_eq!(tree.steps[0].kind, StepKind::Child("id".to_owned()));
        assert!(tree.steps[0].descendant);
    }

    #[test]
    fn descendant_must_name_a_field_or_wildcard() {
        let err = parse("//..").expect_err("'//..' should not parse");
        assert_eq!(err.kind(), PathErrorKind::Parse);
    }

    #[test]
    fn quoted_names_parse_as_children() {
        let tree = parse("/'with space'/value").expect("quoted name should parse");
        assert_eq!(tree.steps[0].kind, StepKind::Child("with space".to_owned()));
    }

    #[test]
    fn index_list_mixes_indices_and_ranges() {
        let tree = parse("/numbers[0, 2..4, -1]").expect("index list should parse");
        let BracketOp::Indices(entries) = &tree.steps[0].ops[0] else {
            panic!("expected an index selector, got {:?}", tree.steps[0].ops[0]);
        };
        assert_eq!(
            entries.as_slice(),
            &[IndexEntry::At(0), IndexEntry::Range(2, 4), IndexEntry::At(-1)]
        );
    }

    #[test]
    fn key_list_parses_quoted_keys() {
        let tree = parse("/attrs['city','state']").expect("key list should parse");
        let BracketOp::Keys(keys) = &tree.steps[0].ops[0] else {
            panic!("expected a key selector");
        };
        assert_eq!(keys.as_slice(), &["city".to_owned(), "state".to_owned()]);
    }

    #[test]
    fn bracket_wildcard_parses() {
        let tree = parse("/attrs[*]").expect("wildcard selector should parse");
        assert_eq!(tree.steps[0].ops[0], BracketOp::Wildcard);
    }

    #[test]
    fn a_number_followed_by_a_comparison_is_a_filter() {
        let tree = parse("/numbers[0..2]").expect("range should parse");
        assert!(matches!(tree.steps[0].ops[0], BracketOp::Indices(_)));

        let tree = parse("/name[. = 'John']").expect("comparison predicate should parse");
        assert!(matches!(tree.steps[0].ops[0], BracketOp::Filter(_)));
    }

    #[test]
    fn filter_functions_may_stand_alone_as_predicates() {
        parse("/name[contains(., 'John')]").expect("filter function predicate should compile");
        parse("/name[not(isEmpty(.))]").expect("nested filter predicate should compile");
    }

    #[test]
    fn non_filter_function_as_bare_predicate_is_rejected() {
        let err = parse("/name[substring(., 1, 2)]").expect_err("substring is not a filter");
        assert_eq!(err.kind(), PathErrorKind::PredicatePlacement);
    }

    #[test]
    fn non_filter_function_inside_a_comparison_is_accepted() {
        parse("/name[substring(., 1, 2) = 'e']").expect("comparison form should compile");
    }

    #[test]
    fn unknown_function_names_are_parse_errors() {
        let err = parse("frobnicate(/name)").expect_err("unknown function should fail");
        assert_eq!(err.kind(), PathErrorKind::Parse);
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn wrong_argument_count_is_an_arity_error() {
        let err = parse("substring(/name, 1)").expect_err("substring takes 3 arguments");
        assert_eq!(err.kind(), PathErrorKind::Arity);
    }

    #[test]
    fn map_of_with_odd_arguments_is_an_arity_error() {
        let err = parse("mapOf('a', /x, 'b')").expect_err("mapOf needs pairs");
        assert_eq!(err.kind(), PathErrorKind::Arity);
    }

    #[test]
    fn relative_paths_start_with_dot_or_function() {
        parse("./state").expect("relative path should parse");
        parse("concat(/a, /b)").expect("function-rooted path should parse");
        let err = parse("state").expect_err("bare identifiers are not paths");
        assert_eq!(err.kind(), PathErrorKind::Parse);
    }

    #[test]
    fn trailing_tokens_are_rejected_with_position() {
        let err = parse("/name ]").expect_err("trailing token should fail");
        assert_eq!(err.kind(), PathErrorKind::Parse);
        assert_eq!(err.position(), Some(6));
    }

    #[test]
    fn predicates_chain_left_to_right() {
        let tree = parse("/numbers[*][. > 3]").expect("chained brackets should parse");
        assert_eq!(tree.steps[0].ops.len(), 2);
        assert_eq!(tree.steps[0].ops[0], BracketOp::Wildcard);
        assert!(matches!(tree.steps[0].ops[1], BracketOp::Filter(_)));
    }

    #[test]
    fn parent_segments_parse_in_chains() {
        let tree = parse("/mainAccount/../id").expect("parent step should parse");
        assert_eq!(tree.steps[1].kind, StepKind::Parent);
    }
}
