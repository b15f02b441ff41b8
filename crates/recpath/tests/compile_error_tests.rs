//! Compile-time error reporting: kinds and source positions.

use pretty_assertions::assert_eq;
use recpath::{PathErrorKind, RecordPath};

fn compile_error(source: &str) -> recpath::PathError {
    RecordPath::compile(source).expect_err("compilation should fail")
}

#[test]
fn lex_errors_cover_bad_characters_and_unterminated_literals() {
    assert_eq!(compile_error("/name & /id").kind(), PathErrorKind::Lex);
    assert_eq!(compile_error("/attrs['city").kind(), PathErrorKind::Lex);
    assert_eq!(compile_error("/a[! = 'x']").kind(), PathErrorKind::Lex);
}

#[test]
fn lex_errors_carry_the_offending_offset() {
    let err = compile_error("/name & /id");
    assert_eq!(err.position(), Some(6));
}

#[test]
fn parse_errors_cover_grammar_violations() {
    assert_eq!(compile_error("").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("/name[").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("/name]").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("substring(").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("//..").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("state").kind(), PathErrorKind::Parse);
    assert_eq!(compile_error("/numbers[1 2]").kind(), PathErrorKind::Parse);
}

#[test]
fn unknown_functions_are_parse_errors_with_position() {
    let err = compile_error("/name/frobnicate(.)");
    assert_eq!(err.kind(), PathErrorKind::Parse);
    assert_eq!(err.position(), Some(6));
    assert!(
        err.message().contains("frobnicate"),
        "message should name the function, got: {err}"
    );
}

#[test]
fn bare_non_filter_predicates_are_placement_errors() {
    // The canonical pair: the bare form fails, the comparison form compiles.
    let err = compile_error("/name[substring(., 1, 2)]");
    assert_eq!(err.kind(), PathErrorKind::PredicatePlacement);
    RecordPath::compile("/name[substring(., 1, 2) = 'e']").expect("comparison form should compile");

    assert_eq!(
        compile_error("/name[toUpperCase(.)]").kind(),
        PathErrorKind::PredicatePlacement
    );
    assert_eq!(compile_error("/name[concat(., 'x')]").kind(), PathErrorKind::PredicatePlacement);
}

#[test]
fn every_filter_function_is_accepted_as_a_bare_predicate() {
    for source in [
        "/name[contains(., 'x')]",
        "/name[startsWith(., 'x')]",
        "/name[endsWith(., 'x')]",
        "/name[containsRegex(., 'x')]",
        "/name[matchesRegex(., 'x')]",
        "/name[isEmpty(.)]",
        "/name[isBlank(.)]",
        "/name[not(isEmpty(.))]",
    ] {
        RecordPath::compile(source).unwrap_or_else(|e| panic!("{source} should compile: {e}"));
    }
}

#[test]
fn arity_violations_are_compile_errors() {
    assert_eq!(compile_error("substring(/name, 1)").kind(), PathErrorKind::Arity);
    assert_eq!(compile_error("substring(/name, 1, 2, 3)").kind(), PathErrorKind::Arity);
    assert_eq!(compile_error("trim()").kind(), PathErrorKind::Arity);
    assert_eq!(compile_error("padLeft(/a, 1, '_', 'x')").kind(), PathErrorKind::Arity);
}

#[test]
fn map_of_requires_key_value_pairs() {
    // Scenario: an odd argument count fails compilation outright.
    let err = compile_error("mapOf('a', /x, 'b')");
    assert_eq!(err.kind(), PathErrorKind::Arity);
    let err = compile_error("recordOf('a')");
    assert_eq!(err.kind(), PathErrorKind::Arity);
    RecordPath::compile("mapOf('a', /x, 'b', /y)").expect("paired arguments should compile");
}

#[test]
fn compiled_paths_remember_their_source() {
    let path = RecordPath::compile("/name").expect("path should compile");
    assert_eq!(path.source(), "/name");
}

#[test]
fn compiled_paths_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RecordPath>();
}
