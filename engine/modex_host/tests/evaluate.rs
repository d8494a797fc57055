#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests for compiled expressions: compile, register, assign and
//! evaluate through the public API only.

use std::sync::Arc;

use modex_host::{
    EvalErrorKind, Expression, Focus, FrameId, NativeFn, Value, EVALUATE_ENTRY,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn upper() -> NativeFn {
    Arc::new(|_focus: &Focus<'_>, args: Vec<Value>| {
        Ok(Value::string(args[0].as_str().unwrap_or_default().to_uppercase()))
    })
}

#[test]
fn registered_function_is_called_by_name() {
    let expr = Expression::compile("$up('ab') & $up(name)").unwrap();
    expr.register_function("up", upper(), Some("<s-:s>")).unwrap();
    let input = Value::from(json!({ "name": "cd" }));
    assert_eq!(expr.evaluate(&input, None).unwrap(), Value::string("ABCD"));
}

#[test]
fn signature_fills_context_argument() {
    let expr = Expression::compile("$up()").unwrap();
    expr.register_function("up", upper(), Some("<s-:s>")).unwrap();
    assert_eq!(
        expr.evaluate(&Value::string("ctx"), None).unwrap(),
        Value::string("CTX")
    );
}

#[test]
fn signature_mismatch_is_reported() {
    let expr = Expression::compile("$up(1)").unwrap();
    expr.register_function("up", upper(), Some("<s:s>")).unwrap();
    let err = expr.evaluate(&Value::Null, None).unwrap_err();
    assert!(
        matches!(&err.kind, EvalErrorKind::ArgumentMismatch { function, .. } if function == "up"),
        "{err}"
    );
}

#[test]
fn malformed_signature_is_rejected_at_registration() {
    let expr = Expression::compile("1").unwrap();
    assert!(expr.register_function("up", upper(), Some("<s")).is_err());
}

#[test]
fn assign_is_visible_to_evaluation() {
    let expr = Expression::compile("$greeting & ', ' & $$").unwrap();
    expr.assign("greeting", Value::string("hello"));
    assert_eq!(
        expr.evaluate(&Value::string("world"), None).unwrap(),
        Value::string("hello, world")
    );
}

#[test]
fn bindings_run_in_a_child_frame() {
    let frames = Arc::new(parking_lot::Mutex::new(Vec::<FrameId>::new()));
    let seen = Arc::clone(&frames);
    let expr = Expression::compile("$x").unwrap();
    expr.register_function(
        EVALUATE_ENTRY,
        Arc::new(move |focus: &Focus<'_>, _args: Vec<Value>| {
            seen.lock().push(focus.environment.id());
            Ok(Value::Undefined)
        }),
        None,
    )
    .unwrap();

    let bindings = [("x".to_owned(), Value::Number(1.0))];
    assert_eq!(
        expr.evaluate(&Value::Null, Some(&bindings)).unwrap(),
        Value::Number(1.0)
    );
    let root = expr.environment().id();
    assert!(frames.lock().iter().all(|id| *id != root));
    assert_eq!(expr.environment().lookup("x"), None);
}

#[test]
fn parse_error_carries_span() {
    let err = Expression::compile("$a := ").unwrap_err();
    assert_eq!(err.span.range(), 6..6);
}

#[test]
fn dropping_an_expression_frees_its_environment() {
    for source in [
        "$f := function($x) { $x }; 1",
        "$f := function($x) { $x }",
        "$f := function($x) { $g := function() { $x }; $g() }; $f(2)",
    ] {
        let expr = Expression::compile(source).unwrap();
        expr.evaluate(&Value::Undefined, None).unwrap();
        let environment = expr.environment().downgrade();
        drop(expr);
        assert!(environment.upgrade().is_none(), "{source}");
    }
}
