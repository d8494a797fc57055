#![allow(clippy::unwrap_used, clippy::expect_used)]

use modex_host::{EvalErrorKind, Frame};

use super::*;

#[test]
fn test_module_error_round_trips_through_eval_error() {
    let original = ModuleError::not_found("missing");
    let eval: EvalError = original.into();
    assert!(eval.is_native());
    assert!(matches!(eval.kind, EvalErrorKind::Native { .. }));

    match ModuleError::from(eval) {
        ModuleError::ModuleNotFound { module_id } => assert_eq!(module_id, "missing"),
        other => panic!("expected ModuleNotFound, got {other:?}"),
    }
}

#[test]
fn test_plain_eval_error_stays_evaluation() {
    let err = ModuleError::from(EvalError::new("boom"));
    match err {
        ModuleError::Evaluation(inner) => assert_eq!(inner.message, "boom"),
        other => panic!("expected Evaluation, got {other:?}"),
    }
}

#[test]
fn test_evaluation_variant_unwraps() {
    let err: EvalError = ModuleError::Evaluation(EvalError::new("inner")).into();
    assert!(!err.is_native());
    assert_eq!(err.message, "inner");
}

#[test]
fn test_privileged_call_message() {
    let err = ModuleError::PrivilegedCallViolation {
        hook: HookName::EvalEntry,
        context: InvocationContext::OwnApplyProperty,
    };
    assert_eq!(
        err.to_string(),
        "`eval:entry` cannot be invoked from inside an expression (invoked via apply)"
    );
}

#[test]
fn test_integrity_violation_names_frame() {
    let frame = Frame::new();
    let err = ModuleError::EnvironmentIntegrityViolation {
        frame: frame.id(),
        reason: "nope".to_owned(),
    };
    assert!(err.to_string().contains(&frame.id().to_string()));
}

#[test]
fn test_invalid_definition_message() {
    let err = ModuleError::invalid("a b", "bad id");
    assert_eq!(err.to_string(), "invalid module definition `a b`: bad id");
}
