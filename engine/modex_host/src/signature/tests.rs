#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn s(text: &str) -> Value {
    Value::string(text)
}

#[test]
fn test_parse_simple() {
    let sig = Signature::parse("<so?:o>").unwrap();
    assert_eq!(
        sig.params,
        vec![
            Param {
                ty: ParamType::String,
                optional: false,
                variadic: false,
                context: false,
            },
            Param {
                ty: ParamType::Object,
                optional: true,
                variadic: false,
                context: false,
            },
        ]
    );
    assert_eq!(sig.returns, Some(ParamType::Object));
}

#[test]
fn test_parse_union_and_subtypes() {
    let sig = Signature::parse("<(sn)a<s>f<n:n>:x>").unwrap();
    assert_eq!(
        sig.params.iter().map(|p| p.ty.to_string()).collect::<Vec<_>>(),
        vec!["(sn)", "a<s>", "f<n:n>"]
    );
}

#[test]
fn test_parse_without_return() {
    let sig = Signature::parse("<n+>").unwrap();
    assert!(sig.params[0].variadic);
    assert_eq!(sig.returns, None);
}

#[test]
fn test_malformed() {
    for text in ["", "so", "<q>", "<s", "<()>", "<s<n>>", "<s>x", "<f<>>"] {
        assert!(
            matches!(Signature::parse(text), Err(SignatureError::Malformed { .. })),
            "{text:?} should be malformed"
        );
    }
}

#[test]
fn test_optional_is_filled_with_undefined() {
    let sig = Signature::parse("<so?:o>").unwrap();
    assert_eq!(
        sig.validate(vec![s("m")], &Value::Null).unwrap(),
        vec![s("m"), Value::Undefined]
    );
}

#[test]
fn test_context_substitution() {
    let sig = Signature::parse("<s-:s>").unwrap();
    assert_eq!(sig.validate(vec![], &s("input")).unwrap(), vec![s("input")]);
    assert_eq!(
        sig.validate(vec![s("given")], &s("input")).unwrap(),
        vec![s("given")]
    );
}

#[test]
fn test_array_wrapping() {
    let sig = Signature::parse("<a<n>>").unwrap();
    assert_eq!(
        sig.validate(vec![Value::Number(1.0)], &Value::Null).unwrap(),
        vec![Value::array(vec![Value::Number(1.0)])]
    );
    assert!(sig.validate(vec![s("x")], &Value::Null).is_err());
}

#[test]
fn test_variadic_backtracks() {
    // `n+` must leave the last number for the trailing `n`.
    let sig = Signature::parse("<n+n>").unwrap();
    let args = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
    assert_eq!(sig.validate(args.clone(), &Value::Null).unwrap(), args);
    assert!(sig.validate(vec![Value::Number(1.0)], &Value::Null).is_err());
}

#[test]
fn test_mismatch_reports_argument() {
    let sig = Signature::parse("<sn>").unwrap();
    let err = sig
        .validate(vec![s("a"), s("b")], &Value::Null)
        .unwrap_err();
    assert_eq!(
        err,
        SignatureError::Mismatch {
            signature: "<sn>".into(),
            reason: "argument 2 is string, expected n".into(),
        }
    );
}

#[test]
fn test_too_many_arguments() {
    let sig = Signature::parse("<s>").unwrap();
    let err = sig.validate(vec![s("a"), s("b")], &Value::Null).unwrap_err();
    assert!(err.to_string().contains("at most 1"), "{err}");
}

#[test]
fn test_json_rejects_functions() {
    let sig = Signature::parse("<j>").unwrap();
    let function = Value::Function(crate::value::FunctionValue::Builtin(
        crate::value::Builtin::Sum,
    ));
    assert!(sig.validate(vec![function.clone()], &Value::Null).is_err());
    assert!(Signature::parse("<x>")
        .unwrap()
        .validate(vec![function], &Value::Null)
        .is_ok());
}

proptest! {
    #[test]
    fn prop_any_accepts_any_single_value(n in any::<i32>(), text in ".*", flag in any::<bool>()) {
        let sig = Signature::parse("<x>").unwrap();
        for value in [Value::Number(f64::from(n)), Value::string(&text), Value::Bool(flag), Value::Null] {
            prop_assert_eq!(sig.validate(vec![value.clone()], &Value::Null).unwrap(), vec![value]);
        }
    }

    #[test]
    fn prop_parse_never_panics(text in "[<>:()?+\\-bnslaofjx]{0,12}") {
        let _ = Signature::parse(&text);
    }
}
