#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;

#[test]
fn test_from_json_preserves_key_order() {
    let value = Value::from(json!({ "b": 1, "a": [true, null, "x"] }));
    let object = value.as_object().unwrap();
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(
        object.get("a"),
        Some(&Value::array(vec![
            Value::Bool(true),
            Value::Null,
            Value::string("x")
        ]))
    );
}

#[test]
fn test_to_json_drops_undefined_fields() {
    let mut object = Object::new();
    object.insert("kept", Value::Number(1.0));
    object.insert("dropped", Value::Undefined);
    assert_eq!(Value::object(object).to_json(), json!({ "kept": 1.0 }));
}

#[test]
fn test_insert_replaces_in_place() {
    let mut object = Object::new();
    object.insert("a", Value::Number(1.0));
    object.insert("b", Value::Number(2.0));
    object.insert("a", Value::Number(3.0));
    let entries: Vec<_> = object.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect();
    assert_eq!(
        entries,
        vec![
            ("a".to_owned(), Value::Number(3.0)),
            ("b".to_owned(), Value::Number(2.0))
        ]
    );
}

#[test]
fn test_truthiness() {
    assert!(!Value::Undefined.is_truthy());
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Number(0.0).is_truthy());
    assert!(!Value::string("").is_truthy());
    assert!(!Value::array(vec![Value::Bool(false)]).is_truthy());
    assert!(Value::array(vec![Value::Bool(false), Value::Number(1.0)]).is_truthy());
    assert!(Value::string("a").is_truthy());
    assert!(!Value::object(Object::new()).is_truthy());
}

#[test]
fn test_display() {
    assert_eq!(Value::string("ab").to_string(), "ab");
    assert_eq!(Value::Number(3.0).to_string(), "3");
    assert_eq!(Value::Number(1.5).to_string(), "1.5");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Undefined.to_string(), "");
}

#[test]
fn test_function_equality_is_identity() {
    let a = Value::Function(FunctionValue::Builtin(Builtin::Map));
    let b = Value::Function(FunctionValue::Builtin(Builtin::Map));
    let c = Value::Function(FunctionValue::Builtin(Builtin::Sum));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_builtin_names_round_trip() {
    for builtin in [
        Builtin::String,
        Builtin::Length,
        Builtin::Uppercase,
        Builtin::Lowercase,
        Builtin::Count,
        Builtin::Sum,
        Builtin::Keys,
        Builtin::Exists,
        Builtin::Map,
    ] {
        assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
    }
    assert_eq!(Builtin::from_name("evaluate"), None);
}
