#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use super::*;

fn root_kind(source: &str) -> (Parsed, ExprKind) {
    let parsed = parse(source).unwrap();
    let kind = parsed.arena.get(parsed.root).kind.clone();
    (parsed, kind)
}

#[test]
fn test_precedence_mul_over_add() {
    let (parsed, kind) = root_kind("1 + 2 * 3");
    let ExprKind::Binary { op, right, .. } = kind else {
        panic!("expected binary, got {kind:?}");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(
        parsed.arena.get(right).kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn test_concat_binds_looser_than_add() {
    let (_, kind) = root_kind("1 + 2 & 'x'");
    assert!(matches!(
        kind,
        ExprKind::Binary {
            op: BinaryOp::Concat,
            ..
        }
    ));
}

#[test]
fn test_bind_is_right_associative() {
    let (parsed, kind) = root_kind("$a := $b := 1");
    let ExprKind::Bind { name, value } = kind else {
        panic!("expected bind, got {kind:?}");
    };
    assert_eq!(name, "a");
    assert!(matches!(&parsed.arena.get(value).kind, ExprKind::Bind { name, .. } if name == "b"));
}

#[test]
fn test_top_level_sequence_is_a_block() {
    let (_, kind) = root_kind("$r('strings'); $strings_upper('ab')");
    let ExprKind::Block(items) = kind else {
        panic!("expected block, got {kind:?}");
    };
    assert_eq!(items.len(), 2);
}

#[test]
fn test_trailing_semicolon() {
    let (_, kind) = root_kind("1; 2;");
    assert!(matches!(kind, ExprKind::Block(items) if items.len() == 2));
}

#[test]
fn test_postfix_chain() {
    let (parsed, kind) = root_kind("$f(1).name[0]");
    let ExprKind::Index { target, .. } = kind else {
        panic!("expected index, got {kind:?}");
    };
    let ExprKind::Path { target, field } = &parsed.arena.get(target).kind else {
        panic!("expected path");
    };
    assert_eq!(field, "name");
    assert!(matches!(parsed.arena.get(*target).kind, ExprKind::Call { .. }));
}

#[test]
fn test_lambda() {
    let (_, kind) = root_kind("function($a, $b) { $a + $b }");
    assert!(matches!(kind, ExprKind::Lambda { params, .. } if params == ["a", "b"]));
}

#[test]
fn test_object_and_array() {
    let (_, kind) = root_kind(r#"{ "a": [1, 2], b: null }"#);
    let ExprKind::Object(entries) = kind else {
        panic!("expected object, got {kind:?}");
    };
    let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn test_condition_without_else() {
    let (_, kind) = root_kind("$x ? 1");
    assert!(matches!(kind, ExprKind::Condition { otherwise: None, .. }));
}

#[test]
fn test_spans_cover_operands() {
    let parsed = parse("1 + 22").unwrap();
    assert_eq!(parsed.arena.get(parsed.root).span, Span::new(0, 6));
}

#[test]
fn test_unclosed_paren() {
    let err = parse("(1; 2").unwrap_err();
    assert!(err.message.contains("expected `)`"), "{}", err.message);
}

#[test]
fn test_trailing_garbage() {
    let err = parse("1 2").unwrap_err();
    assert_eq!(err.span, Span::new(2, 3));
}

#[test]
fn test_error_report_renders() {
    let source = "1 + )";
    let err = parse(source).unwrap_err();
    let report = err.render(source);
    assert!(report.contains("expected an expression"), "{report}");
}
