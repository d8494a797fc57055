#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end tests for the module system: registry, binder, hook dispatch
//! and sandbox through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use modex::{
    define_module, BindOptions, ExpressionOptions, HookName, InvocationContext, ModuleError,
    ModuleRegistry, RegistryOptions, RuntimeModule, SandboxOptions,
};
use modex_host::{EvalResult, Focus, FunctionValue, Value, EVALUATE_ENTRY};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn upper(_focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
    let s = args.first().and_then(Value::as_str).unwrap_or_default();
    Ok(Value::string(s.to_uppercase()))
}

fn constant(value: &'static str) -> impl Fn(&Focus<'_>, Vec<Value>) -> EvalResult {
    move |_focus: &Focus<'_>, _args: Vec<Value>| Ok(Value::from(value))
}

fn registry_with_strings() -> ModuleRegistry {
    let registry = ModuleRegistry::new().unwrap();
    registry
        .add_module(&define_module("strings").export("upper", "<s:s>", upper).build())
        .unwrap();
    registry
}

/// Module tapping `eval:entry` with a counter.
fn counting_module(id: &str) -> (Arc<AtomicUsize>, modex::ModuleDefinition) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let definition = define_module(id)
        .tap_hook(HookName::EvalEntry, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();
    (count, definition)
}

fn assert_privileged(result: Result<Value, ModuleError>, expected: HookName) {
    match result {
        Err(ModuleError::PrivilegedCallViolation { hook, .. }) => assert_eq!(hook, expected),
        other => panic!("expected PrivilegedCallViolation, got {other:?}"),
    }
}

fn assert_integrity(result: Result<Value, ModuleError>) {
    match result {
        Err(ModuleError::EnvironmentIntegrityViolation { reason, .. }) => {
            assert!(reason.contains(EVALUATE_ENTRY), "{reason}");
        }
        other => panic!("expected EnvironmentIntegrityViolation, got {other:?}"),
    }
}

#[test]
fn strings_module_upper_cases() {
    let registry = registry_with_strings();
    let expression = registry
        .expression("$r('strings'); $strings_upper(\"ab\")")
        .unwrap();
    assert_eq!(expression.exec(&Value::from("ignored")).unwrap(), Value::from("AB"));
}

#[test]
fn wrap_is_independent_of_definition() {
    let definition = define_module("m").export("f", "<n:n>", upper).build();
    let module = RuntimeModule::wrap(&definition).unwrap();
    assert_eq!(module.definition(), &definition);
    assert!(!Arc::ptr_eq(module.definition().exports(), definition.exports()));
    assert!(!Arc::ptr_eq(module.definition().hooks(), definition.hooks()));
}

#[test]
fn malformed_ids_leave_registry_unchanged() {
    let registry = registry_with_strings();
    let before = registry.modules();
    for id in ["", "a b", "a.b"] {
        match registry.add_module(&define_module(id).build()) {
            Err(ModuleError::InvalidModuleDefinition { module_id, .. }) => assert_eq!(module_id, id),
            other => panic!("{id:?}: expected InvalidModuleDefinition, got {other:?}"),
        }
        assert!(Arc::ptr_eq(&before, &registry.modules()));
    }
}

#[test]
fn same_export_name_in_two_modules_does_not_collide() {
    let registry = ModuleRegistry::new().unwrap();
    registry
        .add_module(&define_module("m1").export_unsafe("f", constant("one")).build())
        .unwrap()
        .add_module(&define_module("m2").export_unsafe("f", constant("two")).build())
        .unwrap();
    let expression = registry
        .expression("$r('m1'); $r('m2'); [$m1_f(), $m2_f()]")
        .unwrap();
    assert_eq!(
        expression.exec(&Value::Null).unwrap(),
        Value::array(vec![Value::from("one"), Value::from("two")])
    );
    let names = expression.environment().local_names();
    assert!(names.contains(&"m1_f".to_owned()));
    assert!(names.contains(&"m2_f".to_owned()));
}

#[test]
fn alias_overrides_prefix() {
    let registry = registry_with_strings();
    let expression = registry.expression("$s_upper('ab')").unwrap();
    expression
        .inject_module("strings", &BindOptions::alias("s"))
        .unwrap();
    assert_eq!(expression.exec(&Value::Null).unwrap(), Value::from("AB"));
}

#[test]
fn missing_module_aborts_evaluation() {
    let registry = registry_with_strings();
    match registry.expression("$r('missing'); 1").unwrap().exec(&Value::Null) {
        Err(ModuleError::ModuleNotFound { module_id }) => assert_eq!(module_id, "missing"),
        other => panic!("expected ModuleNotFound, got {other:?}"),
    }
}

#[test]
fn entry_hook_runs_once_per_sub_expression() {
    let registry = ModuleRegistry::new().unwrap();
    let (count, definition) = counting_module("counter");
    registry.add_module(&definition).unwrap();

    // Binary, Binary, Number, Number, Number.
    registry
        .expression("1 + 2 * 3")
        .unwrap()
        .exec(&Value::Null)
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 5);
}

#[test]
fn removed_module_does_not_affect_new_expressions() {
    let registry = ModuleRegistry::new().unwrap();
    let (count, definition) = counting_module("counter");
    registry.add_module(&definition).unwrap();
    let bound_before = registry.expression("1").unwrap();

    registry.remove_module("counter").unwrap();
    registry.expression("1").unwrap().exec(&Value::Null).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    bound_before.exec(&Value::Null).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn later_modules_do_not_reach_bound_expressions() {
    let registry = ModuleRegistry::new().unwrap();
    let expression = registry.expression("$r('late')").unwrap();
    registry.add_module(&define_module("late").build()).unwrap();
    assert!(matches!(
        expression.exec(&Value::Null),
        Err(ModuleError::ModuleNotFound { .. })
    ));
}

#[test]
fn exit_handlers_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ModuleRegistry::new().unwrap();
    for id in ["m1", "m2"] {
        let sink = Arc::clone(&log);
        registry
            .add_module(
                &define_module(id)
                    .tap_hook(HookName::EvalExit, move |_, args| {
                        sink.lock().push((id, args.result.cloned()));
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();
    }
    registry.expression("1 + 2").unwrap().exec(&Value::Null).unwrap();
    assert_eq!(
        *log.lock(),
        vec![
            ("m1", Some(Value::from(1.0))),
            ("m2", Some(Value::from(1.0))),
            ("m1", Some(Value::from(2.0))),
            ("m2", Some(Value::from(2.0))),
            ("m1", Some(Value::from(3.0))),
            ("m2", Some(Value::from(3.0))),
        ]
    );
}

#[test]
fn hook_errors_abort_evaluation() {
    let registry = ModuleRegistry::new().unwrap();
    registry
        .add_module(
            &define_module("limit")
                .tap_hook(HookName::EvalEntry, |_, args| match args.expr {
                    Some(expr) if expr.type_name() == "string" => {
                        Err(modex_host::EvalError::new("strings are not allowed"))
                    }
                    _ => Ok(()),
                })
                .build(),
        )
        .unwrap();
    match registry.expression("1 + 'a'").unwrap().exec(&Value::Null) {
        Err(ModuleError::Evaluation(err)) => assert_eq!(err.message, "strings are not allowed"),
        other => panic!("expected Evaluation, got {other:?}"),
    }
}

#[test]
fn expression_cannot_call_lifecycle_callbacks() {
    let registry = ModuleRegistry::new().unwrap();
    assert_privileged(
        registry.expression("$__evaluate_entry()").unwrap().exec(&Value::Null),
        HookName::EvalEntry,
    );
    assert_privileged(
        registry
            .expression("$map([1], $__evaluate_exit)")
            .unwrap()
            .exec(&Value::Null),
        HookName::EvalExit,
    );
    assert_privileged(
        registry
            .expression("$f := $__evaluate_entry; $f()")
            .unwrap()
            .exec(&Value::Null),
        HookName::EvalEntry,
    );
}

#[test]
fn host_can_invoke_lifecycle_callbacks() {
    let registry = ModuleRegistry::new().unwrap();
    let (count, definition) = counting_module("counter");
    registry.add_module(&definition).unwrap();
    let expression = registry.expression("1").unwrap();

    let Some(Value::Function(FunctionValue::Host(callback))) =
        expression.environment().lookup(EVALUATE_ENTRY)
    else {
        panic!("entry callback is bound");
    };
    let input = Value::Null;
    let focus = Focus::new(expression.environment(), &input);
    callback.invoke(&focus, Vec::new()).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn hook_context_reports_invocation() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let registry = ModuleRegistry::with_options(RegistryOptions::default().sandbox(
        SandboxOptions::default().allow_eval_hook_invocation_from_expression(true),
    ))
    .unwrap();
    registry
        .add_module(
            &define_module("observer")
                .tap_hook(HookName::EvalEntry, move |context, _| {
                    sink.lock().push(context.invocation());
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    // Call node, Variable node, then the explicit call.
    registry
        .expression("$__evaluate_entry()")
        .unwrap()
        .exec(&Value::Null)
        .unwrap();
    assert_eq!(
        *seen.lock(),
        vec![
            InvocationContext::Unknown,
            InvocationContext::Unknown,
            InvocationContext::OwnApplyProperty,
        ]
    );
}

#[test]
fn hook_bindings_cannot_be_rebound() {
    let registry = ModuleRegistry::new().unwrap();
    for source in [
        "$__evaluate_entry := 1",
        "($__evaluate_entry := 1)",
        "(1; ($__evaluate_entry := 1))",
        "$f := function($__evaluate_entry) { 1 }; $f(2)",
        "$map([1], function($__evaluate_entry) { 1 })",
    ] {
        assert_integrity(registry.expression(source).unwrap().exec(&Value::Null));
    }
}

#[test]
fn ordinary_bindings_still_work_in_hardened_frames() {
    let registry = ModuleRegistry::new().unwrap();
    let expression = registry
        .expression("$x := 2; $double := function($n) { $n * $x }; ($y := 5; $double($y))")
        .unwrap();
    assert_eq!(expression.exec(&Value::Null).unwrap(), Value::from(10.0));
}

#[test]
fn escape_hatch_allows_expression_invocation() {
    let registry = ModuleRegistry::with_options(RegistryOptions::default().sandbox(
        SandboxOptions::default().allow_eval_hook_invocation_from_expression(true),
    ))
    .unwrap();
    let (count, definition) = counting_module("counter");
    registry.add_module(&definition).unwrap();
    let result = registry
        .expression("$__evaluate_entry()")
        .unwrap()
        .exec(&Value::Null)
        .unwrap();
    assert_eq!(result, Value::Undefined);
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn escape_hatches_allow_rebinding() {
    for sandbox in [
        SandboxOptions::default().disable_eval_hook_integrity(true),
        SandboxOptions::default().disable_core_env_api_integrity(true),
    ] {
        let registry =
            ModuleRegistry::with_options(RegistryOptions::default().sandbox(sandbox)).unwrap();
        let result = registry
            .expression("($__evaluate_entry := 1; 2)")
            .unwrap()
            .exec(&Value::Null)
            .unwrap();
        assert_eq!(result, Value::from(2.0));
    }
}

#[test]
fn require_helper_can_be_renamed_or_disabled() {
    let registry = registry_with_strings();
    let renamed = registry
        .expression_with(
            "$include('strings'); $strings_upper('x')",
            &ExpressionOptions::default().require_helper("include"),
        )
        .unwrap();
    assert_eq!(renamed.exec(&Value::Null).unwrap(), Value::from("X"));

    let disabled = registry
        .expression_with("$r('strings')", &ExpressionOptions::default().disable_require_helper())
        .unwrap();
    assert!(matches!(disabled.exec(&Value::Null), Err(ModuleError::Evaluation(_))));
}

#[test]
fn options_load_from_json() {
    let options: RegistryOptions = serde_json::from_str(
        r#"{ "defaultExpressionOpts": { "requireHelper": false },
             "sandbox": { "disableEvalHookIntegrity": true } }"#,
    )
    .unwrap();
    assert!(options.sandbox.disable_eval_hook_integrity);
    let registry = ModuleRegistry::with_options(options).unwrap();
    assert_eq!(
        registry.expression("1").unwrap().options().resolved_require_helper(),
        None
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn entry_hook_count_matches_node_count(terms in prop::collection::vec(0u8..100, 1..12)) {
        let registry = ModuleRegistry::new().unwrap();
        let (count, definition) = counting_module("counter");
        registry.add_module(&definition).unwrap();

        let source = terms.iter().map(u8::to_string).collect::<Vec<_>>().join(" + ");
        let expected: f64 = terms.iter().map(|t| f64::from(*t)).sum();
        let result = registry.expression(&source).unwrap().exec(&Value::Null).unwrap();

        prop_assert_eq!(result, Value::from(expected));
        // One node per literal, one per operator.
        prop_assert_eq!(count.load(Ordering::SeqCst), terms.len() * 2 - 1);
    }
}

#[test]
fn dropping_a_bound_expression_frees_its_environment() {
    let registry = registry_with_strings();
    for source in [
        "$h := $rRet('strings'); $h.upper('a')",
        "$h := $rRet('strings')",
        "$f := function($x) { $r('strings'); $strings_upper($x) }",
        "$f := function($x) { $x }; 1",
    ] {
        let expression = registry.expression(source).unwrap();
        expression.exec(&Value::Null).unwrap();
        let environment = expression.environment().downgrade();
        drop(expression);
        assert!(environment.upgrade().is_none(), "{source}");
    }
}

#[test]
fn concurrent_first_evaluations_both_succeed() {
    let registry = registry_with_strings();
    for _ in 0..50 {
        let expression = registry.expression("$r('strings'); $strings_upper('ab')").unwrap();
        let barrier = std::sync::Barrier::new(2);
        std::thread::scope(|scope| {
            let runs: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        expression.exec(&Value::Null)
                    })
                })
                .collect();
            for run in runs {
                assert_eq!(run.join().unwrap().unwrap(), Value::from("AB"));
            }
        });
    }
}
