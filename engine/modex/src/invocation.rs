//! Invocation-context capture.
//!
//! `ContextCapturingFn` wraps a handler and reports which entry point of
//! `HostFunction` the host evaluator reached it through. Calls written in
//! expression text arrive via `apply`, calls made by higher-order builtins
//! via `call`; only the evaluator's own lifecycle dispatch and the hosting
//! program use `invoke`. The handler cannot be replaced after construction.

use std::fmt;

use modex_host::{EvalResult, Focus, HostFunction, Value};

/// Path a wrapped function was invoked through.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InvocationContext {
    /// `HostFunction::apply`, reachable from expression text.
    OwnApplyProperty,
    /// `HostFunction::call`, reachable from expression text via builtins.
    OwnCallProperty,
    /// Any other path, i.e. `HostFunction::invoke`.
    Unknown,
}

impl InvocationContext {
    /// Whether an expression could have produced this invocation.
    pub fn is_expression_reachable(self) -> bool {
        matches!(
            self,
            InvocationContext::OwnApplyProperty | InvocationContext::OwnCallProperty
        )
    }
}

impl fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvocationContext::OwnApplyProperty => "apply",
            InvocationContext::OwnCallProperty => "call",
            InvocationContext::Unknown => "direct invocation",
        })
    }
}

/// A host function that passes its `InvocationContext` to the handler.
pub struct ContextCapturingFn<F> {
    name: String,
    handler: F,
}

/// Wrap `handler` so it learns how it was invoked.
pub fn with_invocation_context<F>(name: impl Into<String>, handler: F) -> ContextCapturingFn<F>
where
    F: Fn(InvocationContext, &Focus<'_>, Vec<Value>) -> EvalResult + Send + Sync,
{
    ContextCapturingFn {
        name: name.into(),
        handler,
    }
}

impl<F> HostFunction for ContextCapturingFn<F>
where
    F: Fn(InvocationContext, &Focus<'_>, Vec<Value>) -> EvalResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        (self.handler)(InvocationContext::OwnApplyProperty, focus, args)
    }

    fn call(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        (self.handler)(InvocationContext::OwnCallProperty, focus, args)
    }

    fn invoke(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        (self.handler)(InvocationContext::Unknown, focus, args)
    }
}

impl<F> fmt::Debug for ContextCapturingFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCapturingFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
