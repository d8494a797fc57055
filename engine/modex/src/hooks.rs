//! Lifecycle hooks modules can tap.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use modex_host::ast::Expr;
use modex_host::{EvalError, Focus, Frame, Value, EVALUATE_ENTRY, EVALUATE_EXIT};

use crate::invocation::InvocationContext;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HookName {
    /// `eval:entry`, before each sub-expression is evaluated.
    EvalEntry,
    /// `eval:exit`, after each sub-expression produced its value.
    EvalExit,
}

impl HookName {
    pub const ALL: [HookName; 2] = [HookName::EvalEntry, HookName::EvalExit];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::EvalEntry => "eval:entry",
            HookName::EvalExit => "eval:exit",
        }
    }

    /// Name the host evaluator looks the hook's callback up under.
    pub fn binding_name(self) -> &'static str {
        match self {
            HookName::EvalEntry => EVALUATE_ENTRY,
            HookName::EvalExit => EVALUATE_EXIT,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown hook `{0}`, expected `eval:entry` or `eval:exit`")]
pub struct UnknownHook(pub String);

impl FromStr for HookName {
    type Err = UnknownHook;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| UnknownHook(s.to_owned()))
    }
}

/// Capability handed to every hook handler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HookContext {
    invocation: InvocationContext,
}

impl HookContext {
    pub fn new(invocation: InvocationContext) -> Self {
        HookContext { invocation }
    }

    /// How the lifecycle callback that fired this hook was invoked.
    pub fn invocation(&self) -> InvocationContext {
        self.invocation
    }
}

/// Arguments the host evaluator passed to the lifecycle callback.
#[derive(Clone, Copy, Debug)]
pub struct EvalHookArgs<'a> {
    /// Node being evaluated. Absent when the hosting program invoked the
    /// callback itself.
    pub expr: Option<&'a Expr>,
    pub input: &'a Value,
    pub environment: &'a Frame,
    /// The node's value, for `eval:exit`.
    pub result: Option<&'a Value>,
}

impl<'a> EvalHookArgs<'a> {
    pub fn from_focus(focus: &Focus<'a>, result: Option<&'a Value>) -> Self {
        EvalHookArgs {
            expr: focus.expr,
            input: focus.input,
            environment: focus.environment,
            result,
        }
    }
}

/// A hook handler. Returning an error aborts the current evaluation step.
pub type HookHandler = Arc<dyn Fn(&HookContext, &EvalHookArgs<'_>) -> Result<(), EvalError> + Send + Sync>;
