//! Native functions and the calling conventions the evaluator uses for them.
//!
//! A `HostFunction` has three entry points:
//!
//! - `apply`: every call written in expression text goes through it.
//! - `call`: used by higher-order builtins (`$map`) when they call a function
//!   value on behalf of an expression.
//! - `invoke`: plain invocation. The evaluator only uses it for the lifecycle
//!   callbacks; the hosting program may call it directly.
//!
//! The first two are reachable from expression text, the third is not. Most
//! functions do not care and only implement `apply`.

use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;
use crate::errors::{argument_mismatch, EvalResult};
use crate::frame::Frame;
use crate::signature::{Signature, SignatureError};
use crate::value::Value;

/// Execution context handed to every native call.
#[derive(Clone, Copy)]
pub struct Focus<'a> {
    /// Frame the call is evaluated in.
    pub environment: &'a Frame,
    /// The current input (`$`).
    pub input: &'a Value,
    /// Node being evaluated, set for lifecycle callbacks.
    pub expr: Option<&'a Expr>,
}

impl<'a> Focus<'a> {
    pub fn new(environment: &'a Frame, input: &'a Value) -> Self {
        Focus {
            environment,
            input,
            expr: None,
        }
    }

    #[must_use]
    pub fn with_expr(mut self, expr: &'a Expr) -> Self {
        self.expr = Some(expr);
        self
    }
}

impl fmt::Debug for Focus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Focus")
            .field("environment", &self.environment.id())
            .field("input", self.input)
            .field("expr", &self.expr.map(Expr::type_name))
            .finish()
    }
}

pub trait HostFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Call from expression text.
    fn apply(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult;

    /// Call from a higher-order builtin.
    fn call(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        self.apply(focus, args)
    }

    /// Plain invocation, not reachable from expression text.
    fn invoke(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        self.apply(focus, args)
    }
}

/// Shared native implementation.
pub type NativeFn = Arc<dyn Fn(&Focus<'_>, Vec<Value>) -> EvalResult + Send + Sync>;

/// A registered native function, optionally guarded by a signature.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    implementation: NativeFn,
    signature: Option<Arc<Signature>>,
}

impl NativeFunction {
    /// Create a function whose arguments are checked against `signature`
    /// before every call.
    pub fn new(
        name: impl Into<String>,
        implementation: NativeFn,
        signature: Option<&str>,
    ) -> Result<Self, SignatureError> {
        let signature = signature.map(Signature::parse).transpose()?.map(Arc::new);
        Ok(NativeFunction {
            name: name.into(),
            implementation,
            signature,
        })
    }

    /// Create a function with unchecked arguments.
    pub fn unchecked(name: impl Into<String>, implementation: NativeFn) -> Self {
        NativeFunction {
            name: name.into(),
            implementation,
            signature: None,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_deref()
    }
}

impl HostFunction for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        let args = match &self.signature {
            Some(signature) => signature
                .validate(args, focus.input)
                .map_err(|err| argument_mismatch(&self.name, err.to_string()))?,
            None => args,
        };
        (self.implementation)(focus, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("signature", &self.signature.as_ref().map(|s| s.source()))
            .finish_non_exhaustive()
    }
}
