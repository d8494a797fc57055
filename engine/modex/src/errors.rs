//! Module system errors.
//!
//! `ModuleError` crosses the host evaluator's error channel in both
//! directions: a failure raised inside a native function or lifecycle callback
//! is wrapped as the `EvalError`'s foreign source, and converting the
//! `EvalError` back recovers the original typed error.

use modex_host::{EvalError, FrameId, ParseError};

use crate::hooks::HookName;
use crate::invocation::InvocationContext;

#[derive(Clone, Debug, thiserror::Error)]
pub enum ModuleError {
    /// The definition cannot be used: bad id, export name or signature.
    #[error("invalid module definition `{module_id}`: {reason}")]
    InvalidModuleDefinition { module_id: String, reason: String },

    /// An include or injection referenced an id no module in scope declares.
    #[error("the module with id `{module_id}` could not be found, was it added with `add_module`?")]
    ModuleNotFound { module_id: String },

    /// A lifecycle hook was invoked through an expression-reachable
    /// calling convention.
    #[error("`{hook}` cannot be invoked from inside an expression (invoked via {context})")]
    PrivilegedCallViolation {
        hook: HookName,
        context: InvocationContext,
    },

    /// The sandbox could not establish or verify its protections on a frame.
    #[error("integrity of {frame} could not be guaranteed: {reason}")]
    EnvironmentIntegrityViolation { frame: FrameId, reason: String },

    #[error("failed to compile expression: {0}")]
    Compile(#[from] ParseError),

    #[error(transparent)]
    Evaluation(EvalError),
}

impl ModuleError {
    pub(crate) fn invalid(module_id: &str, reason: impl Into<String>) -> Self {
        ModuleError::InvalidModuleDefinition {
            module_id: module_id.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(module_id: &str) -> Self {
        ModuleError::ModuleNotFound {
            module_id: module_id.to_owned(),
        }
    }
}

impl From<ModuleError> for EvalError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Evaluation(inner) => inner,
            other => EvalError::native(other),
        }
    }
}

impl From<EvalError> for ModuleError {
    fn from(err: EvalError) -> Self {
        match err.downcast_source::<ModuleError>() {
            Some(typed) => typed.clone(),
            None => ModuleError::Evaluation(err),
        }
    }
}

#[cfg(test)]
mod tests;
