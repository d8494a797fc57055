//! Module definitions and the builder that produces them.
//!
//! The builder is a value: every step consumes it and returns the next one,
//! so a partially configured builder can be cloned and extended in two
//! directions without either affecting the other. `build` can be called any
//! number of times; each call copies the current state into a fresh
//! `ModuleDefinition`.
//!
//! Nothing is validated here. A malformed definition can still be built and
//! inspected; it is rejected when added to a registry.

use std::fmt;
use std::sync::Arc;

use modex_host::{EvalError, EvalResult, Focus, NativeFn, Value};

use crate::hooks::{EvalHookArgs, HookContext, HookHandler, HookName};

/// A function a module exports.
#[derive(Clone)]
pub struct ExportedFunction {
    pub name: String,
    pub implementation: NativeFn,
    /// Signature checked by the host evaluator on every call. `None` leaves
    /// arguments unchecked.
    pub signature: Option<String>,
}

impl PartialEq for ExportedFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.signature == other.signature
            && Arc::ptr_eq(&self.implementation, &other.implementation)
    }
}

impl fmt::Debug for ExportedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A handler tapped into a lifecycle hook.
#[derive(Clone)]
pub struct HookBinding {
    pub hook: HookName,
    pub handler: HookHandler,
}

impl PartialEq for HookBinding {
    fn eq(&self, other: &Self) -> bool {
        self.hook == other.hook && Arc::ptr_eq(&self.handler, &other.handler)
    }
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

/// Immutable description of a module.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleDefinition {
    id: String,
    description: Option<String>,
    exports: Arc<[ExportedFunction]>,
    hooks: Arc<[HookBinding]>,
}

impl ModuleDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Exports in declaration order.
    pub fn exports(&self) -> &Arc<[ExportedFunction]> {
        &self.exports
    }

    /// Hook bindings in declaration order.
    pub fn hooks(&self) -> &Arc<[HookBinding]> {
        &self.hooks
    }

    /// Copy into containers not shared with `self`.
    pub(crate) fn detached(&self) -> ModuleDefinition {
        ModuleDefinition {
            id: self.id.clone(),
            description: self.description.clone(),
            exports: self.exports.iter().cloned().collect(),
            hooks: self.hooks.iter().cloned().collect(),
        }
    }
}

/// Builder for a `ModuleDefinition`.
#[derive(Clone, Debug)]
#[must_use]
pub struct ModuleBuilder {
    id: String,
    description: Option<String>,
    exports: Vec<ExportedFunction>,
    hooks: Vec<HookBinding>,
}

/// Start defining a module. `id` is the module's unique identifier and the
/// default prefix its exports are bound under.
pub fn define_module(id: impl Into<String>) -> ModuleBuilder {
    ModuleBuilder {
        id: id.into(),
        description: None,
        exports: Vec::new(),
        hooks: Vec::new(),
    }
}

impl ModuleBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Export a function whose arguments are checked against `signature`.
    pub fn export<F>(self, name: impl Into<String>, signature: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&Focus<'_>, Vec<Value>) -> EvalResult + Send + Sync + 'static,
    {
        self.push_export(name.into(), Some(signature.into()), Arc::new(implementation))
    }

    /// Export a function without a signature.
    pub fn export_unsafe<F>(self, name: impl Into<String>, implementation: F) -> Self
    where
        F: Fn(&Focus<'_>, Vec<Value>) -> EvalResult + Send + Sync + 'static,
    {
        self.push_export(name.into(), None, Arc::new(implementation))
    }

    fn push_export(mut self, name: String, signature: Option<String>, implementation: NativeFn) -> Self {
        self.exports.push(ExportedFunction {
            name,
            implementation,
            signature,
        });
        self
    }

    /// Run `handler` every time `hook` fires.
    pub fn tap_hook<F>(mut self, hook: HookName, handler: F) -> Self
    where
        F: Fn(&HookContext, &EvalHookArgs<'_>) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        self.hooks.push(HookBinding {
            hook,
            handler: Arc::new(handler),
        });
        self
    }

    /// Snapshot the current state.
    pub fn build(&self) -> ModuleDefinition {
        ModuleDefinition {
            id: self.id.clone(),
            description: self.description.clone(),
            exports: self.exports.iter().cloned().collect(),
            hooks: self.hooks.iter().cloned().collect(),
        }
    }
}
