//! Runtime modules.
//!
//! A `RuntimeModule` is the registry-owned form of a `ModuleDefinition`. It is
//! created once by `wrap` and never mutated afterwards; expressions share it
//! through `Arc`.

use std::fmt;

use tracing::{debug, trace};

use modex_host::{
    EvalError, EvalResult, Expression, Focus, HostFunction, NativeFunction, Object, Value, WeakFrame,
};

use crate::define::ModuleDefinition;
use crate::errors::ModuleError;
use crate::hooks::{EvalHookArgs, HookContext, HookName};
use crate::options::BindOptions;
use crate::validate::validate;

pub struct RuntimeModule {
    definition: ModuleDefinition,
    /// One entry per export, in declaration order.
    functions: Vec<(String, NativeFunction)>,
}

impl RuntimeModule {
    /// Validate `definition` and take a private copy of it.
    pub fn wrap(definition: &ModuleDefinition) -> Result<RuntimeModule, ModuleError> {
        validate(definition)?;
        let definition = definition.detached();
        let functions = definition
            .exports()
            .iter()
            .map(|export| {
                NativeFunction::new(
                    export.name.clone(),
                    export.implementation.clone(),
                    export.signature.as_deref(),
                )
                .map(|function| (export.name.clone(), function))
                .map_err(|err| {
                    ModuleError::invalid(definition.id(), format!("export `{}`: {err}", export.name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(module = definition.id(), exports = functions.len(), "wrapped module");
        Ok(RuntimeModule {
            definition,
            functions,
        })
    }

    pub fn id(&self) -> &str {
        self.definition.id()
    }

    pub fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    /// Name an export is bound under: `<alias>_<export>`.
    pub fn scoped_name(&self, export: &str, options: &BindOptions) -> String {
        let prefix = options.alias.as_deref().unwrap_or_else(|| self.id());
        format!("{prefix}_{export}")
    }

    /// A record of callables, one per export, bound to `focus`.
    ///
    /// Each callable checks its arguments against the export's signature and
    /// runs the implementation with the environment and input captured here,
    /// wherever it is later called from.
    pub fn get_handlers(&self, focus: &Focus<'_>) -> Value {
        let handlers = self
            .functions
            .iter()
            .map(|(name, function)| {
                let handler = BoundHandler {
                    function: function.clone(),
                    environment: focus.environment.downgrade(),
                    input: focus.input.clone(),
                };
                (name.clone(), Value::host(handler))
            })
            .collect::<Object>();
        Value::object(handlers)
    }

    /// Bind every export into the frame the call is evaluated in.
    pub fn bind_exports_to_context(
        &self,
        focus: &Focus<'_>,
        options: &BindOptions,
    ) -> Result<(), ModuleError> {
        for (name, function) in &self.functions {
            let handler = BoundHandler {
                function: function.clone(),
                environment: focus.environment.downgrade(),
                input: focus.input.clone(),
            };
            focus
                .environment
                .bind(&self.scoped_name(name, options), Value::host(handler))?;
        }
        debug!(module = self.id(), frame = %focus.environment.id(), "bound exports to context");
        Ok(())
    }

    /// Bind every export into the outermost frame of the current evaluation.
    pub fn bind_exports_to_global(
        &self,
        focus: &Focus<'_>,
        options: &BindOptions,
    ) -> Result<(), ModuleError> {
        let root = focus.environment.root();
        for (name, function) in &self.functions {
            root.bind(&self.scoped_name(name, options), Value::host(function.clone()))?;
        }
        debug!(module = self.id(), frame = %root.id(), "bound exports to global");
        Ok(())
    }

    /// Register every export on `expression` itself.
    pub fn bind_exports_to_expression(&self, expression: &Expression, options: &BindOptions) {
        for (name, function) in &self.functions {
            expression.register(&self.scoped_name(name, options), function.clone());
        }
        debug!(module = self.id(), "bound exports to expression");
    }

    /// Run every handler tapped into `hook`, in declaration order. The first
    /// error stops the fan-out and is returned.
    pub fn exec_hook(
        &self,
        hook: HookName,
        context: &HookContext,
        args: &EvalHookArgs<'_>,
    ) -> Result<(), EvalError> {
        for binding in self.definition.hooks().iter().filter(|b| b.hook == hook) {
            trace!(module = self.id(), %hook, context = %context.invocation(), "hook");
            (binding.handler)(context, args)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RuntimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeModule")
            .field("id", &self.id())
            .field(
                "exports",
                &self.functions.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("hooks", &self.definition.hooks().len())
            .finish()
    }
}

/// An export bound to the focus it was handed out from.
///
/// The frame is held weakly: handlers usually end up bound in that frame.
/// Once it is gone the handler runs in the caller's frame.
struct BoundHandler {
    function: NativeFunction,
    environment: WeakFrame,
    input: Value,
}

impl HostFunction for BoundHandler {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn apply(&self, focus: &Focus<'_>, args: Vec<Value>) -> EvalResult {
        match self.environment.upgrade() {
            Some(environment) => {
                let bound = Focus::new(&environment, &self.input);
                self.function.apply(&bound, args)
            }
            None => {
                let fallback = Focus::new(focus.environment, &self.input);
                self.function.apply(&fallback, args)
            }
        }
    }
}
