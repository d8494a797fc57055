//! Bound expressions.
//!
//! A `BoundExpression` is a compiled expression wired to a frozen snapshot of
//! runtime modules. It registers the include helpers (`$r`, `$rRet`) and owns
//! the two lifecycle callbacks that fan every `eval:entry`/`eval:exit` out to
//! the modules' hook handlers.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use modex_host::{EvalError, EvalResult, Expression, Focus, Frame, NativeFunction, Value};

use crate::errors::ModuleError;
use crate::hooks::{EvalHookArgs, HookContext, HookName};
use crate::invocation::{with_invocation_context, InvocationContext};
use crate::module::RuntimeModule;
use crate::options::{BindOptions, ExpressionOptions};

/// Module snapshot shared by a bound expression and the callables it
/// registered.
pub type ModuleSnapshot = Arc<[Arc<RuntimeModule>]>;

pub struct BoundExpression {
    expression: Expression,
    modules: ModuleSnapshot,
    options: ExpressionOptions,
}

impl BoundExpression {
    /// Compile `source` and wire it to `modules`.
    #[tracing::instrument(level = "debug", skip_all, fields(modules = modules.len()))]
    pub(crate) fn bind(
        source: &str,
        modules: ModuleSnapshot,
        options: ExpressionOptions,
    ) -> Result<BoundExpression, ModuleError> {
        let expression = Expression::compile(source)?;
        let bound = BoundExpression {
            expression,
            modules,
            options,
        };
        if let Some(helper) = bound.options.resolved_require_helper() {
            bound.register_require_helpers(helper)?;
        }
        bound.install_hooks();
        Ok(bound)
    }

    /// `$<helper>(id, options?)` binds a module's exports globally;
    /// `$<helper>Ret(id)` returns them as an object.
    fn register_require_helpers(&self, helper: &str) -> Result<(), ModuleError> {
        let modules = Arc::clone(&self.modules);
        let include = NativeFunction::new(
            helper,
            Arc::new(move |focus: &Focus<'_>, args: Vec<Value>| -> EvalResult {
                let id = args.first().and_then(Value::as_str).unwrap_or_default();
                let options = args
                    .get(1)
                    .map(BindOptions::from_value)
                    .transpose()
                    .map_err(EvalError::native)?
                    .unwrap_or_default();
                find_module(&modules, id)?.bind_exports_to_global(focus, &options)?;
                Ok(Value::Undefined)
            }),
            Some("<so?:l>"),
        )
        .map_err(|err| ModuleError::Evaluation(err.into()))?;

        let modules = Arc::clone(&self.modules);
        let include_ret = NativeFunction::new(
            format!("{helper}Ret"),
            Arc::new(move |focus: &Focus<'_>, args: Vec<Value>| -> EvalResult {
                let id = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(find_module(&modules, id)?.get_handlers(focus))
            }),
            Some("<s:o>"),
        )
        .map_err(|err| ModuleError::Evaluation(err.into()))?;

        self.expression.register(helper, include);
        self.expression.register(&format!("{helper}Ret"), include_ret);
        debug!(helper, "registered include helpers");
        Ok(())
    }

    /// (Re)bind the lifecycle callbacks at the root frame.
    fn install_hooks(&self) {
        for hook in HookName::ALL {
            let modules = Arc::clone(&self.modules);
            let callback = with_invocation_context(
                hook.binding_name(),
                move |context: InvocationContext, focus: &Focus<'_>, args: Vec<Value>| {
                    let result = match hook {
                        HookName::EvalEntry => None,
                        HookName::EvalExit => args.first(),
                    };
                    let hook_args = EvalHookArgs::from_focus(focus, result);
                    let hook_context = HookContext::new(context);
                    for module in modules.iter() {
                        module.exec_hook(hook, &hook_context, &hook_args)?;
                    }
                    Ok(Value::Undefined)
                },
            );
            self.expression.assign(hook.binding_name(), Value::host(callback));
        }
    }

    /// Evaluate against `input`.
    pub fn exec(&self, input: &Value) -> Result<Value, ModuleError> {
        self.exec_with(input, std::iter::empty::<(&str, Value)>())
    }

    /// Evaluate against `input` with extra variable bindings.
    ///
    /// Bindings are assigned into the root frame one by one and the lifecycle
    /// callbacks are rebound afterwards, so a binding named like a callback
    /// never replaces it. Assigned bindings persist into later evaluations of
    /// the same expression.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn exec_with<I, K>(&self, input: &Value, bindings: I) -> Result<Value, ModuleError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (name, value) in bindings {
            self.expression.assign(name.as_ref(), value);
        }
        self.install_hooks();
        self.expression.evaluate(input, None).map_err(ModuleError::from)
    }

    /// Assign `name` in the expression's root frame.
    pub fn assign(&self, name: &str, value: Value) -> &Self {
        self.expression.assign(name, value);
        self
    }

    /// Register a snapshot module's exports on the expression.
    pub fn inject_module(&self, id: &str, options: &BindOptions) -> Result<&Self, ModuleError> {
        let module = self
            .modules
            .iter()
            .find(|module| module.id() == id)
            .ok_or_else(|| ModuleError::not_found(id))?;
        module.bind_exports_to_expression(&self.expression, options);
        debug!(module = id, "injected module");
        Ok(self)
    }

    /// Register every snapshot module's exports under default aliases.
    pub fn inject_all_modules(&self) -> &Self {
        let options = BindOptions::default();
        for module in self.modules.iter() {
            module.bind_exports_to_expression(&self.expression, &options);
        }
        debug!(modules = self.modules.len(), "injected all modules");
        self
    }

    /// Ids of the snapshot modules, in hook dispatch order.
    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.iter().map(|module| module.id()).collect()
    }

    pub fn options(&self) -> &ExpressionOptions {
        &self.options
    }

    /// The expression's static root frame.
    pub fn environment(&self) -> &Frame {
        self.expression.environment()
    }

    pub fn source(&self) -> &str {
        self.expression.source()
    }
}

impl fmt::Debug for BoundExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundExpression")
            .field("source", &self.source())
            .field("modules", &self.module_ids())
            .field("options", &self.options)
            .finish()
    }
}

fn find_module<'a>(modules: &'a [Arc<RuntimeModule>], id: &str) -> Result<&'a RuntimeModule, ModuleError> {
    modules
        .iter()
        .find(|module| module.id() == id)
        .map(|module| &**module)
        .ok_or_else(|| ModuleError::not_found(id))
}
