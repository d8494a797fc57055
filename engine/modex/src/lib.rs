//! Modex - Modules for modex expressions.
//!
//! Modules are immutable bundles of exported functions and lifecycle hook
//! handlers. A `ModuleRegistry` holds them and binds expressions against a
//! snapshot of what it holds:
//!
//! - `define_module` builds a `ModuleDefinition`
//! - `ModuleRegistry::add_module` validates and wraps it
//! - `ModuleRegistry::expression` compiles text into a `BoundExpression`,
//!   with `$r('id')` / `$rRet('id')` available to pull exports in
//! - every sub-expression fires `eval:entry` and `eval:exit` on every module
//!
//! The bundled `modex:core:env` module runs first. It refuses lifecycle
//! invocations that come from expression text and hardens every frame an
//! expression evaluates in, so the callback bindings cannot be replaced.
//!
//! ```
//! use modex::{define_module, ModuleRegistry};
//! use modex_host::Value;
//!
//! let strings = define_module("strings")
//!     .export("upper", "<s:s>", |_focus, args| {
//!         let s = args.first().and_then(Value::as_str).unwrap_or_default();
//!         Ok(Value::string(s.to_uppercase()))
//!     })
//!     .build();
//!
//! let registry = ModuleRegistry::new()?;
//! registry.add_module(&strings)?;
//! let expression = registry.expression("$r('strings'); $strings_upper('ab')")?;
//! assert_eq!(expression.exec(&Value::from("ignored"))?, Value::from("AB"));
//! # Ok::<(), modex::ModuleError>(())
//! ```

mod apply;
mod define;
mod errors;
mod expression;
mod hooks;
mod invocation;
mod module;
mod options;
mod registry;
mod sandbox;
mod validate;

pub use apply::apply_to_expression;
pub use define::{define_module, ExportedFunction, HookBinding, ModuleBuilder, ModuleDefinition};
pub use errors::ModuleError;
pub use expression::{BoundExpression, ModuleSnapshot};
pub use hooks::{EvalHookArgs, HookContext, HookHandler, HookName, UnknownHook};
pub use invocation::{with_invocation_context, ContextCapturingFn, InvocationContext};
pub use module::RuntimeModule;
pub use options::{
    BindOptions, ExpressionOptions, RegistryOptions, RequireHelper, SandboxOptions,
    DEFAULT_REQUIRE_HELPER,
};
pub use registry::ModuleRegistry;
pub use sandbox::{core_env, EnvironmentSandbox, SandboxedEnvironment, CORE_ENV_MODULE_ID, SANDBOX_MARKER};
pub use validate::{is_valid_module_id, is_valid_export_name, validate};
