//! Configuration.
//!
//! All option structs deserialize from camelCase keys, so a host can load them
//! straight from its own configuration:
//!
//! ```json
//! {
//!   "defaultExpressionOptions": { "requireHelper": "include" },
//!   "sandbox": { "allowEvalHookInvocationFromExpression": false }
//! }
//! ```

use serde::Deserialize;
use tracing::warn;

use modex_host::Value;

/// Default name of the in-expression include helper, i.e. `$r('module')`.
pub const DEFAULT_REQUIRE_HELPER: &str = "r";

/// Name of the in-expression include helper, or disabled.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RequireHelperRepr")]
pub enum RequireHelper {
    Named(String),
    /// No include helpers are registered; modules can only be injected by the
    /// hosting program.
    Disabled,
}

impl Default for RequireHelper {
    fn default() -> Self {
        RequireHelper::Named(DEFAULT_REQUIRE_HELPER.to_owned())
    }
}

/// `"name"` or `false`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RequireHelperRepr {
    Name(String),
    Flag(bool),
}

impl TryFrom<RequireHelperRepr> for RequireHelper {
    type Error = String;

    fn try_from(repr: RequireHelperRepr) -> Result<Self, Self::Error> {
        match repr {
            RequireHelperRepr::Name(name) if !name.is_empty() => Ok(RequireHelper::Named(name)),
            RequireHelperRepr::Name(_) => Err("requireHelper must not be empty".to_owned()),
            RequireHelperRepr::Flag(false) => Ok(RequireHelper::Disabled),
            RequireHelperRepr::Flag(true) => {
                Err("requireHelper must be a helper name or `false`".to_owned())
            }
        }
    }
}

/// Per-expression options. Unset fields fall back to the registry defaults,
/// then to the built-in defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpressionOptions {
    pub require_helper: Option<RequireHelper>,
}

impl ExpressionOptions {
    #[must_use]
    pub fn require_helper(mut self, name: impl Into<String>) -> Self {
        self.require_helper = Some(RequireHelper::Named(name.into()));
        self
    }

    #[must_use]
    pub fn disable_require_helper(mut self) -> Self {
        self.require_helper = Some(RequireHelper::Disabled);
        self
    }

    /// `self`, with unset fields taken from `defaults`.
    #[must_use]
    pub fn merged_over(&self, defaults: &ExpressionOptions) -> ExpressionOptions {
        ExpressionOptions {
            require_helper: self
                .require_helper
                .clone()
                .or_else(|| defaults.require_helper.clone()),
        }
    }

    /// The helper name to register, or `None` when disabled.
    pub fn resolved_require_helper(&self) -> Option<&str> {
        match &self.require_helper {
            Some(RequireHelper::Named(name)) => Some(name),
            Some(RequireHelper::Disabled) => None,
            None => Some(DEFAULT_REQUIRE_HELPER),
        }
    }
}

/// Escape hatches of the environment sandbox.
///
/// **Every field weakens a security guarantee.** All default to `false`;
/// enabling one is logged as a warning when the sandbox is created.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SandboxOptions {
    /// Let expressions invoke the lifecycle callbacks, running every module's
    /// `eval:entry`/`eval:exit` handlers on demand.
    pub allow_eval_hook_invocation_from_expression: bool,
    /// Let the lifecycle callback bindings be rebound, including from inside
    /// an expression. Implied by `disable_core_env_api_integrity`.
    pub disable_eval_hook_integrity: bool,
    /// Do not harden frames at all.
    pub disable_core_env_api_integrity: bool,
}

impl SandboxOptions {
    #[must_use]
    pub fn allow_eval_hook_invocation_from_expression(mut self, allow: bool) -> Self {
        self.allow_eval_hook_invocation_from_expression = allow;
        self
    }

    #[must_use]
    pub fn disable_eval_hook_integrity(mut self, disable: bool) -> Self {
        self.disable_eval_hook_integrity = disable;
        self
    }

    #[must_use]
    pub fn disable_core_env_api_integrity(mut self, disable: bool) -> Self {
        self.disable_core_env_api_integrity = disable;
        self
    }

    pub(crate) fn warn_if_weakened(&self) {
        if self.allow_eval_hook_invocation_from_expression {
            warn!("sandbox: lifecycle hooks can be invoked from expressions");
        }
        if self.disable_eval_hook_integrity {
            warn!("sandbox: lifecycle hook bindings can be overwritten");
        }
        if self.disable_core_env_api_integrity {
            warn!("sandbox: environment frames are not hardened");
        }
    }
}

/// Registry-wide options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryOptions {
    /// Defaults for every expression the registry creates.
    #[serde(alias = "defaultExpressionOpts")]
    pub default_expression_options: ExpressionOptions,
    pub sandbox: SandboxOptions,
}

impl RegistryOptions {
    #[must_use]
    pub fn default_expression_options(mut self, options: ExpressionOptions) -> Self {
        self.default_expression_options = options;
        self
    }

    #[must_use]
    pub fn sandbox(mut self, sandbox: SandboxOptions) -> Self {
        self.sandbox = sandbox;
        self
    }
}

/// Options for binding a module's exports into a scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Prefix of the bound names, `<alias>_<export>`. Defaults to the module id.
    pub alias: Option<String>,
}

impl BindOptions {
    pub fn alias(alias: impl Into<String>) -> Self {
        BindOptions {
            alias: Some(alias.into()),
        }
    }

    /// Read options passed from expression text. Undefined means defaults.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_undefined() {
            return Ok(BindOptions::default());
        }
        serde_json::from_value(value.to_json())
    }
}
