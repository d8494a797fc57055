//! Environment sandbox.
//!
//! Two guarantees protect the lifecycle hook wiring of a bound expression:
//!
//! - the callbacks at `__evaluate_entry`/`__evaluate_exit` only run when the
//!   host evaluator itself invokes them (`validate_caller`);
//! - no frame an expression evaluates in can rebind those names
//!   (`harden`).
//!
//! Frames are hardened lazily: the entry hook hardens the frame it fires in
//! the first time it sees it. Child frames created from a hardened frame get
//! their own `SandboxedEnvironment` from the parent's interposer at creation,
//! so a block or lambda frame is protected before its first binding.
//!
//! Both are delivered as the `modex:core:env` module, which every registry
//! carries ahead of user modules.

use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use modex_host::{
    EvalError, Frame, FrameId, FrameInterposer, RawFrame, Value, EVALUATE_ENTRY, EVALUATE_EXIT,
};

use crate::define::{define_module, ModuleDefinition};
use crate::errors::ModuleError;
use crate::hooks::HookName;
use crate::invocation::InvocationContext;
use crate::options::SandboxOptions;

/// Id of the bundled core environment module.
pub const CORE_ENV_MODULE_ID: &str = "modex:core:env";

/// Name a hardened frame answers with `true`. The `:` keeps it out of reach
/// of expression variable syntax.
pub const SANDBOX_MARKER: &str = "modex:sandbox-root";

#[derive(Clone, Debug)]
pub struct EnvironmentSandbox {
    options: SandboxOptions,
}

impl EnvironmentSandbox {
    pub fn new(options: SandboxOptions) -> Self {
        options.warn_if_weakened();
        EnvironmentSandbox { options }
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Reject expression-reachable invocations of a lifecycle callback.
    pub fn validate_caller(
        &self,
        hook: HookName,
        context: InvocationContext,
    ) -> Result<(), ModuleError> {
        if context.is_expression_reachable() && !self.options.allow_eval_hook_invocation_from_expression {
            return Err(ModuleError::PrivilegedCallViolation { hook, context });
        }
        Ok(())
    }

    /// Install a `SandboxedEnvironment` on `frame` unless it already has one.
    ///
    /// A frame carrying any other interposer cannot be vouched for and is
    /// rejected.
    pub fn harden(&self, frame: &Frame) -> Result<(), ModuleError> {
        if self.options.disable_core_env_api_integrity {
            return Ok(());
        }
        if frame.is_interposed() {
            return vouch_for(frame);
        }

        let is_root = frame.lookup(SANDBOX_MARKER) != Some(Value::Bool(true));
        let environment = SandboxedEnvironment {
            frame: frame.id(),
            is_root,
            protect_hooks: !self.options.disable_eval_hook_integrity,
        };
        if frame.install_interposer(Arc::new(environment)).is_err() {
            // Another thread filled the slot between the check and the install.
            return vouch_for(frame);
        }
        trace!(frame = %frame.id(), is_root, "hardened frame");
        Ok(())
    }
}

/// Accept a frame whose interposer slot is already filled, if the occupant is
/// the sandbox's own.
fn vouch_for(frame: &Frame) -> Result<(), ModuleError> {
    match frame.interposer() {
        Some(existing) if existing.as_any().is::<SandboxedEnvironment>() => Ok(()),
        _ => Err(ModuleError::EnvironmentIntegrityViolation {
            frame: frame.id(),
            reason: "frame already carries a foreign interposer".to_owned(),
        }),
    }
}

/// Interposer installed on every hardened frame.
#[derive(Clone, Debug)]
pub struct SandboxedEnvironment {
    frame: FrameId,
    is_root: bool,
    protect_hooks: bool,
}

impl SandboxedEnvironment {
    /// Whether this frame was the first one hardened in its chain.
    pub fn is_sandbox_root(&self) -> bool {
        self.is_root
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame
    }

    fn violation(&self, name: &str) -> EvalError {
        ModuleError::EnvironmentIntegrityViolation {
            frame: self.frame,
            reason: format!("`{name}` cannot be rebound"),
        }
        .into()
    }
}

impl FrameInterposer for SandboxedEnvironment {
    fn bind(&self, frame: RawFrame<'_>, name: &str, value: Value) -> Result<(), EvalError> {
        if name == SANDBOX_MARKER
            || (self.protect_hooks && (name == EVALUATE_ENTRY || name == EVALUATE_EXIT))
        {
            return Err(self.violation(name));
        }
        frame.bind(name, value);
        Ok(())
    }

    fn lookup(&self, frame: RawFrame<'_>, name: &str) -> Option<Value> {
        if name == SANDBOX_MARKER {
            return Some(Value::Bool(true));
        }
        frame.lookup(name)
    }

    fn on_child(&self, child: FrameId) -> Option<Arc<dyn FrameInterposer>> {
        Some(Arc::new(SandboxedEnvironment {
            frame: child,
            is_root: false,
            protect_hooks: self.protect_hooks,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The bundled core environment module.
///
/// `eval:entry` validates the caller and hardens the current frame;
/// `eval:exit` only validates the caller.
pub fn core_env(options: &SandboxOptions) -> ModuleDefinition {
    let sandbox = Arc::new(EnvironmentSandbox::new(*options));
    let on_exit = Arc::clone(&sandbox);
    define_module(CORE_ENV_MODULE_ID)
        .description("Guards the lifecycle hooks and hardens evaluation frames")
        .tap_hook(HookName::EvalEntry, move |context, args| {
            sandbox.validate_caller(HookName::EvalEntry, context.invocation())?;
            sandbox.harden(args.environment)?;
            Ok(())
        })
        .tap_hook(HookName::EvalExit, move |context, _args| {
            on_exit.validate_caller(HookName::EvalExit, context.invocation())?;
            Ok(())
        })
        .build()
}
