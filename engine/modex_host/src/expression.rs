//! Compiled expressions.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{ExprArena, ExprId};
use crate::errors::{EvalResult, ParseError};
use crate::evaluator::evaluate;
use crate::frame::Frame;
use crate::function::{HostFunction, NativeFn, NativeFunction};
use crate::parser::parse;
use crate::signature::SignatureError;
use crate::value::Value;

/// A compiled expression with its own static root frame.
///
/// Functions registered on the expression and values assigned to it live in
/// that root frame and are visible to every evaluation.
#[derive(Clone)]
pub struct Expression {
    source: Arc<str>,
    arena: Arc<ExprArena>,
    root: ExprId,
    environment: Frame,
}

impl Expression {
    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn compile(source: &str) -> Result<Expression, ParseError> {
        let parsed = parse(source)?;
        debug!(nodes = parsed.arena.len(), "compiled expression");
        Ok(Expression {
            source: Arc::from(source),
            arena: Arc::new(parsed.arena),
            root: parsed.root,
            environment: Frame::new(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Register a native function as `$name`, checking its arguments against
    /// `signature` on every call.
    pub fn register_function(
        &self,
        name: &str,
        implementation: NativeFn,
        signature: Option<&str>,
    ) -> Result<(), SignatureError> {
        let function = NativeFunction::new(name, implementation, signature)?;
        self.register(name, function);
        Ok(())
    }

    /// Register any host function as `$name`.
    pub fn register(&self, name: &str, function: impl HostFunction + 'static) {
        self.assign(name, Value::host(function));
    }

    /// Write `name` into the root frame.
    ///
    /// This is the host-owner path: it bypasses any interposer installed on
    /// the root frame.
    pub fn assign(&self, name: &str, value: Value) {
        self.environment.bind_unguarded(name, value);
    }

    /// Evaluate against `input`.
    ///
    /// With `bindings`, evaluation runs in a fresh child of the root frame
    /// holding them; without, it runs in the root frame itself.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn evaluate(&self, input: &Value, bindings: Option<&[(String, Value)]>) -> EvalResult {
        match bindings {
            Some(bindings) => {
                let frame = self.environment.child();
                for (name, value) in bindings {
                    frame.bind(name, value.clone())?;
                }
                evaluate(&self.arena, self.root, &frame, input)
            }
            None => evaluate(&self.arena, self.root, &self.environment, input),
        }
    }

    /// The static root frame.
    pub fn environment(&self) -> &Frame {
        &self.environment
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("nodes", &self.arena.len())
            .field("environment", &self.environment)
            .finish()
    }
}
