//! Tree-walking evaluator.
//!
//! Every node goes through `eval`, which brackets the node with the two
//! lifecycle callbacks:
//!
//! 1. look up `__evaluate_entry` in the current frame and `invoke` it with no
//!    arguments,
//! 2. evaluate the node,
//! 3. look up `__evaluate_exit` and `invoke` it with the node's result.
//!
//! Callbacks are only honoured when they resolve to a host function. They are
//! called through `HostFunction::invoke`, the one entry point expression text
//! cannot reach; calls written in an expression use `apply`, and `$map` uses
//! `call`.

use std::sync::Arc;

use tracing::trace;

use crate::ast::{BinaryOp, Expr, ExprArena, ExprId, ExprKind};
use crate::errors::{
    binary_type_mismatch, division_by_zero, not_callable, type_mismatch, EvalError, EvalResult,
};
use crate::frame::Frame;
use crate::function::Focus;
use crate::stack::ensure_sufficient_stack;
use crate::value::{Builtin, FunctionValue, LambdaValue, Object, Value};

/// Name the evaluator looks up before evaluating a node.
pub const EVALUATE_ENTRY: &str = "__evaluate_entry";
/// Name the evaluator looks up after evaluating a node.
pub const EVALUATE_EXIT: &str = "__evaluate_exit";

/// Which expression-reachable convention a function value is called with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Convention {
    /// A call written in expression text.
    Apply,
    /// A call made by a higher-order builtin.
    Call,
}

/// Evaluate `root` of `arena` in `frame` against `input`.
pub fn evaluate(arena: &Arc<ExprArena>, root: ExprId, frame: &Frame, input: &Value) -> EvalResult {
    Interpreter {
        arena,
        root_input: input,
    }
    .eval(root, frame, input)
}

pub(crate) struct Interpreter<'a> {
    arena: &'a Arc<ExprArena>,
    /// `$$`
    root_input: &'a Value,
}

impl Interpreter<'_> {
    pub(crate) fn eval(&self, id: ExprId, frame: &Frame, input: &Value) -> EvalResult {
        ensure_sufficient_stack(|| {
            let expr = self.arena.get(id);
            self.lifecycle(EVALUATE_ENTRY, frame, input, expr, Vec::new())?;
            let result = self
                .eval_node(expr, frame, input)
                .map_err(|err| err.span_if_missing(expr.span))?;
            self.lifecycle(EVALUATE_EXIT, frame, input, expr, vec![result.clone()])?;
            Ok(result)
        })
    }

    fn lifecycle(
        &self,
        name: &str,
        frame: &Frame,
        input: &Value,
        expr: &Expr,
        args: Vec<Value>,
    ) -> Result<(), EvalError> {
        if let Some(Value::Function(FunctionValue::Host(callback))) = frame.lookup(name) {
            trace!(callback = name, node = expr.type_name(), frame = %frame.id(), "lifecycle");
            let focus = Focus::new(frame, input).with_expr(expr);
            callback
                .invoke(&focus, args)
                .map_err(|err| err.span_if_missing(expr.span))?;
        }
        Ok(())
    }

    fn eval_node(&self, expr: &Expr, frame: &Frame, input: &Value) -> EvalResult {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Variable(name) => Ok(frame
                .lookup(name)
                .or_else(|| {
                    Builtin::from_name(name).map(|b| Value::Function(FunctionValue::Builtin(b)))
                })
                .unwrap_or_default()),
            ExprKind::Context => Ok(input.clone()),
            ExprKind::Root => Ok(self.root_input.clone()),
            ExprKind::Field(field) => Ok(navigate(input, field)),
            ExprKind::Path { target, field } => {
                let target = self.eval(*target, frame, input)?;
                Ok(navigate(&target, field))
            }
            ExprKind::Index { target, index } => {
                let target = self.eval(*target, frame, input)?;
                let index = self.eval(*index, frame, input)?;
                Ok(index_into(&target, &index))
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval(*callee, frame, input)?;
                let Value::Function(function) = callee else {
                    return Err(not_callable(callee.type_name()));
                };
                let args = args
                    .iter()
                    .map(|arg| self.eval(*arg, frame, input))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_function(&function, Convention::Apply, frame, input, args)
            }
            ExprKind::Negate(operand) => match self.eval(*operand, frame, input)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::Undefined => Ok(Value::Undefined),
                other => Err(type_mismatch("number", other.type_name())),
            },
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, *left, *right, frame, input),
            ExprKind::Condition {
                test,
                then,
                otherwise,
            } => {
                if self.eval(*test, frame, input)?.is_truthy() {
                    self.eval(*then, frame, input)
                } else if let Some(otherwise) = otherwise {
                    self.eval(*otherwise, frame, input)
                } else {
                    Ok(Value::Undefined)
                }
            }
            ExprKind::Bind { name, value } => {
                let value = self.eval(*value, frame, input)?;
                frame.bind(name, value.clone())?;
                Ok(value)
            }
            ExprKind::Block(items) => {
                let scope = frame.child();
                let mut result = Value::Undefined;
                for item in items {
                    result = self.eval(*item, &scope, input)?;
                }
                Ok(result)
            }
            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(*item, frame, input)?;
                    if !value.is_undefined() {
                        values.push(value);
                    }
                }
                Ok(Value::array(values))
            }
            ExprKind::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    let value = self.eval(*value, frame, input)?;
                    if !value.is_undefined() {
                        object.insert(key.clone(), value);
                    }
                }
                Ok(Value::object(object))
            }
            ExprKind::Lambda { params, body } => {
                Ok(Value::Function(FunctionValue::Lambda(Arc::new(LambdaValue {
                    params: params.clone(),
                    body: *body,
                    arena: Arc::clone(self.arena),
                    captures: Arc::new(frame.capture()),
                }))))
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        frame: &Frame,
        input: &Value,
    ) -> EvalResult {
        // Short-circuit operators evaluate the right side lazily.
        match op {
            BinaryOp::And => {
                let left = self.eval(left, frame, input)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval(right, frame, input)?.is_truthy()));
            }
            BinaryOp::Or => {
                let left = self.eval(left, frame, input)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval(right, frame, input)?.is_truthy()));
            }
            _ => {}
        }

        let left = self.eval(left, frame, input)?;
        let right = self.eval(right, frame, input)?;
        evaluate_binary(op, &left, &right)
    }

    /// Call a function value with the given convention.
    pub(crate) fn call_function(
        &self,
        function: &FunctionValue,
        convention: Convention,
        frame: &Frame,
        input: &Value,
        args: Vec<Value>,
    ) -> EvalResult {
        match function {
            FunctionValue::Builtin(builtin) => builtin.call(self, frame, input, args),
            FunctionValue::Lambda(lambda) => self.apply_lambda(lambda, frame, input, args),
            FunctionValue::Host(host) => {
                let focus = Focus::new(frame, input);
                match convention {
                    Convention::Apply => host.apply(&focus, args),
                    Convention::Call => host.call(&focus, args),
                }
            }
        }
    }

    /// Run the body with parameters over captures over the calling frame.
    fn apply_lambda(
        &self,
        lambda: &LambdaValue,
        frame: &Frame,
        input: &Value,
        args: Vec<Value>,
    ) -> EvalResult {
        let captured = frame.child();
        for (name, value) in lambda.captures.iter() {
            captured.bind_unguarded(name, value.clone());
        }
        let scope = captured.child();
        let mut args = args.into_iter();
        for param in &lambda.params {
            scope.bind(param, args.next().unwrap_or_default())?;
        }
        let body = Interpreter {
            arena: &lambda.arena,
            root_input: self.root_input,
        };
        body.eval(lambda.body, &scope, input)
    }
}

/// Field navigation. Arrays are mapped over and nested results flattened.
fn navigate(value: &Value, field: &str) -> Value {
    match value {
        Value::Object(object) => object.get(field).cloned().unwrap_or_default(),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items.iter() {
                match navigate(item, field) {
                    Value::Undefined => {}
                    Value::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other),
                }
            }
            match out.len() {
                0 => Value::Undefined,
                1 => out.pop().unwrap_or_default(),
                _ => Value::array(out),
            }
        }
        _ => Value::Undefined,
    }
}

fn index_into(target: &Value, index: &Value) -> Value {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            let idx = if *n < 0.0 {
                (items.len() as f64 + n.floor()) as i64
            } else {
                n.floor() as i64
            };
            usize::try_from(idx)
                .ok()
                .and_then(|idx| items.get(idx))
                .cloned()
                .unwrap_or_default()
        }
        (Value::Object(object), Value::Str(key)) => object.get(key).cloned().unwrap_or_default(),
        (value, Value::Number(n)) if *n == 0.0 && !value.is_undefined() => value.clone(),
        _ => Value::Undefined,
    }
}

/// Apply a non-short-circuit binary operator.
pub fn evaluate_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    match op {
        BinaryOp::Concat => Ok(Value::string(format!("{left}{right}"))),
        BinaryOp::Eq => Ok(Value::Bool(!left.is_undefined() && left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(
            !left.is_undefined() && !right.is_undefined() && left != right,
        )),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => compare(op, left, right),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let ordering = match (left, right) {
        (Value::Undefined, _) | (_, Value::Undefined) => return Ok(Value::Bool(false)),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => return Err(binary_type_mismatch(op, left.type_name(), right.type_name())),
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let (a, b) = match (left, right) {
        (Value::Undefined, _) | (_, Value::Undefined) => return Ok(Value::Undefined),
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => return Err(binary_type_mismatch(op, left.type_name(), right.type_name())),
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return Err(division_by_zero()),
        BinaryOp::Div => a / b,
        BinaryOp::Rem if b == 0.0 => return Err(division_by_zero()),
        _ => a % b,
    };
    Ok(Value::Number(result))
}
