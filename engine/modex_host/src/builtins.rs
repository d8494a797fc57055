//! Built-in function dispatch.

use crate::errors::{type_mismatch, EvalResult};
use crate::evaluator::{Convention, Interpreter};
use crate::frame::Frame;
use crate::value::{Builtin, FunctionValue, Value};

impl Builtin {
    pub(crate) fn call(
        self,
        interpreter: &Interpreter<'_>,
        frame: &Frame,
        input: &Value,
        args: Vec<Value>,
    ) -> EvalResult {
        let mut args = args.into_iter();
        let first = args.next();
        match self {
            // `$string()` stringifies the current input.
            Builtin::String => match first.as_ref().unwrap_or(input) {
                Value::Undefined => Ok(Value::Undefined),
                Value::Str(s) => Ok(Value::Str(s.clone())),
                other => Ok(Value::string(other.to_string())),
            },
            Builtin::Length => match first.unwrap_or_default() {
                Value::Str(s) => Ok(Value::Number(char_count(&s))),
                Value::Undefined => Ok(Value::Undefined),
                other => Err(type_mismatch("string", other.type_name())),
            },
            Builtin::Uppercase => map_string(first, str::to_uppercase),
            Builtin::Lowercase => map_string(first, str::to_lowercase),
            Builtin::Count => Ok(Value::Number(match first.unwrap_or_default() {
                Value::Undefined => 0.0,
                Value::Array(items) => len_as_f64(items.len()),
                _ => 1.0,
            })),
            Builtin::Sum => {
                let items = match first.unwrap_or_default() {
                    Value::Undefined => return Ok(Value::Undefined),
                    Value::Array(items) => items.to_vec(),
                    other => vec![other],
                };
                let mut total = 0.0;
                for item in &items {
                    match item {
                        Value::Number(n) => total += n,
                        other => return Err(type_mismatch("number", other.type_name())),
                    }
                }
                Ok(Value::Number(total))
            }
            Builtin::Keys => {
                let mut keys: Vec<Value> = Vec::new();
                let mut push_keys = |value: &Value| {
                    if let Some(object) = value.as_object() {
                        for key in object.keys() {
                            if !keys.iter().any(|k| k.as_str() == Some(key)) {
                                keys.push(Value::string(key));
                            }
                        }
                    }
                };
                match first.unwrap_or_default() {
                    Value::Array(items) => items.iter().for_each(&mut push_keys),
                    other => push_keys(&other),
                }
                Ok(if keys.is_empty() {
                    Value::Undefined
                } else {
                    Value::array(keys)
                })
            }
            Builtin::Exists => Ok(Value::Bool(
                first.is_some_and(|value| !value.is_undefined()),
            )),
            Builtin::Map => {
                let items = match first.unwrap_or_default() {
                    Value::Undefined => return Ok(Value::Undefined),
                    Value::Array(items) => items.to_vec(),
                    other => vec![other],
                };
                let function = match args.next() {
                    Some(Value::Function(function)) => function,
                    Some(other) => return Err(type_mismatch("function", other.type_name())),
                    None => return Err(type_mismatch("function", "undefined")),
                };
                let array = Value::array(items.clone());
                let mut out = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    let call_args = map_arguments(&function, item, idx, &array);
                    let value =
                        interpreter.call_function(&function, Convention::Call, frame, input, call_args)?;
                    if !value.is_undefined() {
                        out.push(value);
                    }
                }
                Ok(Value::array(out))
            }
        }
    }
}

/// Lambdas receive as many of `(item, index, array)` as they declare;
/// everything else receives the item alone.
fn map_arguments(function: &FunctionValue, item: Value, idx: usize, array: &Value) -> Vec<Value> {
    match function {
        FunctionValue::Lambda(lambda) => {
            let mut args = vec![item, Value::Number(len_as_f64(idx)), array.clone()];
            args.truncate(lambda.params.len());
            args
        }
        FunctionValue::Builtin(_) | FunctionValue::Host(_) => vec![item],
    }
}

fn map_string(value: Option<Value>, f: impl Fn(&str) -> String) -> EvalResult {
    match value.unwrap_or_default() {
        Value::Str(s) => Ok(Value::string(f(&s))),
        Value::Undefined => Ok(Value::Undefined),
        other => Err(type_mismatch("string", other.type_name())),
    }
}

#[allow(clippy::cast_precision_loss)]
fn len_as_f64(len: usize) -> f64 {
    len as f64
}

fn char_count(s: &str) -> f64 {
    len_as_f64(s.chars().count())
}
