//! Runtime values.
//!
//! Values are cheap to clone: strings, arrays and objects sit behind `Arc`,
//! so handing a value to a native function or a lifecycle callback never
//! copies the underlying data.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ast::{ExprArena, ExprId};
use crate::function::HostFunction;

/// Insertion-ordered string-keyed map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Insert or replace, keeping the original position of a replaced key.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

/// Built-in functions, dispatched by enum rather than through a registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    String,
    Length,
    Uppercase,
    Lowercase,
    Count,
    Sum,
    Keys,
    Exists,
    Map,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Builtin::String,
            "length" => Builtin::Length,
            "uppercase" => Builtin::Uppercase,
            "lowercase" => Builtin::Lowercase,
            "count" => Builtin::Count,
            "sum" => Builtin::Sum,
            "keys" => Builtin::Keys,
            "exists" => Builtin::Exists,
            "map" => Builtin::Map,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::String => "string",
            Builtin::Length => "length",
            Builtin::Uppercase => "uppercase",
            Builtin::Lowercase => "lowercase",
            Builtin::Count => "count",
            Builtin::Sum => "sum",
            Builtin::Keys => "keys",
            Builtin::Exists => "exists",
            Builtin::Map => "map",
        }
    }
}

/// A lambda together with the bindings it closes over.
///
/// Captures are copied out of the defining scope, root frame excluded, so a
/// lambda stored in a frame never keeps that frame alive. Root bindings are
/// resolved through the calling frame.
pub struct LambdaValue {
    pub params: Vec<String>,
    pub body: ExprId,
    pub arena: Arc<ExprArena>,
    pub captures: Arc<FxHashMap<String, Value>>,
}

#[derive(Clone)]
pub enum FunctionValue {
    Builtin(Builtin),
    Lambda(Arc<LambdaValue>),
    Host(Arc<dyn HostFunction>),
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::Builtin(builtin) => builtin.name(),
            FunctionValue::Lambda(_) => "lambda",
            FunctionValue::Host(host) => host.name(),
        }
    }

    fn same_function(&self, other: &FunctionValue) -> bool {
        match (self, other) {
            (FunctionValue::Builtin(a), FunctionValue::Builtin(b)) => a == b,
            (FunctionValue::Lambda(a), FunctionValue::Lambda(b)) => Arc::ptr_eq(a, b),
            (FunctionValue::Host(a), FunctionValue::Host(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionValue::Builtin(builtin) => write!(f, "Builtin(${})", builtin.name()),
            FunctionValue::Lambda(lambda) => write!(f, "Lambda({:?})", lambda.params),
            FunctionValue::Host(host) => write!(f, "Host({})", host.name()),
        }
    }
}

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value, e.g. navigating a missing field.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<Object>),
    Function(FunctionValue),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Wrap a native function as a callable value.
    pub fn host(function: impl HostFunction + 'static) -> Self {
        Value::Function(FunctionValue::Host(Arc::new(function)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => items.iter().any(Value::is_truthy),
            Value::Object(object) => !object.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Convert to JSON. Functions and undefined become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(object) => serde_json::Value::Object(
                object
                    .iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.to_owned(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same_function(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Function(function) => write!(f, "{function:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Strings display raw; everything else displays as JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Undefined | Value::Function(_) => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

#[cfg(test)]
mod tests;
