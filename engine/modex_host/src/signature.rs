//! Function signatures.
//!
//! A signature is written `<params:return>`, e.g. `<s-n?:s>`. Type symbols:
//!
//! | symbol | accepts |
//! |--------|---------|
//! | `b` | boolean |
//! | `n` | number |
//! | `s` | string |
//! | `l` | null |
//! | `a` | array (non-arrays are wrapped) |
//! | `o` | object |
//! | `f` | function |
//! | `j` | any JSON value (not a function) |
//! | `x` | anything |
//!
//! `(sn)` is a union. `a<s>` constrains array elements, `f<n:n>` documents a
//! function's own signature. A type may be followed by one modifier: `?`
//! (optional), `+` (one or more) or `-` (use the current input when the
//! argument is missing).
//!
//! The return type is parsed but never checked.

use std::fmt;

use crate::errors::EvalError;
use crate::value::Value;

/// Failure to parse or satisfy a signature.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature `{signature}` at offset {offset}: {reason}")]
    Malformed {
        signature: String,
        offset: usize,
        reason: String,
    },
    #[error("arguments do not match `{signature}`: {reason}")]
    Mismatch { signature: String, reason: String },
}

impl From<SignatureError> for EvalError {
    fn from(err: SignatureError) -> Self {
        EvalError::new(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    Boolean,
    Number,
    String,
    Null,
    Array(Option<Box<ParamType>>),
    Object,
    /// Function, with its own `<...>` signature text if one was given.
    Function(Option<String>),
    Json,
    Any,
    Union(Vec<ParamType>),
}

impl ParamType {
    fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol {
            'b' => ParamType::Boolean,
            'n' => ParamType::Number,
            's' => ParamType::String,
            'l' => ParamType::Null,
            'a' => ParamType::Array(None),
            'o' => ParamType::Object,
            'f' => ParamType::Function(None),
            'j' => ParamType::Json,
            'x' => ParamType::Any,
            _ => return None,
        })
    }

    /// Whether `value` is accepted as-is.
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Undefined)
            | (ParamType::Any, _)
            | (ParamType::Boolean, Value::Bool(_))
            | (ParamType::Number, Value::Number(_))
            | (ParamType::String, Value::Str(_))
            | (ParamType::Null, Value::Null)
            | (ParamType::Object, Value::Object(_))
            | (ParamType::Function(_), Value::Function(_)) => true,
            (ParamType::Json, value) => !matches!(value, Value::Function(_)),
            (ParamType::Array(element), Value::Array(items)) => match element {
                Some(element) => items.iter().all(|item| element.accepts(item)),
                None => true,
            },
            // A lone value is wrapped into a one-element array.
            (ParamType::Array(element), value) => match element {
                Some(element) => element.accepts(value),
                None => !matches!(value, Value::Function(_)),
            },
            (ParamType::Union(members), value) => members.iter().any(|m| m.accepts(value)),
            _ => false,
        }
    }

    /// Apply the conversions a matching argument goes through.
    fn coerce(&self, value: Value) -> Value {
        match (self, &value) {
            (ParamType::Array(_), Value::Array(_) | Value::Undefined) => value,
            (ParamType::Array(_), _) => Value::array(vec![value]),
            _ => value,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Boolean => write!(f, "b"),
            ParamType::Number => write!(f, "n"),
            ParamType::String => write!(f, "s"),
            ParamType::Null => write!(f, "l"),
            ParamType::Array(None) => write!(f, "a"),
            ParamType::Array(Some(element)) => write!(f, "a<{element}>"),
            ParamType::Object => write!(f, "o"),
            ParamType::Function(None) => write!(f, "f"),
            ParamType::Function(Some(signature)) => write!(f, "f{signature}"),
            ParamType::Json => write!(f, "j"),
            ParamType::Any => write!(f, "x"),
            ParamType::Union(members) => {
                write!(f, "(")?;
                for member in members {
                    write!(f, "{member}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub ty: ParamType,
    /// `?`
    pub optional: bool,
    /// `+`
    pub variadic: bool,
    /// `-`
    pub context: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    source: String,
    pub params: Vec<Param>,
    pub returns: Option<ParamType>,
}

impl Signature {
    pub fn parse(source: &str) -> Result<Signature, SignatureError> {
        let mut parser = SignatureParser {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        };
        parser.signature()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match `args` against the parameters and return the argument vector
    /// the implementation should receive.
    ///
    /// Missing optional arguments are filled with `Value::Undefined`, `-`
    /// parameters fall back to `context`, and non-array values given for an
    /// `a` parameter are wrapped. Arguments matched by a `+` parameter stay
    /// separate.
    pub fn validate(&self, args: Vec<Value>, context: &Value) -> Result<Vec<Value>, SignatureError> {
        let mut out = Vec::with_capacity(self.params.len());
        if self.match_from(0, &args, 0, context, &mut out) {
            return Ok(out);
        }
        Err(SignatureError::Mismatch {
            signature: self.source.clone(),
            reason: self.explain_mismatch(&args),
        })
    }

    fn match_from(
        &self,
        param_idx: usize,
        args: &[Value],
        arg_idx: usize,
        context: &Value,
        out: &mut Vec<Value>,
    ) -> bool {
        let Some(param) = self.params.get(param_idx) else {
            return arg_idx == args.len();
        };
        let mark = out.len();

        if param.variadic {
            let run = args[arg_idx..]
                .iter()
                .take_while(|arg| param.ty.accepts(arg))
                .count();
            for take in (1..=run).rev() {
                out.extend(
                    args[arg_idx..arg_idx + take]
                        .iter()
                        .map(|arg| param.ty.coerce(arg.clone())),
                );
                if self.match_from(param_idx + 1, args, arg_idx + take, context, out) {
                    return true;
                }
                out.truncate(mark);
            }
        } else if let Some(arg) = args.get(arg_idx) {
            if param.ty.accepts(arg) {
                out.push(param.ty.coerce(arg.clone()));
                if self.match_from(param_idx + 1, args, arg_idx + 1, context, out) {
                    return true;
                }
                out.truncate(mark);
            }
        }

        if param.context && param.ty.accepts(context) {
            out.push(param.ty.coerce(context.clone()));
            if self.match_from(param_idx + 1, args, arg_idx, context, out) {
                return true;
            }
            out.truncate(mark);
        }

        if param.optional {
            out.push(Value::Undefined);
            if self.match_from(param_idx + 1, args, arg_idx, context, out) {
                return true;
            }
            out.truncate(mark);
        }

        false
    }

    fn explain_mismatch(&self, args: &[Value]) -> String {
        for (idx, arg) in args.iter().enumerate() {
            match self.params.get(idx) {
                Some(param) if !param.ty.accepts(arg) => {
                    return format!(
                        "argument {} is {}, expected {}",
                        idx + 1,
                        arg.type_name(),
                        param.ty
                    );
                }
                None if !self.params.iter().any(|p| p.variadic) => {
                    return format!(
                        "expected at most {} arguments, got {}",
                        self.params.len(),
                        args.len()
                    );
                }
                _ => {}
            }
        }
        let required = self
            .params
            .iter()
            .filter(|p| !p.optional && !p.context)
            .count();
        format!("expected at least {required} arguments, got {}", args.len())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct SignatureParser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl SignatureParser<'_> {
    fn error(&self, reason: impl Into<String>) -> SignatureError {
        SignatureError::Malformed {
            signature: self.source.to_owned(),
            offset: self.offset(),
            reason: reason.into(),
        }
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |(offset, _)| *offset)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), SignatureError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected `{expected}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{expected}`, found end of input"))),
        }
    }

    fn signature(&mut self) -> Result<Signature, SignatureError> {
        self.expect('<')?;
        let mut params = Vec::new();
        while !matches!(self.peek(), Some(':' | '>') | None) {
            params.push(self.param()?);
        }
        let returns = if self.peek() == Some(':') {
            self.pos += 1;
            Some(self.param_type()?)
        } else {
            None
        };
        self.expect('>')?;
        if self.peek().is_some() {
            return Err(self.error("trailing input after signature"));
        }
        Ok(Signature {
            source: self.source.to_owned(),
            params,
            returns,
        })
    }

    fn param(&mut self) -> Result<Param, SignatureError> {
        let ty = self.param_type()?;
        let mut param = Param {
            ty,
            optional: false,
            variadic: false,
            context: false,
        };
        match self.peek() {
            Some('?') => param.optional = true,
            Some('+') => param.variadic = true,
            Some('-') => param.context = true,
            _ => return Ok(param),
        }
        self.pos += 1;
        Ok(param)
    }

    fn param_type(&mut self) -> Result<ParamType, SignatureError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let mut members = Vec::new();
                while self.peek() != Some(')') {
                    if self.peek().is_none() {
                        return Err(self.error("unterminated union"));
                    }
                    members.push(self.param_type()?);
                }
                self.pos += 1;
                if members.is_empty() {
                    return Err(self.error("empty union"));
                }
                Ok(ParamType::Union(members))
            }
            Some(symbol) => {
                let Some(ty) = ParamType::from_symbol(symbol) else {
                    return Err(self.error(format!("unknown type symbol `{symbol}`")));
                };
                self.pos += 1;
                if self.peek() != Some('<') {
                    return Ok(ty);
                }
                match ty {
                    ParamType::Array(_) => {
                        self.pos += 1;
                        let element = self.param_type()?;
                        self.expect('>')?;
                        Ok(ParamType::Array(Some(Box::new(element))))
                    }
                    ParamType::Function(_) => Ok(ParamType::Function(Some(self.function_subtype()?))),
                    _ => Err(self.error(format!("type `{symbol}` does not take a subtype"))),
                }
            }
            None => Err(self.error("expected a type")),
        }
    }

    /// Consume a balanced `<...>` and return the text including the brackets.
    fn function_subtype(&mut self) -> Result<String, SignatureError> {
        let start = self.offset();
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some('<') => depth += 1,
                Some('>') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(_) => {}
                None => return Err(self.error("unterminated function subtype")),
            }
        }
        let inner = &self.source[start..self.offset()];
        if inner.len() <= 2 {
            return Err(self.error("empty function subtype"));
        }
        Ok(inner.to_owned())
    }
}

#[cfg(test)]
mod tests;
