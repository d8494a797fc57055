//! Error types for compiling and evaluating expressions.
//!
//! `EvalErrorKind` gives each runtime failure a structured category; the
//! factory functions at the bottom of this file are the public way to build
//! one and keep `kind` and `message` in sync.
//!
//! Native functions and lifecycle callbacks that need to surface their own
//! typed errors wrap them with `EvalError::native`. The original error rides
//! along as the error `source` and can be recovered with `downcast_source`.

use std::error::Error;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::ast::{BinaryOp, Span};
use crate::value::Value;

/// Result of evaluating a node or calling a function.
pub type EvalResult = Result<Value, EvalError>;

/// Failure to turn source text into an expression tree.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }

    /// Render a human-readable report pointing into `source`.
    pub fn render(&self, source: &str) -> String {
        let mut out = Vec::new();
        let report = Report::<Range<usize>>::build(ReportKind::Error, (), self.span.range().start)
            .with_config(Config::default().with_color(false))
            .with_message(&self.message)
            .with_label(Label::new(self.span.range()).with_message(&self.message))
            .finish();
        if report.write(Source::from(source.to_owned()), &mut out).is_err() {
            return self.to_string();
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    NotCallable { type_name: String },
    BinaryTypeMismatch { op: BinaryOp, left: String, right: String },
    TypeMismatch { expected: String, got: String },
    DivisionByZero,
    ArgumentMismatch { function: String, reason: String },
    /// A foreign error raised by a native function or lifecycle callback.
    Native { message: String },
    Custom { message: String },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCallable { type_name } => write!(f, "{type_name} is not callable"),
            Self::BinaryTypeMismatch { op, left, right } => write!(
                f,
                "operator `{}` cannot be applied to {left} and {right}",
                op.as_symbol()
            ),
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ArgumentMismatch { function, reason } => {
                write!(f, "arguments of {function} do not match its signature: {reason}")
            }
            Self::Native { message } | Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Human-readable message, equal to `kind.to_string()`.
    pub message: String,
    /// Node being evaluated when the error was raised.
    pub span: Option<Span>,
    source: Option<Arc<dyn Error + Send + Sync>>,
}

impl EvalError {
    /// Create an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(EvalErrorKind::Custom { message })
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        EvalError {
            kind,
            message,
            span: None,
            source: None,
        }
    }

    /// Carry a foreign error through the evaluator's error channel.
    pub fn native<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let mut err = Self::from_kind(EvalErrorKind::Native {
            message: error.to_string(),
        });
        err.source = Some(Arc::new(error));
        err
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach `span` unless a more precise one is already recorded.
    #[must_use]
    pub fn span_if_missing(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// The foreign error this one carries, if it is a `T`.
    pub fn downcast_source<T: Error + 'static>(&self) -> Option<&T> {
        self.source.as_deref().and_then(|source| source.downcast_ref::<T>())
    }

    pub fn is_native(&self) -> bool {
        self.source.is_some()
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at {span}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for EvalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn Error + 'static))
    }
}

// Factory functions

pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_owned(),
    })
}

pub fn binary_type_mismatch(op: BinaryOp, left: &str, right: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::BinaryTypeMismatch {
        op,
        left: left.to_owned(),
        right: right.to_owned(),
    })
}

pub fn type_mismatch(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_owned(),
        got: got.to_owned(),
    })
}

pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

pub fn argument_mismatch(function: &str, reason: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArgumentMismatch {
        function: function.to_owned(),
        reason: reason.into(),
    })
}
