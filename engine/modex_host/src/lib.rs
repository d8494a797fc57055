//! Modex Host - Reference evaluator for modex expressions.
//!
//! A small tree-walking evaluator for a JSON query language. It presents the
//! surface the module system builds on:
//!
//! - `Expression::compile` turns text into an executable expression
//! - `Expression::register_function` registers native functions, optionally
//!   guarded by a `Signature`
//! - `Expression::assign` writes into the expression's static root frame
//! - `Frame` is the per-scope binding context, with a write-once
//!   `FrameInterposer` slot for intercepting `bind`/`lookup`
//! - before and after every node the evaluator invokes the callbacks bound at
//!   `EVALUATE_ENTRY` and `EVALUATE_EXIT`

pub mod ast;
mod builtins;
pub mod errors;
mod evaluator;
mod expression;
mod frame;
mod function;
pub mod lexer;
pub mod parser;
pub mod signature;
mod stack;
mod value;

pub use errors::{EvalError, EvalErrorKind, EvalResult, ParseError};
pub use evaluator::{evaluate, evaluate_binary, EVALUATE_ENTRY, EVALUATE_EXIT};
pub use expression::Expression;
pub use frame::{Frame, FrameId, FrameInterposer, InterposerOccupied, RawFrame, WeakFrame};
pub use function::{Focus, HostFunction, NativeFn, NativeFunction};
pub use signature::{Signature, SignatureError};
pub use value::{Builtin, FunctionValue, LambdaValue, Object, Value};
