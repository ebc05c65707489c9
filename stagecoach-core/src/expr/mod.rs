//! Expression evaluation
//!
//! A small, dynamically typed CEL dialect used for task rules (`if:`) and
//! task parameter values (`expr:`). Expressions are evaluated against two
//! bindings: `hook`, the triggering event as a JSON document, and `vars`,
//! convenience values derived from it.

mod context;
mod error;
mod evaluator;
mod lexer;
mod parser;
mod value;

pub use context::ExpressionContext;
pub use error::ExprError;
pub use value::Value;
