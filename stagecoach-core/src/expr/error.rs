//! Expression errors

use thiserror::Error;

/// Failure to parse or evaluate an expression
///
/// Every variant carries the expression text so callers can report which
/// rule or parameter was at fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error in '{expression}': {message}")]
    Syntax { expression: String, message: String },

    #[error("undeclared reference to '{name}' in '{expression}'")]
    Undeclared { expression: String, name: String },

    #[error("no such key: {key} (in '{expression}')")]
    NoSuchKey { expression: String, key: String },

    #[error("no such overload in '{expression}': {message}")]
    NoSuchOverload { expression: String, message: String },

    #[error("failed to evaluate '{expression}': {message}")]
    Evaluation { expression: String, message: String },

    #[error("expression must return a string, '{expression}' returned {kind}")]
    NotAString { expression: String, kind: String },

    #[error("failed to build expression context: {0}")]
    Document(String),
}

impl ExprError {
    /// The expression that failed, when there is one
    pub fn expression(&self) -> Option<&str> {
        match self {
            ExprError::Syntax { expression, .. }
            | ExprError::Undeclared { expression, .. }
            | ExprError::NoSuchKey { expression, .. }
            | ExprError::NoSuchOverload { expression, .. }
            | ExprError::Evaluation { expression, .. }
            | ExprError::NotAString { expression, .. } => Some(expression),
            ExprError::Document(_) => None,
        }
    }
}
