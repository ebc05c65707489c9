//! Evaluation context bound to a triggering event

use std::collections::BTreeMap;

use tracing::debug;

use super::error::ExprError;
use super::evaluator::Evaluator;
use super::value::{Value, format_number};
use crate::hook::Hook;

pub const HOOK_BINDING: &str = "hook";
pub const VARS_BINDING: &str = "vars";

pub const COMMIT_SHA_VAR: &str = "CI_COMMIT_SHA";
pub const COMMIT_SHORT_SHA_VAR: &str = "CI_COMMIT_SHORT_SHA";
pub const COMMIT_BRANCH_VAR: &str = "CI_COMMIT_BRANCH";

const SHORT_SHA_LEN: usize = 7;

/// Bindings that rule guards and parameter expressions are evaluated against
#[derive(Debug, Clone)]
pub struct ExpressionContext {
    bindings: BTreeMap<String, Value>,
}

impl ExpressionContext {
    /// Builds a context from a typed hook, deriving `vars` from it
    pub fn new(hook: &Hook) -> Result<Self, ExprError> {
        let document = hook
            .to_document()
            .map_err(|e| ExprError::Document(e.to_string()))?;
        let mut context = Self::from_document(document);
        context
            .bindings
            .insert(VARS_BINDING.to_string(), Value::from(derive_vars(hook)));
        Ok(context)
    }

    /// Builds a context from an arbitrary event document
    ///
    /// No `vars` are derived; the binding is present but null.
    pub fn from_document(document: serde_json::Value) -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(HOOK_BINDING.to_string(), Value::from(document));
        bindings.insert(VARS_BINDING.to_string(), Value::Null);
        Self { bindings }
    }

    pub fn evaluate(&self, expression: &str) -> Result<Value, ExprError> {
        debug!(expression, "evaluating expression");
        Evaluator::new(expression, &self.bindings).run()
    }

    /// Evaluates an expression that must produce text
    ///
    /// Strings pass through; doubles are rendered in general numeric form.
    pub fn evaluate_to_string(&self, expression: &str) -> Result<String, ExprError> {
        match self.evaluate(expression)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(format_number(n)),
            other => Err(ExprError::NotAString {
                expression: expression.to_string(),
                kind: other.kind().to_string(),
            }),
        }
    }
}

fn derive_vars(hook: &Hook) -> BTreeMap<String, String> {
    let (sha, git_ref) = match hook {
        Hook::Push(push) => (push.commit_sha(), push.git_ref.as_str()),
        Hook::PullRequest(pr) => (
            pr.pull_request.head.sha.as_str(),
            pr.pull_request.head.git_ref.as_str(),
        ),
    };

    let short_sha: String = sha.chars().take(SHORT_SHA_LEN).collect();
    let branch = git_ref.rsplit('/').next().unwrap_or(git_ref);

    let mut vars = BTreeMap::new();
    vars.insert(COMMIT_SHA_VAR.to_string(), sha.to_string());
    vars.insert(COMMIT_SHORT_SHA_VAR.to_string(), short_sha);
    vars.insert(COMMIT_BRANCH_VAR.to_string(), branch.to_string());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::fixtures::{PULL_REQUEST, PUSH};

    fn push_context() -> ExpressionContext {
        ExpressionContext::new(&Hook::parse("push", PUSH.as_bytes()).unwrap()).unwrap()
    }

    fn pull_request_context() -> ExpressionContext {
        ExpressionContext::new(&Hook::parse("pull_request", PULL_REQUEST.as_bytes()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_evaluate_string_field() {
        let ctx = pull_request_context();
        assert_eq!(ctx.evaluate_to_string("hook.action").unwrap(), "opened");
    }

    #[test]
    fn test_evaluate_number_to_string() {
        let ctx = pull_request_context();
        assert_eq!(
            ctx.evaluate_to_string("hook.pull_request.number").unwrap(),
            "2"
        );
    }

    #[test]
    fn test_evaluate_fractional_and_large_numbers_to_string() {
        let ctx = pull_request_context();
        let cases = [
            ("hook.pull_request.number / 4", "0.5"),
            ("hook.pull_request.number + 0.25", "2.25"),
            ("hook.pull_request.number * 1000000", "2e+06"),
            ("hook.pull_request.number * 123456", "246912"),
            ("-hook.pull_request.number / 3", "-0.6666666666666666"),
        ];
        for (expression, want) in cases {
            assert_eq!(
                ctx.evaluate_to_string(expression).unwrap(),
                want,
                "expression {}",
                expression
            );
        }
    }

    #[test]
    fn test_evaluate_bool_to_string_fails() {
        let ctx = pull_request_context();
        let err = ctx
            .evaluate_to_string("hook.action == 'opened'")
            .unwrap_err();
        assert!(matches!(err, ExprError::NotAString { ref kind, .. } if kind == "bool"));
        assert!(err.to_string().contains("expression must return a string"));
    }

    #[test]
    fn test_evaluate_missing_key() {
        let ctx = pull_request_context();
        let err = ctx.evaluate("hook.unknown").unwrap_err();
        assert!(err.to_string().contains("no such key: unknown"));
    }

    #[test]
    fn test_evaluate_syntax_error() {
        let ctx = pull_request_context();
        assert!(matches!(
            ctx.evaluate("body.value = 'testing'"),
            Err(ExprError::Syntax { .. })
        ));
    }

    #[test]
    fn test_push_vars() {
        let ctx = push_context();
        assert_eq!(
            ctx.evaluate_to_string("vars.CI_COMMIT_SHA").unwrap(),
            "6113728f27ae82c7b1a177c8d03f9e96e0adf246"
        );
        assert_eq!(
            ctx.evaluate_to_string("vars.CI_COMMIT_SHORT_SHA").unwrap(),
            "6113728"
        );
        assert_eq!(
            ctx.evaluate_to_string("vars.CI_COMMIT_BRANCH").unwrap(),
            "simple-tag"
        );
    }

    #[test]
    fn test_pull_request_vars() {
        let ctx = pull_request_context();
        assert_eq!(
            ctx.evaluate_to_string("vars.CI_COMMIT_SHORT_SHA").unwrap(),
            "ec26c3e"
        );
        assert_eq!(
            ctx.evaluate_to_string("vars.CI_COMMIT_BRANCH").unwrap(),
            "changes"
        );
    }

    #[test]
    fn test_document_context_has_no_vars() {
        let ctx = ExpressionContext::from_document(serde_json::json!({ "ref": "main" }));
        assert_eq!(ctx.evaluate(VARS_BINDING).unwrap(), Value::Null);
        assert_eq!(ctx.evaluate_to_string("hook.ref").unwrap(), "main");
    }
}
