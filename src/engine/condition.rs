//! Boolean conditions driving loops and branches
//!
//! A condition is either a raw expression string, re-resolved against the
//! context before every test, or a pluggable predicate over
//! `(index, context)`. Expression conditions used inside loops support
//! literal index-token substitution (`i lt= 3`), validation-matcher
//! expressions (`@lowerThan(5)@`, matched against the current index), and
//! full dynamic-content resolution before hitting the boolean evaluator.

use std::sync::Arc;

use crate::common::Result;
use crate::context::matcher::is_matcher_expression;
use crate::context::TestContext;
use crate::engine::eval;

/// Pluggable predicate form of a condition
pub type Predicate = dyn Fn(i64, &TestContext) -> bool + Send + Sync;

/// Termination or branch condition
#[derive(Clone)]
pub enum Condition {
    /// Expression string, resolved against the context on every test
    Expression(String),
    /// Predicate taking the current loop index and the context
    Predicate(Arc<Predicate>),
}

impl Condition {
    /// Condition from an expression string
    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression(expression.into())
    }

    /// Condition from a predicate closure
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(i64, &TestContext) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Test the condition for a loop iteration.
    ///
    /// Standalone occurrences of `index_name` in an expression (and
    /// `${index_name}` placeholders) are replaced by the literal index
    /// value first; the token is never rewritten inside longer identifiers
    /// such as other variable names or matcher names. Matcher expressions
    /// are then attempted against the index; a successful match counts as
    /// true, a failed match as false. Anything else goes through
    /// dynamic-content resolution and the boolean evaluator.
    pub fn test_with_index(
        &self,
        index_name: &str,
        index: i64,
        context: &TestContext,
    ) -> Result<bool> {
        match self {
            Self::Predicate(predicate) => Ok(predicate(index, context)),
            Self::Expression(expression) => {
                let expression =
                    substitute_index(expression, index_name, &index.to_string());

                if is_matcher_expression(&expression) {
                    return context.matcher_registry().attempt(
                        index_name,
                        &index.to_string(),
                        &expression,
                    );
                }

                let resolved = context.resolve_dynamic_content(&expression)?;
                eval::evaluate(&resolved)
            }
        }
    }

    /// Test the condition for a branch (no loop index involved)
    pub fn test(&self, context: &TestContext) -> Result<bool> {
        match self {
            Self::Predicate(predicate) => Ok(predicate(0, context)),
            Self::Expression(expression) => {
                let resolved = context.resolve_dynamic_content(expression)?;
                eval::evaluate(&resolved)
            }
        }
    }
}

/// Replace the index token with its value, touching only standalone
/// occurrences: `i` in `i lt ${limit}` is substituted, the `i` inside
/// `limit` or `isNumber` is not. `${index_name}` placeholders are also
/// rewritten, since the index variable is only published once a pass runs.
fn substitute_index(expression: &str, index_name: &str, value: &str) -> String {
    let expression = expression.replace(&format!("${{{index_name}}}"), value);

    let mut output = String::with_capacity(expression.len());
    let mut rest = expression.as_str();
    while let Some(pos) = rest.find(index_name) {
        let before = rest[..pos].chars().next_back();
        let after = rest[pos + index_name.len()..].chars().next();
        let standalone =
            !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char);

        output.push_str(&rest[..pos]);
        output.push_str(if standalone { value } else { index_name });
        rest = &rest[pos + index_name.len()..];
    }
    output.push_str(rest);
    output
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expression(expression) => write!(f, "Condition::Expression({expression:?})"),
            Self::Predicate(_) => write!(f, "Condition::Predicate(..)"),
        }
    }
}

impl From<&str> for Condition {
    fn from(expression: &str) -> Self {
        Self::expression(expression)
    }
}

impl From<String> for Condition {
    fn from(expression: String) -> Self {
        Self::Expression(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_token_substitution() {
        let ctx = TestContext::new();
        let cond = Condition::expression("i lt= 3");

        assert!(cond.test_with_index("i", 1, &ctx).unwrap());
        assert!(cond.test_with_index("i", 3, &ctx).unwrap());
        assert!(!cond.test_with_index("i", 4, &ctx).unwrap());
    }

    #[test]
    fn test_matcher_condition() {
        let ctx = TestContext::new();
        let cond = Condition::expression("@greaterThan(2)@");

        assert!(!cond.test_with_index("i", 1, &ctx).unwrap());
        assert!(cond.test_with_index("i", 3, &ctx).unwrap());
    }

    #[test]
    fn test_unknown_matcher_is_fatal() {
        let ctx = TestContext::new();
        let cond = Condition::expression("@bogus(2)@");
        assert!(cond.test_with_index("i", 1, &ctx).is_err());
    }

    #[test]
    fn test_dynamic_content_in_condition() {
        let ctx = TestContext::new();
        ctx.set_variable("limit", 5);
        let cond = Condition::expression("i lt ${limit}");
        assert!(cond.test_with_index("i", 4, &ctx).unwrap());
        assert!(!cond.test_with_index("i", 5, &ctx).unwrap());
    }

    #[test]
    fn test_index_token_untouched_inside_other_identifiers() {
        // "limit" contains the index letter; only the standalone token is
        // substituted
        assert_eq!(substitute_index("i lt ${limit}", "i", "4"), "4 lt ${limit}");
        assert_eq!(substitute_index("@isNumber()@", "i", "4"), "@isNumber()@");
        assert_eq!(substitute_index("(i lt= 3) and (i gt 0)", "i", "2"), "(2 lt= 3) and (2 gt 0)");
        assert_eq!(substitute_index("${i} lt 3", "i", "2"), "2 lt 3");
        assert_eq!(substitute_index("retries lt i", "retries", "7"), "7 lt i");
    }

    #[test]
    fn test_matcher_condition_with_index_letter_in_name() {
        let ctx = TestContext::new();
        let cond = Condition::expression("@isNumber()@");
        assert!(cond.test_with_index("i", 3, &ctx).unwrap());
    }

    #[test]
    fn test_predicate_condition() {
        let ctx = TestContext::new();
        let cond = Condition::predicate(|index, _| index % 2 == 0);
        assert!(cond.test_with_index("i", 4, &ctx).unwrap());
        assert!(!cond.test_with_index("i", 5, &ctx).unwrap());
    }

    #[test]
    fn test_branch_condition() {
        let ctx = TestContext::new();
        ctx.set_variable("flag", "true");
        assert!(Condition::expression("${flag}").test(&ctx).unwrap());
        assert!(!Condition::expression("false").test(&ctx).unwrap());
    }

    #[test]
    fn test_malformed_branch_condition_is_fatal() {
        let ctx = TestContext::new();
        assert!(Condition::expression("1 zz 2").test(&ctx).is_err());
    }
}
