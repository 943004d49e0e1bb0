//! Validation matcher registry
//!
//! Matcher expressions take the form `@name(param, …)@` and assert a
//! property of a value instead of comparing it literally. Loop conditions
//! may be matcher expressions; the engine then matches the current index
//! value and treats a successful match as a true condition.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{EngineError, Result};

/// A pluggable value matcher.
///
/// `validate` returns `Ok(())` when the value satisfies the matcher and a
/// [`EngineError::Validation`] describing the mismatch otherwise.
pub trait ValidationMatcher: Send + Sync {
    fn validate(&self, field: &str, value: &str, params: &[String]) -> Result<()>;
}

impl<F> ValidationMatcher for F
where
    F: Fn(&str, &str, &[String]) -> Result<()> + Send + Sync,
{
    fn validate(&self, field: &str, value: &str, params: &[String]) -> Result<()> {
        self(field, value, params)
    }
}

/// Is this string a matcher expression (`@name(...)@`)?
pub fn is_matcher_expression(expression: &str) -> bool {
    let trimmed = expression.trim();
    trimmed.starts_with('@') && trimmed.ends_with('@') && trimmed.len() > 2
}

/// Registry of validation matchers keyed by matcher name
#[derive(Clone)]
pub struct MatcherRegistry {
    matchers: HashMap<String, Arc<dyn ValidationMatcher>>,
}

impl MatcherRegistry {
    /// Create an empty registry with no matchers registered
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
        }
    }

    /// Register a matcher under the given name
    pub fn register(&mut self, name: &str, matcher: Arc<dyn ValidationMatcher>) {
        self.matchers.insert(name.to_string(), matcher);
    }

    /// Resolve a matcher expression against a value.
    ///
    /// `field` names the value for error messages (for loop conditions it
    /// is the index variable name). Fails when the expression is malformed,
    /// the matcher is unknown, or the match itself fails.
    pub fn resolve(&self, field: &str, value: &str, expression: &str) -> Result<()> {
        let (name, params) = parse_matcher_expression(expression)?;
        match self.matchers.get(&name) {
            Some(matcher) => matcher.validate(field, value, &params),
            None => Err(EngineError::Validation {
                name,
                value: value.to_string(),
                message: "no such validation matcher registered".to_string(),
            }),
        }
    }

    /// Attempt a match, mapping the outcome to a boolean.
    ///
    /// A failed match is an ordinary `false`; a malformed expression or an
    /// unknown matcher stays an error, since loop conditions must not spin
    /// forever on a typo.
    pub fn attempt(&self, field: &str, value: &str, expression: &str) -> Result<bool> {
        let (name, params) = parse_matcher_expression(expression)?;
        let matcher = self.matchers.get(&name).ok_or_else(|| EngineError::Validation {
            name: name.clone(),
            value: value.to_string(),
            message: "no such validation matcher registered".to_string(),
        })?;
        Ok(matcher.validate(field, value, &params).is_ok())
    }
}

impl Default for MatcherRegistry {
    /// Registry preloaded with the built-in matchers
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register(
            "greaterThan",
            Arc::new(|field: &str, value: &str, params: &[String]| {
                let (actual, bound) = numeric_pair("greaterThan", field, value, params)?;
                check("greaterThan", value, actual > bound, || {
                    format!("{field}={actual} is not greater than {bound}")
                })
            }),
        );
        registry.register(
            "lowerThan",
            Arc::new(|field: &str, value: &str, params: &[String]| {
                let (actual, bound) = numeric_pair("lowerThan", field, value, params)?;
                check("lowerThan", value, actual < bound, || {
                    format!("{field}={actual} is not lower than {bound}")
                })
            }),
        );
        registry.register(
            "contains",
            Arc::new(|_: &str, value: &str, params: &[String]| {
                let needle = single_param("contains", value, params)?;
                check("contains", value, value.contains(&needle), || {
                    format!("'{value}' does not contain '{needle}'")
                })
            }),
        );
        registry.register(
            "startsWith",
            Arc::new(|_: &str, value: &str, params: &[String]| {
                let prefix = single_param("startsWith", value, params)?;
                check("startsWith", value, value.starts_with(&prefix), || {
                    format!("'{value}' does not start with '{prefix}'")
                })
            }),
        );
        registry.register(
            "endsWith",
            Arc::new(|_: &str, value: &str, params: &[String]| {
                let suffix = single_param("endsWith", value, params)?;
                check("endsWith", value, value.ends_with(&suffix), || {
                    format!("'{value}' does not end with '{suffix}'")
                })
            }),
        );
        registry.register(
            "isNumber",
            Arc::new(|_: &str, value: &str, _: &[String]| {
                check("isNumber", value, value.trim().parse::<f64>().is_ok(), || {
                    format!("'{value}' is not a number")
                })
            }),
        );
        registry.register(
            "equalsIgnoreCase",
            Arc::new(|_: &str, value: &str, params: &[String]| {
                let expected = single_param("equalsIgnoreCase", value, params)?;
                check(
                    "equalsIgnoreCase",
                    value,
                    value.eq_ignore_ascii_case(&expected),
                    || format!("'{value}' does not equal '{expected}' ignoring case"),
                )
            }),
        );

        registry
    }
}

/// Split `@name(p1, p2)@` into name and parameter list.
fn parse_matcher_expression(expression: &str) -> Result<(String, Vec<String>)> {
    let trimmed = expression.trim();
    let inner = trimmed
        .strip_prefix('@')
        .and_then(|s| s.strip_suffix('@'))
        .ok_or_else(|| malformed(expression))?;

    let (name, params) = match inner.find('(') {
        Some(open) => {
            let close = inner.rfind(')').ok_or_else(|| malformed(expression))?;
            if close < open {
                return Err(malformed(expression));
            }
            let raw_params = &inner[open + 1..close];
            let params = if raw_params.trim().is_empty() {
                Vec::new()
            } else {
                raw_params
                    .split(',')
                    .map(|p| p.trim().trim_matches('\'').to_string())
                    .collect()
            };
            (inner[..open].trim().to_string(), params)
        }
        None => (inner.trim().to_string(), Vec::new()),
    };

    if name.is_empty() {
        return Err(malformed(expression));
    }
    Ok((name, params))
}

fn malformed(expression: &str) -> EngineError {
    EngineError::Validation {
        name: expression.to_string(),
        value: String::new(),
        message: "malformed validation matcher expression".to_string(),
    }
}

fn check(name: &str, value: &str, ok: bool, message: impl Fn() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(EngineError::Validation {
            name: name.to_string(),
            value: value.to_string(),
            message: message(),
        })
    }
}

fn single_param(name: &str, value: &str, params: &[String]) -> Result<String> {
    match params {
        [param] => Ok(param.clone()),
        _ => Err(EngineError::Validation {
            name: name.to_string(),
            value: value.to_string(),
            message: format!("expected exactly one parameter, got {}", params.len()),
        }),
    }
}

fn numeric_pair(name: &str, field: &str, value: &str, params: &[String]) -> Result<(i64, i64)> {
    let bound = single_param(name, value, params)?;
    let actual: i64 = value.trim().parse().map_err(|_| EngineError::Validation {
        name: name.to_string(),
        value: value.to_string(),
        message: format!("{field}='{value}' is not an integer"),
    })?;
    let bound: i64 = bound.trim().parse().map_err(|_| EngineError::Validation {
        name: name.to_string(),
        value: value.to_string(),
        message: format!("parameter '{bound}' is not an integer"),
    })?;
    Ok((actual, bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_matcher_expression() {
        assert!(is_matcher_expression("@greaterThan(5)@"));
        assert!(is_matcher_expression("  @isNumber()@  "));
        assert!(!is_matcher_expression("i gt 5"));
        assert!(!is_matcher_expression("@"));
    }

    #[test]
    fn test_greater_and_lower_than() {
        let registry = MatcherRegistry::default();
        assert!(registry.resolve("i", "7", "@greaterThan(5)@").is_ok());
        assert!(registry.resolve("i", "3", "@greaterThan(5)@").is_err());
        assert!(registry.resolve("i", "3", "@lowerThan(5)@").is_ok());
    }

    #[test]
    fn test_string_matchers() {
        let registry = MatcherRegistry::default();
        assert!(registry
            .resolve("v", "hello world", "@contains('world')@")
            .is_ok());
        assert!(registry
            .resolve("v", "hello world", "@startsWith('hello')@")
            .is_ok());
        assert!(registry
            .resolve("v", "hello world", "@endsWith('planet')@")
            .is_err());
        assert!(registry.resolve("v", "12.5", "@isNumber()@").is_ok());
        assert!(registry
            .resolve("v", "HELLO", "@equalsIgnoreCase('hello')@")
            .is_ok());
    }

    #[test]
    fn test_unknown_matcher() {
        let registry = MatcherRegistry::default();
        let err = registry.resolve("v", "x", "@bogus(1)@").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}
