//! Function registry for dynamic content resolution
//!
//! Strings handed to the context may embed function calls of the form
//! `fn:name(arg1, arg2)`. Arguments are themselves resolved (placeholders
//! and nested functions) before the function runs, so
//! `fn:upperCase(${greeting})` works as expected.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{EngineError, Result};

/// Prefix marking a function call inside dynamic content
pub const FUNCTION_PREFIX: &str = "fn:";

/// A function callable from dynamic content.
///
/// Implementations must be stateless or internally synchronized; functions
/// may be invoked concurrently from parallel branches.
pub trait Function: Send + Sync {
    /// Apply the function to already-resolved arguments.
    fn execute(&self, args: &[String]) -> Result<String>;
}

impl<F> Function for F
where
    F: Fn(&[String]) -> Result<String> + Send + Sync,
{
    fn execute(&self, args: &[String]) -> Result<String> {
        self(args)
    }
}

/// Registry of functions available during dynamic content resolution
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Create an empty registry with no functions registered
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register a function under the given name
    pub fn register(&mut self, name: &str, function: Arc<dyn Function>) {
        self.functions.insert(name.to_string(), function);
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    /// Invoke the named function, failing when it is not registered
    pub fn invoke(&self, name: &str, args: &[String]) -> Result<String> {
        match self.functions.get(name) {
            Some(function) => function.execute(args),
            None => Err(EngineError::function(name, "no such function registered")),
        }
    }
}

impl Default for FunctionRegistry {
    /// Registry preloaded with the built-in function library
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register("concat", Arc::new(|args: &[String]| Ok(args.concat())));
        registry.register(
            "upperCase",
            Arc::new(|args: &[String]| single_arg("upperCase", args).map(|s| s.to_uppercase())),
        );
        registry.register(
            "lowerCase",
            Arc::new(|args: &[String]| single_arg("lowerCase", args).map(|s| s.to_lowercase())),
        );
        registry.register(
            "trim",
            Arc::new(|args: &[String]| single_arg("trim", args).map(|s| s.trim().to_string())),
        );
        registry.register(
            "length",
            Arc::new(|args: &[String]| {
                single_arg("length", args).map(|s| s.chars().count().to_string())
            }),
        );

        registry
    }
}

fn single_arg(name: &str, args: &[String]) -> Result<String> {
    match args {
        [value] => Ok(value.clone()),
        _ => Err(EngineError::function(
            name,
            format!("expected exactly one argument, got {}", args.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_functions() {
        let registry = FunctionRegistry::default();
        assert_eq!(
            registry
                .invoke("concat", &["foo".into(), "-".into(), "bar".into()])
                .unwrap(),
            "foo-bar"
        );
        assert_eq!(registry.invoke("upperCase", &["hello".into()]).unwrap(), "HELLO");
        assert_eq!(registry.invoke("lowerCase", &["HeLLo".into()]).unwrap(), "hello");
        assert_eq!(registry.invoke("trim", &["  x  ".into()]).unwrap(), "x");
        assert_eq!(registry.invoke("length", &["four".into()]).unwrap(), "4");
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::default();
        let err = registry.invoke("nope", &[]).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_wrong_arity() {
        let registry = FunctionRegistry::default();
        assert!(registry.invoke("upperCase", &[]).is_err());
        assert!(registry
            .invoke("trim", &["a".into(), "b".into()])
            .is_err());
    }
}
