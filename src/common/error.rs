//! Error types for the scenario engine
//!
//! Every failure an action or container can raise is an [`EngineError`].
//! Assert and Catch match on the coarse [`ErrorKind`] discriminant rather
//! than on exact variants, so external leaf actions can participate in
//! expected-failure handling without depending on engine internals.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the scenario engine
#[derive(Error, Debug)]
pub enum EngineError {
    // === Context / Variable Errors ===
    #[error("Unknown variable '{0}'")]
    UnresolvedVariable(String),

    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },

    // === Condition / Expression Errors ===
    #[error("Unable to evaluate expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("Validation matcher '{name}' failed for value '{value}': {message}")]
    Validation {
        name: String,
        value: String,
        message: String,
    },

    // === Action Errors ===
    #[error("Action '{name}' failed: {message}")]
    ActionFailed { name: String, message: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    // === Concurrency Errors ===
    #[error("Parallel container failed: {} of {total} actions raised errors", failures.len())]
    Parallel {
        failures: Vec<EngineError>,
        total: usize,
    },

    #[error("Timer '{timer_id}' failed on fire #{fire}: {cause}")]
    Timer {
        timer_id: String,
        fire: u64,
        cause: Box<EngineError>,
    },
}

/// Coarse error classification used by Assert and Catch to decide whether
/// a raised failure matches the expected kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    UnresolvedVariable,
    Function,
    Expression,
    Validation,
    ActionFailed,
    Assertion,
    Parallel,
    Timer,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedVariable => write!(f, "unresolved-variable"),
            Self::Function => write!(f, "function"),
            Self::Expression => write!(f, "expression"),
            Self::Validation => write!(f, "validation"),
            Self::ActionFailed => write!(f, "action-failed"),
            Self::Assertion => write!(f, "assertion"),
            Self::Parallel => write!(f, "parallel"),
            Self::Timer => write!(f, "timer"),
        }
    }
}

impl EngineError {
    /// Classify this error for expected-failure matching
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnresolvedVariable(_) => ErrorKind::UnresolvedVariable,
            Self::Function { .. } => ErrorKind::Function,
            Self::Expression { .. } => ErrorKind::Expression,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ActionFailed { .. } => ErrorKind::ActionFailed,
            Self::Assertion(_) => ErrorKind::Assertion,
            Self::Parallel { .. } => ErrorKind::Parallel,
            Self::Timer { .. } => ErrorKind::Timer,
        }
    }

    /// Create an action failure with the failing action's name
    pub fn action_failed(name: &str, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create an expression error
    pub fn expression(expression: &str, reason: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a function error
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
