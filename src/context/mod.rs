//! Mutable per-run execution state
//!
//! A [`TestContext`] is created once per scenario run and handed to every
//! action. It holds the shared variable map, the timer registry, the list
//! of errors raised by forked work, and the active-action pointer used for
//! diagnostics. Cloning a context is cheap and yields a handle onto the
//! same state; [`TestContext::fork_isolated`] produces a detached copy for
//! template isolation.

pub mod functions;
pub mod matcher;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use crate::common::{EngineError, Result};
use functions::{FunctionRegistry, FUNCTION_PREFIX};
use matcher::MatcherRegistry;

/// Resolution depth bound; guards self-referential variable values.
const MAX_RESOLUTION_DEPTH: usize = 32;

/// Handle to a running timer, registered so external code can stop the
/// timer by id without owning it.
pub trait StopTimer: Send + Sync {
    fn stop(&self);
}

/// Run-scoped state shared by every action of a scenario.
#[derive(Clone)]
pub struct TestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    /// Scenario variables. Conventionally single-writer; the lock only
    /// keeps the map memory-safe when Parallel or Async fan out.
    variables: Mutex<HashMap<String, Value>>,
    /// Functions available to dynamic content resolution, shared read-only
    functions: Arc<FunctionRegistry>,
    /// Validation matchers available to conditions, shared read-only
    matchers: Arc<MatcherRegistry>,
    /// Timers registered for external cancellation by id
    timers: Mutex<HashMap<String, Arc<dyn StopTimer>>>,
    /// Errors raised by forked work, drained by the owning run
    async_errors: Mutex<Vec<EngineError>>,
    /// Name of the action currently executing, for diagnostics only
    active_action: Mutex<Option<String>>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Create a context with the built-in function and matcher registries
    pub fn new() -> Self {
        ContextBuilder::new().build()
    }

    /// Start building a context with custom registries
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    fn from_parts(
        variables: HashMap<String, Value>,
        functions: Arc<FunctionRegistry>,
        matchers: Arc<MatcherRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                variables: Mutex::new(variables),
                functions,
                matchers,
                timers: Mutex::new(HashMap::new()),
                async_errors: Mutex::new(Vec::new()),
                active_action: Mutex::new(None),
            }),
        }
    }

    /// Create an isolated child context.
    ///
    /// Variables are copied, function and matcher registries are shared by
    /// reference, and the timer registry and async-error list start empty.
    /// Mutations inside the child never propagate back to the caller.
    pub fn fork_isolated(&self) -> Self {
        let variables = self.inner.variables.lock().unwrap().clone();
        Self::from_parts(
            variables,
            Arc::clone(&self.inner.functions),
            Arc::clone(&self.inner.matchers),
        )
    }

    // === Variables ===

    /// Set a variable, overwriting any previous value
    pub fn set_variable(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        debug!(name, %value, "setting variable");
        self.inner
            .variables
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    /// Get a variable's value, failing when it is not set
    pub fn get_variable(&self, name: &str) -> Result<Value> {
        self.inner
            .variables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnresolvedVariable(name.to_string()))
    }

    /// Get a variable's value converted to its string representation
    pub fn get_variable_string(&self, name: &str) -> Result<String> {
        self.get_variable(name).map(|v| value_to_string(&v))
    }

    /// Whether the variable is currently set
    pub fn has_variable(&self, name: &str) -> bool {
        self.inner.variables.lock().unwrap().contains_key(name)
    }

    /// Snapshot of all variables, mostly useful for reporting
    pub fn variables(&self) -> HashMap<String, Value> {
        self.inner.variables.lock().unwrap().clone()
    }

    // === Dynamic content ===

    /// Registry of functions usable in dynamic content
    pub fn function_registry(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    /// Registry of validation matchers usable in conditions
    pub fn matcher_registry(&self) -> &MatcherRegistry {
        &self.inner.matchers
    }

    /// Resolve all dynamic content in a string.
    ///
    /// `${name}` placeholders are substituted with the variable's string
    /// representation, recursively, so variable values may themselves
    /// contain placeholders. `fn:name(arg, …)` calls are then resolved
    /// through the function registry with already-resolved arguments.
    /// Fails with [`EngineError::UnresolvedVariable`] on unknown variables
    /// and [`EngineError::Function`] on unknown or failing functions.
    pub fn resolve_dynamic_content(&self, input: &str) -> Result<String> {
        let resolved = self.replace_variables(input, 0)?;
        self.replace_functions(&resolved)
    }

    fn replace_variables(&self, input: &str, depth: usize) -> Result<String> {
        if depth > MAX_RESOLUTION_DEPTH {
            return Err(EngineError::UnresolvedVariable(format!(
                "resolution depth exceeded while expanding '{input}'"
            )));
        }
        if !input.contains("${") {
            return Ok(input.to_string());
        }

        let mut output = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("${") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                EngineError::UnresolvedVariable(format!("unterminated placeholder in '{input}'"))
            })?;
            let name = &after[..end];
            let value = self.get_variable_string(name)?;
            output.push_str(&self.replace_variables(&value, depth + 1)?);
            rest = &after[end + 1..];
        }
        output.push_str(rest);
        Ok(output)
    }

    fn replace_functions(&self, input: &str) -> Result<String> {
        if !input.contains(FUNCTION_PREFIX) {
            return Ok(input.to_string());
        }

        let mut output = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find(FUNCTION_PREFIX) {
            output.push_str(&rest[..start]);
            let call = &rest[start + FUNCTION_PREFIX.len()..];

            let open = call.find('(').ok_or_else(|| {
                EngineError::function(call, "missing '(' in function call")
            })?;
            let name = call[..open].trim();
            let (raw_args, consumed) = read_balanced(&call[open..])
                .ok_or_else(|| EngineError::function(name, "unbalanced parentheses in call"))?;

            let mut args = Vec::new();
            for raw in split_top_level(&raw_args) {
                let arg = raw.trim().trim_matches('\'');
                args.push(self.resolve_dynamic_content(arg)?);
            }

            output.push_str(&self.inner.functions.invoke(name, &args)?);
            rest = &call[open + consumed..];
        }
        output.push_str(rest);
        Ok(output)
    }

    // === Timers ===

    /// Register a running timer for external cancellation
    pub fn register_timer(&self, timer_id: &str, timer: Arc<dyn StopTimer>) {
        let previous = self
            .inner
            .timers
            .lock()
            .unwrap()
            .insert(timer_id.to_string(), timer);
        if previous.is_some() {
            warn!(timer_id, "timer id registered twice, replacing handle");
        }
    }

    /// Stop the timer registered under `timer_id`.
    ///
    /// Returns false when no such timer is registered.
    pub fn stop_timer(&self, timer_id: &str) -> bool {
        let timer = self.inner.timers.lock().unwrap().get(timer_id).cloned();
        match timer {
            Some(timer) => {
                debug!(timer_id, "stopping timer");
                timer.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every registered timer
    pub fn stop_timers(&self) {
        let timers: Vec<_> = self.inner.timers.lock().unwrap().values().cloned().collect();
        for timer in timers {
            timer.stop();
        }
    }

    // === Async errors ===

    /// Append an error raised by forked work
    pub fn push_async_error(&self, error: EngineError) {
        warn!(%error, "queuing error from forked work");
        self.inner.async_errors.lock().unwrap().push(error);
    }

    /// Whether forked work has raised any errors so far
    pub fn has_async_errors(&self) -> bool {
        !self.inner.async_errors.lock().unwrap().is_empty()
    }

    /// Drain all queued async errors.
    ///
    /// A run that launched Async or forked Timer work must call this (or
    /// [`Self::has_async_errors`]) before declaring completion; errors left
    /// in the list are otherwise lost.
    pub fn take_async_errors(&self) -> Vec<EngineError> {
        std::mem::take(&mut *self.inner.async_errors.lock().unwrap())
    }

    // === Diagnostics ===

    /// Record the action currently executing
    pub fn set_active_action(&self, name: &str) {
        *self.inner.active_action.lock().unwrap() = Some(name.to_string());
    }

    /// Name of the most recently started action, if any
    pub fn active_action(&self) -> Option<String> {
        self.inner.active_action.lock().unwrap().clone()
    }
}

/// String representation used for substitution: strings verbatim,
/// everything else through its JSON rendering.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a balanced `(...)` group starting at the opening parenthesis.
///
/// Returns the inner text and the number of bytes consumed including both
/// parentheses.
fn read_balanced(input: &str) -> Option<(String, usize)> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((input[1..i].to_string(), i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Builder wiring custom registries into a fresh context
pub struct ContextBuilder {
    functions: FunctionRegistry,
    matchers: MatcherRegistry,
    variables: HashMap<String, Value>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::default(),
            matchers: MatcherRegistry::default(),
            variables: HashMap::new(),
        }
    }

    /// Replace the function registry
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Replace the matcher registry
    pub fn matchers(mut self, matchers: MatcherRegistry) -> Self {
        self.matchers = matchers;
        self
    }

    /// Pre-set a variable
    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> TestContext {
        TestContext::from_parts(
            self.variables,
            Arc::new(self.functions),
            Arc::new(self.matchers),
        )
    }
}
