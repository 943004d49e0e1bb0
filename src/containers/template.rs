//! Reusable parameterized flow

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{run_children, ActionContainer, ContainerState, SourceSpan, TestAction};

/// A named, reusable block of actions invoked with parameters.
///
/// Parameter values are resolved against the calling context, so a caller
/// can pass `${order_id}` and have its own variable flow in. By default the
/// body runs against an isolated fork of the context: variables the body
/// sets or overwrites never leak back to the caller. Opting into the global
/// context runs the body directly against the caller's state instead.
pub struct Template {
    name: String,
    description: Option<String>,
    span: Option<SourceSpan>,
    parameters: Vec<(String, String)>,
    global_context: bool,
    actions: Vec<Arc<dyn TestAction>>,
    state: ContainerState,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            span: None,
            parameters: Vec::new(),
            global_context: false,
            actions: Vec::new(),
            state: ContainerState::new(),
        }
    }

    /// Run the body directly against the caller's context, letting its
    /// variable writes persist after the invocation.
    pub fn global_context(mut self, global_context: bool) -> Self {
        self.global_context = global_context;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }

    /// Declares a parameter. The value may carry placeholders, function
    /// calls, or plain text; it is resolved at invocation time.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn action_arc(mut self, action: Arc<dyn TestAction>) -> Self {
        self.actions.push(action);
        self
    }
}

#[async_trait]
impl TestAction for Template {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let inner = if self.global_context {
            context.clone()
        } else {
            context.fork_isolated()
        };

        for (name, raw_value) in &self.parameters {
            // Resolved against the caller, bound into the execution scope
            let value = context.resolve_dynamic_content(raw_value)?;
            debug!(template = self.name, parameter = name, %value, "binding parameter");
            inner.set_variable(name, value);
        }

        run_children(self, &inner).await?;
        self.state.mark_done();
        Ok(())
    }

    fn as_container(&self) -> Option<&dyn ActionContainer> {
        Some(self)
    }
}

impl ActionContainer for Template {
    fn actions(&self) -> &[Arc<dyn TestAction>] {
        &self.actions
    }

    fn last_executed(&self) -> Option<Arc<dyn TestAction>> {
        self.state.last_executed()
    }

    fn set_last_executed(&self, action: Arc<dyn TestAction>) {
        self.state.set_last_executed(action);
    }

    fn is_done(&self, _context: &TestContext) -> bool {
        self.state.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CustomAction;

    #[tokio::test]
    async fn test_parameters_resolve_against_the_caller() {
        let ctx = TestContext::new();
        ctx.set_variable("customer", "acme");

        let template = Template::new("greet")
            .parameter("who", "${customer}")
            .action(CustomAction::new("check", |ctx| {
                assert_eq!(ctx.get_variable_string("who").unwrap(), "acme");
                ctx.set_variable("greeted", true);
                Ok(())
            }));
        template.execute(&ctx).await.unwrap();

        assert!(template.is_done(&ctx));
    }

    #[tokio::test]
    async fn test_body_variables_do_not_leak_to_the_caller() {
        let ctx = TestContext::new();
        ctx.set_variable("shared", "outer");

        let template = Template::new("scoped")
            .parameter("local", "only-inside")
            .action(CustomAction::new("mutate", |ctx| {
                ctx.set_variable("shared", "inner");
                ctx.set_variable("created", "inside");
                Ok(())
            }));
        template.execute(&ctx).await.unwrap();

        assert_eq!(ctx.get_variable_string("shared").unwrap(), "outer");
        assert!(!ctx.has_variable("created"));
        assert!(!ctx.has_variable("local"));
    }

    #[tokio::test]
    async fn test_body_sees_the_callers_variables() {
        let ctx = TestContext::new();
        ctx.set_variable("inherited", "yes");

        let template = Template::new("inheriting").action(CustomAction::new("check", |ctx| {
            assert_eq!(ctx.get_variable_string("inherited").unwrap(), "yes");
            Ok(())
        }));
        template.execute(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_global_context_writes_persist() {
        let ctx = TestContext::new();
        let template = Template::new("recording")
            .global_context(true)
            .parameter("input", "raw")
            .action(CustomAction::new("produce", |ctx| {
                ctx.set_variable("output", "ready");
                Ok(())
            }));
        template.execute(&ctx).await.unwrap();

        assert_eq!(ctx.get_variable_string("output").unwrap(), "ready");
        assert_eq!(ctx.get_variable_string("input").unwrap(), "raw");
    }

    #[tokio::test]
    async fn test_function_calls_in_parameter_values() {
        let ctx = TestContext::new();
        ctx.set_variable("word", "loud");

        let template = Template::new("shouting")
            .parameter("shout", "fn:upperCase(${word})")
            .action(CustomAction::new("check", |ctx| {
                assert_eq!(ctx.get_variable_string("shout").unwrap(), "LOUD");
                Ok(())
            }));
        template.execute(&ctx).await.unwrap();
    }
}
