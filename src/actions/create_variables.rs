use async_trait::async_trait;
use tracing::debug;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{SourceSpan, TestAction};

/// Binds one or more variables on the shared context. Values resolve
/// against the context first, so a binding can reference earlier
/// variables and function calls.
pub struct CreateVariablesAction {
    name: String,
    span: Option<SourceSpan>,
    variables: Vec<(String, String)>,
}

impl CreateVariablesAction {
    pub fn new() -> Self {
        Self {
            name: "create-variables".to_string(),
            span: None,
            variables: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn span(mut self, start_line: u32, end_line: u32) -> Self {
        self.span = Some(SourceSpan::new(start_line, end_line));
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((name.into(), value.into()));
        self
    }
}

impl Default for CreateVariablesAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        for (name, raw_value) in &self.variables {
            let value = context.resolve_dynamic_content(raw_value)?;
            debug!(variable = name, %value, "binding variable");
            context.set_variable(name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bindings_resolve_in_order() {
        let ctx = TestContext::new();
        CreateVariablesAction::new()
            .variable("base", "order")
            .variable("id", "${base}-42")
            .execute(&ctx)
            .await
            .unwrap();

        assert_eq!(ctx.get_variable_string("id").unwrap(), "order-42");
    }

    #[tokio::test]
    async fn test_unresolvable_binding_fails() {
        let ctx = TestContext::new();
        let result = CreateVariablesAction::new()
            .variable("id", "${missing}")
            .execute(&ctx)
            .await;
        assert!(result.is_err());
    }
}
