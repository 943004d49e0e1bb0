use async_trait::async_trait;

use crate::common::{EngineError, Result};
use crate::context::TestContext;
use crate::engine::{SourceSpan, TestAction};

/// Fails unconditionally with a configurable message. Useful as the body
/// of an expected-failure assertion and for marking unreachable branches.
pub struct FailAction {
    name: String,
    span: Option<SourceSpan>,
    message: String,
}

impl FailAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "fail".to_string(),
            span: None,
            message: message.into(),
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
}

#[async_trait]
impl TestAction for FailAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let message = context.resolve_dynamic_content(&self.message)?;
        Err(EngineError::action_failed(&self.name, message))
    }
}
