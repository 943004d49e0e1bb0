use async_trait::async_trait;
use tracing::info;

use crate::common::Result;
use crate::context::TestContext;
use crate::engine::{SourceSpan, TestAction};

/// Logs a message after resolving any placeholders and function calls in
/// it. The resolved text also lands under the `echo` log target so runs
/// can be followed without a debugger.
pub struct EchoAction {
    name: String,
    span: Option<SourceSpan>,
    message: String,
}

impl EchoAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "echo".to_string(),
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
impl TestAction for EchoAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_span(&self) -> Option<SourceSpan> {
        self.span
    }

    async fn execute(&self, context: &TestContext) -> Result<()> {
        let message = context.resolve_dynamic_content(&self.message)?;
        info!(target: "echo", "{message}");
        Ok(())
    }
}
